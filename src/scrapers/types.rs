use serde::{Deserialize, Serialize};

/// Browser-like user agent sent with every page request
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 6.0; WOW64; rv:24.0) Gecko/20100101 Firefox/24.0";

/// Crawl parameters for one listing site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlParams {
    /// Site root that every discovered path is relative to
    pub base_url: String,
    /// Search results path, e.g. `/dublin-city/houses-for-rent/?s[mnb]=2`
    pub search_path: String,
    /// Query parameter carrying the result offset
    pub offset_param: String,
    /// Maximum number of listings fetched and parsed at once
    pub concurrency: usize,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl CrawlParams {
    /// Discovery page path starting at result `offset`
    pub fn page_path(&self, offset: usize) -> String {
        let sep = if self.search_path.contains('?') { '&' } else { '?' };
        format!("{}{}{}={}", self.search_path, sep, self.offset_param, offset)
    }
}

impl Default for CrawlParams {
    fn default() -> Self {
        Self {
            base_url: "https://www.daft.ie".to_string(),
            search_path: "/dublin-city/houses-for-rent/".to_string(),
            offset_param: "offset".to_string(),
            concurrency: 8,
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_offset_to_search_path() {
        let mut params = CrawlParams::default();
        assert_eq!(params.page_path(0), "/dublin-city/houses-for-rent/?offset=0");

        params.search_path = "/dublin/houses-for-rent/?s[mnb]=2".to_string();
        assert_eq!(params.page_path(20), "/dublin/houses-for-rent/?s[mnb]=2&offset=20");
    }
}
