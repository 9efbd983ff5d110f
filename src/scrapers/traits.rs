use crate::error::Result;
use crate::models::ListingFields;
use async_trait::async_trait;

/// Where raw pages come from.
/// This allows the crawler to run against recorded pages in tests
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch the raw content at `path`, relative to the site's base URL
    async fn fetch(&self, path: &str) -> Result<String>;

    /// Get the name of the source
    fn source_name(&self) -> &'static str;
}

/// Site-specific field extraction. Implementations are CPU-bound and run on
/// the blocking pool.
pub trait ListingParser: Send + Sync {
    /// Detail-page identifiers found on one discovery page, in page order
    fn parse_links(&self, content: &str) -> Result<Vec<String>>;

    /// Fields of one detail page
    fn parse_listing(&self, url: &str, content: &str) -> Result<ListingFields>;
}
