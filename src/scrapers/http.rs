use crate::error::{Error, Result};
use crate::scrapers::traits::PageSource;
use crate::scrapers::types::CrawlParams;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

/// Fetches pages from a listing site over HTTP
pub struct HttpSource {
    client: Client,
    base_url: String,
}

impl HttpSource {
    /// Create a new source with the timeout and user agent from `params`
    pub fn new(params: &CrawlParams) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(params.timeout_secs))
            .user_agent(params.user_agent.as_str())
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: params.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }
}

#[async_trait]
impl PageSource for HttpSource {
    async fn fetch(&self, path: &str) -> Result<String> {
        let url = self.url_for(path);
        debug!("Fetching URL: {}", url);

        let fetch_error = |reason: String| Error::Fetch {
            url: url.clone(),
            reason,
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        if response.status() != StatusCode::OK {
            return Err(fetch_error(format!("got status {}", response.status())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| fetch_error(format!("failed to read response body: {e}")))?;
        debug!("Downloaded {} bytes from {}", body.len(), url);
        Ok(body)
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}
