//! Page source abstraction
//!
//! Workers never talk to the network directly; they go through a
//! `PageSource`. Production code uses `HttpPageSource`, tests substitute
//! canned HTML.

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::infrastructure::config::{AppConfig, SiteConfig, utils};
use crate::infrastructure::http_client::{FetchError, HttpClient};

#[async_trait]
pub trait PageSource: Send + Sync {
    /// Raw HTML of search results page `page_number` (1-based).
    async fn fetch_page(&self, page_number: u32, search_text: &str) -> Result<String, FetchError>;

    /// Review histogram payload for one product.
    async fn fetch_review_histogram(&self, product_id: &str) -> Result<String, FetchError>;

    /// Arbitrary page as text, used for the strict eligibility check.
    async fn fetch_text(&self, url: &Url) -> Result<String, FetchError>;

    /// Raw bytes, used for thumbnails.
    async fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>, FetchError>;

    /// Base that relative product links resolve against.
    fn base_url(&self) -> &Url;
}

/// `PageSource` backed by the rate-limited HTTP client
pub struct HttpPageSource {
    client: Arc<HttpClient>,
    site: SiteConfig,
    base_url: Url,
}

impl HttpPageSource {
    pub fn new(client: Arc<HttpClient>, site: SiteConfig) -> Result<Self, FetchError> {
        let base_url = site
            .base()
            .map_err(|e| FetchError::Configuration(format!("invalid base URL: {e}")))?;
        Ok(Self {
            client,
            site,
            base_url,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, FetchError> {
        let client = HttpClient::new(config.http.clone())?;
        Self::new(Arc::new(client), config.site.clone())
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch_page(&self, page_number: u32, search_text: &str) -> Result<String, FetchError> {
        let url = utils::search_page_url(&self.site, search_text, page_number);
        self.client.get_text(&url).await
    }

    async fn fetch_review_histogram(&self, product_id: &str) -> Result<String, FetchError> {
        let url = utils::review_histogram_url(&self.site, product_id);
        self.client.get_text(&url).await
    }

    async fn fetch_text(&self, url: &Url) -> Result<String, FetchError> {
        self.client.get_text(url.as_str()).await
    }

    async fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        self.client.get_bytes(url.as_str()).await
    }

    fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_page_source_from_default_config() {
        let source = HttpPageSource::from_config(&AppConfig::default()).unwrap();
        assert_eq!(source.base_url().as_str(), "https://www.amazon.com/");
    }

    #[test]
    fn test_http_page_source_rejects_bad_base() {
        let mut config = AppConfig::default();
        config.site.base_url = "::nope::".into();
        assert!(matches!(
            HttpPageSource::from_config(&config),
            Err(FetchError::Configuration(_))
        ));
    }
}
