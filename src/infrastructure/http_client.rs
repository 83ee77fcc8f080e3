//! HTTP client for search page scraping with rate limiting and retries
//!
//! One client is shared by every page worker of a search. Requests wait on
//! a `governor` rate limiter, and retryable failures (timeouts, 429 and 5xx
//! responses, connection errors) are retried with exponential backoff plus
//! jitter.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{Client, ClientBuilder, Response};
use thiserror::Error;
use tracing::{debug, warn};

pub use crate::infrastructure::config::HttpConfig;

const BACKOFF_BASE_MS: u64 = 500;
const BACKOFF_JITTER_MS: u64 = 250;
const MAX_REDIRECTS: usize = 10;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Invalid HTTP client configuration: {0}")]
    Configuration(String),

    #[error("Request to {url} timed out after {after:?}")]
    Timeout { url: String, after: Duration },

    #[error("HTTP error {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Empty response from {url}")]
    EmptyBody { url: String },
}

impl FetchError {
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Network { .. } => true,
            Self::Status { status, .. } => matches!(*status, 408 | 429 | 500 | 502 | 503 | 504),
            Self::Configuration(_) | Self::EmptyBody { .. } => false,
        }
    }

    fn from_reqwest(url: &str, error: &reqwest::Error, timeout: Duration) -> Self {
        if error.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
                after: timeout,
            }
        } else if let Some(status) = error.status() {
            Self::Status {
                status: status.as_u16(),
                url: url.to_string(),
            }
        } else {
            Self::Network {
                url: url.to_string(),
                message: error.to_string(),
            }
        }
    }
}

/// Delay before retry number `attempt` (1-based): 0.5s, 1s, 2s, ... plus jitter.
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(backoff_base_ms(attempt) + fastrand::u64(0..BACKOFF_JITTER_MS))
}

/// Longest delay `backoff_delay(attempt)` can return.
pub fn max_backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(backoff_base_ms(attempt) + BACKOFF_JITTER_MS)
}

fn backoff_base_ms(attempt: u32) -> u64 {
    let exponent = attempt.saturating_sub(1).min(6);
    BACKOFF_BASE_MS.saturating_mul(1_u64 << exponent)
}

/// Rate-limited HTTP client shared by all workers of a search
pub struct HttpClient {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    config: HttpConfig,
}

impl HttpClient {
    pub fn new(config: HttpConfig) -> Result<Self, FetchError> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .gzip(true)
            .brotli(true)
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::limited(MAX_REDIRECTS)
            } else {
                reqwest::redirect::Policy::none()
            })
            .build()
            .map_err(|e| FetchError::Configuration(e.to_string()))?;

        let rate = NonZeroU32::new(config.max_requests_per_second).ok_or_else(|| {
            FetchError::Configuration("max_requests_per_second must be greater than 0".into())
        })?;
        let rate_limiter = RateLimiter::direct(Quota::per_second(rate));

        Ok(Self {
            client,
            rate_limiter,
            config,
        })
    }

    pub const fn config(&self) -> &HttpConfig {
        &self.config
    }

    const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_seconds)
    }

    /// Single rate-limited GET; non-success statuses become errors.
    async fn get_once(&self, url: &str) -> Result<Response, FetchError> {
        self.rate_limiter.until_ready().await;

        debug!("HTTP GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e, self.request_timeout()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    /// GET with retries for retryable failures.
    pub async fn get(&self, url: &str) -> Result<Response, FetchError> {
        let attempts = self.config.max_retries.saturating_add(1);
        let mut attempt = 1;
        loop {
            match self.get_once(url).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    let delay = backoff_delay(attempt);
                    warn!(
                        "Attempt {}/{} failed for {}: {} (retrying in {:?})",
                        attempt, attempts, url, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Fetches the body as text; an empty body is an error.
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self.get(url).await?;
        let text = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e, self.request_timeout()))?;

        if text.is_empty() {
            return Err(FetchError::EmptyBody {
                url: url.to_string(),
            });
        }
        debug!("Fetched {} ({} chars)", url, text.len());
        Ok(text)
    }

    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.get(url).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e, self.request_timeout()))?;

        if bytes.is_empty() {
            return Err(FetchError::EmptyBody {
                url: url.to_string(),
            });
        }
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_client_creation() {
        let client = HttpClient::new(HttpConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_zero_rate_limit_is_rejected() {
        let config = HttpConfig {
            max_requests_per_second: 0,
            ..HttpConfig::default()
        };
        assert!(matches!(
            HttpClient::new(config),
            Err(FetchError::Configuration(_))
        ));
    }

    #[test]
    fn test_retryable_classification() {
        let status = |status| FetchError::Status {
            status,
            url: "https://example.com".into(),
        };
        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(404).is_retryable());
        assert!(
            FetchError::Timeout {
                url: "u".into(),
                after: Duration::from_secs(1)
            }
            .is_retryable()
        );
        assert!(!FetchError::EmptyBody { url: "u".into() }.is_retryable());
    }

    #[test]
    fn test_backoff_grows_exponentially() {
        for attempt in 1..=4 {
            let delay = backoff_delay(attempt).as_millis();
            let base = u128::from(BACKOFF_BASE_MS) << (attempt - 1);
            assert!(delay >= base, "attempt {attempt}: {delay} < {base}");
            assert!(delay < base + u128::from(BACKOFF_JITTER_MS));
            assert!(backoff_delay(attempt) < max_backoff_delay(attempt));
        }
    }
}
