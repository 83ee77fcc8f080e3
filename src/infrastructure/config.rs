//! Configuration infrastructure
//!
//! Settings are grouped by concern:
//! 1. Search behaviour (concurrency, default criteria, timeouts)
//! 2. Site endpoints (search, histogram and base URLs)
//! 3. HTTP client tuning and logging
//!
//! A configuration can be loaded from a JSON file kept in the user's config
//! directory (`ConfigManager`) or from any file the `config` crate reads,
//! layered with `AMAZON_SCRAPE_*` environment variables (`AppConfig::from_file`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};
use url::Url;

use crate::infrastructure::http_client::max_backoff_delay;

pub const ENV_PREFIX: &str = "AMAZON_SCRAPE";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {source}")]
    Load {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed for '{field}': {message}")]
    Validation { field: String, message: String },
}

impl ConfigError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub search: SearchConfig,
    pub site: SiteConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
}

/// Search pool settings and criteria defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of pages fetched in parallel (at least 2)
    pub concurrency: usize,

    pub target_result_count: u32,
    pub minimum_review_count: u32,
    pub match_all_terms: bool,

    /// Confirm shipping eligibility on the product page instead of guessing from the listing
    pub strict_prime_eligibility: bool,

    /// Download listing images for accepted products
    pub fetch_thumbnails: bool,

    /// Upper bound for any single fetch made by a page worker
    pub fetch_timeout_seconds: u64,

    /// Stop dispatching pages after this many failed pages in a row
    pub max_consecutive_errors: u32,

    /// Highest page number a search will request
    pub max_page: u32,
}

/// Site endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub base_url: String,
    pub search_url: String,
    pub page_parameter: String,
    pub review_histogram_url: String,
}

/// HTTP client behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_requests_per_second: u32,
    pub max_retries: u32,
    pub follow_redirects: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted file logs
    pub json_format: bool,

    pub console_output: bool,
    pub file_output: bool,

    /// Base name of the rolling log file
    pub file_name: String,

    /// Number of log files to keep (older files will be deleted)
    pub max_files: u32,

    /// Remove old log files on startup
    pub auto_cleanup_logs: bool,

    /// Per-target level overrides (e.g. "reqwest": "warn")
    pub module_filters: HashMap<String, String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            concurrency: defaults::CONCURRENCY,
            target_result_count: defaults::TARGET_RESULT_COUNT,
            minimum_review_count: defaults::MINIMUM_REVIEW_COUNT,
            match_all_terms: defaults::MATCH_ALL_TERMS,
            strict_prime_eligibility: defaults::STRICT_PRIME_ELIGIBILITY,
            fetch_thumbnails: defaults::FETCH_THUMBNAILS,
            fetch_timeout_seconds: defaults::FETCH_TIMEOUT_SECONDS,
            max_consecutive_errors: defaults::MAX_CONSECUTIVE_ERRORS,
            max_page: defaults::MAX_PAGE,
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: amazon::BASE_URL.to_string(),
            search_url: amazon::SEARCH_URL.to_string(),
            page_parameter: amazon::PAGE_PARAMETER.to_string(),
            review_histogram_url: amazon::REVIEW_HISTOGRAM_URL.to_string(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::USER_AGENT.to_string(),
            timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            max_requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
            max_retries: defaults::MAX_RETRIES,
            follow_redirects: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: false,
            console_output: true,
            file_output: false,
            file_name: defaults::LOG_FILE_NAME.to_string(),
            max_files: defaults::LOG_MAX_FILES,
            auto_cleanup_logs: true,
            module_filters: {
                let mut filters = HashMap::new();
                filters.insert("reqwest".to_string(), "info".to_string());
                filters.insert("hyper".to_string(), "warn".to_string());
                filters.insert("h2".to_string(), "warn".to_string());
                filters.insert("html5ever".to_string(), "warn".to_string());
                filters.insert("selectors".to_string(), "warn".to_string());
                filters
            },
        }
    }
}

impl SearchConfig {
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }
}

impl HttpConfig {
    /// Longest a single `HttpClient::get` can take: every attempt running
    /// into the request timeout, plus the longest backoff before each retry.
    pub fn worst_case_fetch(&self) -> Duration {
        let attempts = u64::from(self.max_retries) + 1;
        let backoff: Duration = (1..=self.max_retries).map(max_backoff_delay).sum();
        Duration::from_secs(self.timeout_seconds.saturating_mul(attempts)) + backoff
    }
}

impl SiteConfig {
    pub fn base(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.base_url)
    }
}

impl AppConfig {
    /// Loads a file (format picked from its extension) layered with
    /// `AMAZON_SCRAPE_<SECTION>__<KEY>` environment variables.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search.concurrency < defaults::MIN_CONCURRENCY {
            return Err(ConfigError::invalid(
                "search.concurrency",
                format!(
                    "must be at least {}, got {}",
                    defaults::MIN_CONCURRENCY,
                    self.search.concurrency
                ),
            ));
        }
        if self.search.fetch_timeout_seconds == 0 {
            return Err(ConfigError::invalid(
                "search.fetch_timeout_seconds",
                "must be greater than 0",
            ));
        }
        if self.search.max_page == 0 {
            return Err(ConfigError::invalid("search.max_page", "must be greater than 0"));
        }
        if self.http.max_retries > defaults::MAX_RETRIES_LIMIT {
            return Err(ConfigError::invalid(
                "http.max_retries",
                format!("must be at most {}", defaults::MAX_RETRIES_LIMIT),
            ));
        }
        // The worker timeout wraps the whole retry loop of the HTTP client.
        let worst_case = self.http.worst_case_fetch();
        if self.search.fetch_timeout() < worst_case {
            return Err(ConfigError::invalid(
                "search.fetch_timeout_seconds",
                format!(
                    "{}s cannot cover {} attempts of {}s plus backoff ({:.1}s)",
                    self.search.fetch_timeout_seconds,
                    self.http.max_retries + 1,
                    self.http.timeout_seconds,
                    worst_case.as_secs_f64()
                ),
            ));
        }
        if self.http.max_requests_per_second == 0 {
            return Err(ConfigError::invalid(
                "http.max_requests_per_second",
                "must be greater than 0",
            ));
        }
        for (field, value) in [
            ("site.base_url", &self.site.base_url),
            ("site.search_url", &self.site.search_url),
            ("site.review_histogram_url", &self.site.review_histogram_url),
        ] {
            Url::parse(value).map_err(|e| ConfigError::invalid(field, e.to_string()))?;
        }
        if !self.logging.console_output && !self.logging.file_output {
            return Err(ConfigError::invalid(
                "logging",
                "at least one of console_output or file_output must be enabled",
            ));
        }
        Ok(())
    }
}

/// Keeps a JSON copy of the configuration in the user's config directory.
pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join(defaults::APP_DIR_NAME);

        Ok(config_dir)
    }

    /// Get application data directory (logs live under it)
    pub fn get_app_data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .context("Failed to get user data directory")?
            .join(defaults::APP_DIR_NAME);

        Ok(data_dir)
    }

    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_dir()?.join(defaults::CONFIG_FILE_NAME);
        Ok(Self { config_path })
    }

    pub fn with_path(path: impl AsRef<Path>) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    /// Load configuration from file, creating a default one if it doesn't exist
    pub async fn load_config(&self) -> Result<AppConfig> {
        if !fs::try_exists(&self.config_path).await.unwrap_or(false) {
            info!(
                "Configuration file not found, creating default: {:?}",
                self.config_path
            );
            let default_config = AppConfig::default();
            self.save_config(&default_config).await?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .context("Failed to read configuration file")?;

        let config: AppConfig = match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(parse_error) => {
                warn!("Configuration file is unreadable: {}", parse_error);
                warn!("Falling back to default configuration");
                return Ok(AppConfig::default());
            }
        };

        config
            .validate()
            .with_context(|| format!("Invalid configuration in {:?}", self.config_path))?;
        info!("Loaded configuration from: {:?}", self.config_path);
        Ok(config)
    }

    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(config_dir) = self.config_path.parent() {
            fs::create_dir_all(config_dir)
                .await
                .context("Failed to create config directory")?;
        }

        let content =
            serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;
        fs::write(&self.config_path, content)
            .await
            .context("Failed to write configuration file")?;

        info!("Configuration saved to: {:?}", self.config_path);
        Ok(())
    }
}

/// Site endpoint constants
pub mod amazon {
    /// Root used to resolve relative product links
    pub const BASE_URL: &str = "https://www.amazon.com/";

    /// Search endpoint; the encoded search text is appended directly
    pub const SEARCH_URL: &str = "https://www.amazon.com/s/field-keywords=";

    /// Query fragment carrying the page number
    pub const PAGE_PARAMETER: &str = "&page=";

    /// Review histogram endpoint; the product id is appended directly
    pub const REVIEW_HISTOGRAM_URL: &str =
        "https://www.amazon.com/gp/customer-reviews/common/du/displayHistoPopAjax.html?&ASIN=";
}

/// Default configuration values
pub mod defaults {
    pub const APP_DIR_NAME: &str = "amazon-scrape";
    pub const CONFIG_FILE_NAME: &str = "amazon_scrape_config.json";

    /// A search needs at least two page workers
    pub const MIN_CONCURRENCY: usize = 2;
    pub const CONCURRENCY: usize = 3;

    pub use crate::domain::search_criteria::defaults::{
        MATCH_ALL_TERMS, MINIMUM_REVIEW_COUNT, STRICT_PRIME_ELIGIBILITY, TARGET_RESULT_COUNT,
    };
    pub const FETCH_THUMBNAILS: bool = true;

    /// Covers `MAX_RETRIES + 1` request timeouts plus backoff
    pub const FETCH_TIMEOUT_SECONDS: u64 = 40;
    pub const MAX_CONSECUTIVE_ERRORS: u32 = 5;
    pub const MAX_PAGE: u32 = 400;

    pub const USER_AGENT: &str =
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 10;
    pub const MAX_REQUESTS_PER_SECOND: u32 = 5;
    pub const MAX_RETRIES: u32 = 2;
    pub const MAX_RETRIES_LIMIT: u32 = 10;

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_FILE_NAME: &str = "amazon-scrape.log";
    pub const LOG_MAX_FILES: u32 = 7;
}

/// URL builders
pub mod utils {
    use super::SiteConfig;

    /// Search results URL for `page`; spaces in the text are sent as `%20`.
    pub fn search_page_url(site: &SiteConfig, search_text: &str, page: u32) -> String {
        format!(
            "{}{}{}{}",
            site.search_url,
            urlencoding::encode(search_text.trim()),
            site.page_parameter,
            page
        )
    }

    pub fn review_histogram_url(site: &SiteConfig, product_id: &str) -> String {
        format!(
            "{}{}",
            site.review_histogram_url,
            urlencoding::encode(product_id)
        )
    }
}
