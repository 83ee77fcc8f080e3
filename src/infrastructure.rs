//! Infrastructure layer for configuration, logging, HTTP access and parsing
//!
//! The crawling layer depends on these pieces through narrow seams
//! (`PageSource`, the parsing functions) so tests can swap the network out.

pub mod config; // Configuration loading, defaults and URL builders
pub mod http_client; // Rate-limited reqwest client
pub mod logging; // tracing subscriber setup
pub mod parsing; // Field extraction engine
pub mod parsing_error;

// Re-export commonly used items
pub use config::{AppConfig, ConfigError, ConfigManager, HttpConfig, LoggingConfig, SearchConfig, SiteConfig};
pub use http_client::{FetchError, HttpClient};
pub use logging::{get_log_directory, init_logging, init_logging_with_config};
pub use parsing::{HistogramFields, ListingFields, ParsingError, ParsingResult};
