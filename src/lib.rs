//! Pagecrawl: an adaptive pagination crawler
//!
//! This crate takes a listing page URL, decides which pagination mechanism the
//! site uses (numbered pages, "next" links, or JavaScript-driven loading), follows
//! it, and returns the ordered, de-duplicated set of article URLs it discovered.

pub mod config;
pub mod crawler;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for crawl operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("bad URL: {0}")]
    UrlError(#[from] UrlError),

    #[error("could not parse URL: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client could not be built: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Could not classify {url}: {reason}")]
    Classification { url: String, reason: String },

    #[error("Seed URL has no pagination token: {url}")]
    NoPaginationToken { url: String },

    #[error("Render error: {0}")]
    Render(#[from] RenderError),
}

/// Errors from loading or validating a crawl config
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("config is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config rejected: {0}")]
    Validation(String),

    #[error("seed URL rejected: {0}")]
    InvalidUrl(String),
}

/// Errors from URL normalization
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("not a URL: {0}")]
    Parse(String),

    #[error("unsupported scheme {0}, expected http or https")]
    InvalidScheme(String),

    #[error("URL has no host")]
    MissingDomain,
}

/// Errors raised while bringing up a rendering session
///
/// Failures after the browser is running (navigation, timeouts) are not
/// errors; they end the session early with whatever HTML is present.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Invalid browser configuration: {0}")]
    Config(String),

    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Failed to open page: {0}")]
    Page(String),
}

/// Result type alias for crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

pub use config::{Config, SeedRequest};
pub use crawler::{CrawlReport, Crawler, StrategyDecision};
pub use state::CrawlSession;
pub use url::{dedup_key, normalize_url};
