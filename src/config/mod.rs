//! Configuration module
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! and turning `[[seed]]` entries into validated [`SeedRequest`]s.
//!
//! # Example
//!
//! ```no_run
//! use pagecrawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawl.toml")).unwrap();
//! println!("Crawler will fetch at most {} pages per seed", config.crawler.max_pages);
//! ```

mod parser;
mod seed;
mod types;
mod validation;

// Re-export types
pub use seed::SeedRequest;
pub use types::{
    Config, CrawlerConfig, FetchConfig, RelevanceConfig, RenderConfig, SeedEntry,
    DEFAULT_USER_AGENT,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
