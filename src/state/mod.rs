//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlSession`: the seen set, article accumulator, visited listing pages
//!   and fetch/render budgets for one seed's crawl

mod session;

// Re-export main types
pub use session::{CrawlSession, RetrievedPage};
