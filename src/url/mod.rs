//! URL handling module
//!
//! This module provides URL normalization, the de-duplication key used by crawl
//! sessions, and detection/rewriting of page-number tokens in listing URLs.

mod normalize;
mod pattern;

// Re-export main functions
pub use normalize::{dedup_key, normalize_url};
pub use pattern::{
    find_pagination_token, looks_like_static_pagination, with_page_number, PaginationToken,
};
