//! Detection and rewriting of page-number tokens in listing URLs
//!
//! A token is the word `page` or a bare `p`, followed by `=` or `/`, followed
//! by digits: `?page=2`, `/page/3`, `?p=4`, `/p/5`. The word may end a snake
//! case name, as in `?current_page=2`.

use regex::Regex;
use std::sync::OnceLock;

fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| {
        Regex::new(r"(?:\b|_)(page|p)([=/])(\d+)").expect("pagination token regex is valid")
    })
}

/// Location of the first page-number token in a URL string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationToken {
    /// Byte range of the digits within the URL string
    pub digits: std::ops::Range<usize>,
    /// The page number currently in the URL
    pub number: u64,
}

/// Finds the first page-number token in `url`
pub fn find_pagination_token(url: &str) -> Option<PaginationToken> {
    let captures = token_regex().captures(url)?;
    let digits = captures.get(3)?;
    Some(PaginationToken {
        digits: digits.range(),
        number: digits.as_str().parse().unwrap_or(u64::MAX),
    })
}

/// Returns true if the URL carries a static pagination token
///
/// # Examples
///
/// ```
/// use pagecrawl::url::looks_like_static_pagination;
///
/// assert!(looks_like_static_pagination("https://example.com/news?page=1"));
/// assert!(looks_like_static_pagination("https://example.com/blog/p/2"));
/// assert!(!looks_like_static_pagination("https://example.com/blog"));
/// ```
pub fn looks_like_static_pagination(url: &str) -> bool {
    token_regex().is_match(url)
}

/// Rewrites the first page-number token of `url` to `page`
///
/// Returns None if the URL has no token.
pub fn with_page_number(url: &str, page: u32) -> Option<String> {
    let token = find_pagination_token(url)?;
    let mut rewritten = String::with_capacity(url.len() + 4);
    rewritten.push_str(&url[..token.digits.start]);
    rewritten.push_str(&page.to_string());
    rewritten.push_str(&url[token.digits.end..]);
    Some(rewritten)
}
