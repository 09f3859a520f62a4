//! HTML parser for extracting candidate article links and pagination anchors
//!
//! This module handles parsing listing pages to extract:
//! - Candidate article links (absolute, filtered by a relevance predicate)
//! - The "next page" link used by link-follow pagination
//! - Whether a page shows any pagination anchor at all (for classification)

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;

/// A link found on a listing page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateLink {
    /// Absolute URL, fragment removed
    pub absolute_url: Url,
    /// The listing page it was found on
    pub source_page: String,
}

/// Decides whether an absolute URL is worth handing downstream
///
/// Closures `Fn(&Url) -> bool` implement this trait.
pub trait RelevanceFilter: Send + Sync {
    fn is_relevant(&self, url: &Url) -> bool;
}

impl<F> RelevanceFilter for F
where
    F: Fn(&Url) -> bool + Send + Sync,
{
    fn is_relevant(&self, url: &Url) -> bool {
        self(url)
    }
}

/// Accepts every http(s) link
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl RelevanceFilter for AcceptAll {
    fn is_relevant(&self, _url: &Url) -> bool {
        true
    }
}

/// Year/keyword heuristic for article URLs
///
/// A URL is relevant if it contains a year in 2000-2099 (when enabled) or any
/// of the keywords, case-insensitively. Permissive on purpose: downstream
/// filtering discards irrelevant captures.
#[derive(Debug, Clone)]
pub struct KeywordRelevance {
    keywords: Vec<String>,
    match_years: bool,
}

impl KeywordRelevance {
    pub fn new<I, S>(keywords: I, match_years: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            match_years,
        }
    }
}

impl Default for KeywordRelevance {
    fn default() -> Self {
        Self::new(["article", "news", "robot"], true)
    }
}

impl From<&crate::config::RelevanceConfig> for KeywordRelevance {
    fn from(config: &crate::config::RelevanceConfig) -> Self {
        Self::new(&config.keywords, config.match_years)
    }
}

impl RelevanceFilter for KeywordRelevance {
    fn is_relevant(&self, url: &Url) -> bool {
        // Host, path and query only; a port like `:2024` is not a year
        let mut text = url.host_str().unwrap_or_default().to_string();
        text.push_str(url.path());
        if let Some(query) = url.query() {
            text.push('?');
            text.push_str(query);
        }

        if self.match_years && year_regex().is_match(&text) {
            return true;
        }
        let lowered = text.to_lowercase();
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }
}

fn year_regex() -> &'static Regex {
    static YEAR: OnceLock<Regex> = OnceLock::new();
    YEAR.get_or_init(|| Regex::new(r"20\d{2}").expect("year regex is valid"))
}

fn pagination_text_regex() -> &'static Regex {
    static PAGINATION: OnceLock<Regex> = OnceLock::new();
    PAGINATION.get_or_init(|| Regex::new(r"(?i)next|more|>|»").expect("pagination regex is valid"))
}

fn anchor_selector() -> &'static Selector {
    static ANCHOR: OnceLock<Selector> = OnceLock::new();
    ANCHOR.get_or_init(|| Selector::parse("a[href]").expect("anchor selector is valid"))
}

fn any_anchor_selector() -> &'static Selector {
    static ANY_ANCHOR: OnceLock<Selector> = OnceLock::new();
    ANY_ANCHOR.get_or_init(|| Selector::parse("a").expect("anchor selector is valid"))
}

fn link_next_selector() -> &'static Selector {
    static LINK_NEXT: OnceLock<Selector> = OnceLock::new();
    LINK_NEXT.get_or_init(|| Selector::parse("link[href]").expect("link selector is valid"))
}

/// Extracts relevant candidate links from a listing page
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` whose resolved absolute URL passes `filter`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links and data URIs
/// - Fragment-only links (same page anchors)
/// - Non-HTTP(S) URLs after resolution
///
/// Output is in document order with duplicates (after fragment removal) dropped.
///
/// # Example
///
/// ```
/// use pagecrawl::crawler::{extract_links, KeywordRelevance};
/// use url::Url;
///
/// let html = r#"<a href="/article/2024/01">One</a><a href="/about">About</a>"#;
/// let base = Url::parse("https://example.com/news").unwrap();
/// let links = extract_links(html, &base, &KeywordRelevance::default());
/// assert_eq!(links.len(), 1);
/// assert_eq!(links[0].absolute_url.as_str(), "https://example.com/article/2024/01");
/// ```
pub fn extract_links(
    html: &str,
    base_url: &Url,
    filter: &dyn RelevanceFilter,
) -> Vec<CandidateLink> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(anchor_selector()) {
        if element.value().attr("download").is_some() {
            continue;
        }

        let Some(href) = element.value().attr("href") else {
            continue;
        };

        let Some(absolute_url) = resolve_link(href, base_url) else {
            continue;
        };

        if !filter.is_relevant(&absolute_url) {
            continue;
        }

        if seen.insert(absolute_url.clone()) {
            links.push(CandidateLink {
                absolute_url,
                source_page: base_url.to_string(),
            });
        }
    }

    links
}

/// Finds the "next page" link of a listing page
///
/// Looks for an `<a>` whose trimmed text contains "next" or is exactly ">" or
/// "»", or whose `rel` contains `next`; then falls back to `<link rel="next">`.
/// The first match in document order wins.
pub fn find_next_link(html: &str, base_url: &Url) -> Option<Url> {
    let document = Html::parse_document(html);

    for element in document.select(anchor_selector()) {
        if !is_next_anchor(&element) {
            continue;
        }
        if let Some(url) = element
            .value()
            .attr("href")
            .and_then(|href| resolve_link(href, base_url))
        {
            return Some(url);
        }
    }

    document
        .select(link_next_selector())
        .filter(|element| has_rel_next(element))
        .filter_map(|element| element.value().attr("href"))
        .find_map(|href| resolve_link(href, base_url))
}

/// Returns true if any anchor's text looks like pagination ("next", "more", ">", "»")
pub fn has_pagination_anchor(html: &str) -> bool {
    let document = Html::parse_document(html);
    let regex = pagination_text_regex();
    document
        .select(any_anchor_selector())
        .any(|element| regex.is_match(element_text(&element).as_str()))
}

fn is_next_anchor(element: &ElementRef<'_>) -> bool {
    if has_rel_next(element) {
        return true;
    }
    let text = element_text(element).to_lowercase();
    text.contains("next") || text == ">" || text == "»"
}

fn has_rel_next(element: &ElementRef<'_>) -> bool {
    element
        .value()
        .attr("rel")
        .map(|rel| {
            rel.split_ascii_whitespace()
                .any(|token| token.eq_ignore_ascii_case("next"))
        })
        .unwrap_or(false)
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only and empty hrefs
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    let mut absolute_url = base_url.join(href).ok()?;
    if absolute_url.scheme() != "http" && absolute_url.scheme() != "https" {
        return None;
    }
    absolute_url.set_fragment(None);
    Some(absolute_url)
}
