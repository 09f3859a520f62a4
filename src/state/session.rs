use crate::url::{dedup_key, normalize_url};
use serde::Serialize;
use std::collections::HashSet;
use url::Url;

/// HTML of a listing page retrieved during a crawl
///
/// Exposed so callers can reuse rendered or fetched listing content without
/// fetching it again.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedPage {
    pub url: String,
    pub html: String,
}

/// Mutable state for one seed's crawl
///
/// A session is created per seed request and dropped once the report has been
/// built. It owns:
/// - the seen set (de-duplication keys of accepted URLs)
/// - the article accumulator (accepted URLs in first-seen order)
/// - the visited set of listing pages (cycle guard)
/// - the page-fetch and render-step budgets
/// - the HTML of listing pages retrieved so far
#[derive(Debug)]
pub struct CrawlSession {
    seen: HashSet<String>,
    articles: Vec<String>,
    visited_pages: HashSet<String>,
    pages: Vec<RetrievedPage>,
    pages_fetched: u32,
    max_pages: u32,
    render_steps: u32,
    max_render_steps: u32,
}

impl CrawlSession {
    /// Creates an empty session with the given hard caps
    pub fn new(max_pages: u32, max_render_steps: u32) -> Self {
        Self {
            seen: HashSet::new(),
            articles: Vec::new(),
            visited_pages: HashSet::new(),
            pages: Vec::new(),
            pages_fetched: 0,
            max_pages,
            render_steps: 0,
            max_render_steps,
        }
    }

    /// Appends a URL to the accumulator unless an equivalent URL was already accepted
    ///
    /// Returns true if the URL was new. The stored form is the output of
    /// [`normalize_url`]: no fragment and no trailing slash, query untouched.
    ///
    /// # Examples
    ///
    /// ```
    /// use pagecrawl::CrawlSession;
    /// use url::Url;
    ///
    /// let mut session = CrawlSession::new(3, 3);
    /// assert!(session.accept(&Url::parse("https://example.com/article/1").unwrap()));
    /// assert!(!session.accept(&Url::parse("https://example.com/article/1/#top").unwrap()));
    /// assert_eq!(session.len(), 1);
    /// ```
    pub fn accept(&mut self, url: &Url) -> bool {
        if !self.seen.insert(dedup_key(url)) {
            return false;
        }

        let emitted = match normalize_url(url.as_str()) {
            Ok(normalized) => normalized.to_string(),
            Err(_) => {
                let mut raw = url.clone();
                raw.set_fragment(None);
                raw.to_string()
            }
        };

        self.articles.push(emitted);
        true
    }

    /// Returns true if an equivalent URL has already been accepted
    pub fn contains(&self, url: &Url) -> bool {
        self.seen.contains(&dedup_key(url))
    }

    /// Accepted URLs in first-seen order
    pub fn articles(&self) -> &[String] {
        &self.articles
    }

    /// Consumes the session, returning the accumulator
    pub fn into_articles(self) -> Vec<String> {
        self.articles
    }

    /// Consumes the session, returning the accumulator and the retrieved pages
    pub fn into_parts(self) -> (Vec<String>, Vec<RetrievedPage>) {
        (self.articles, self.pages)
    }

    /// Keeps the HTML of a listing page for the caller
    pub fn record_page(&mut self, url: &Url, html: String) {
        self.pages.push(RetrievedPage {
            url: url.to_string(),
            html,
        });
    }

    pub fn pages(&self) -> &[RetrievedPage] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    /// Reserves one page fetch from the budget
    ///
    /// Returns false, without reserving anything, once `max_pages` fetches
    /// have been made.
    pub fn try_begin_page(&mut self) -> bool {
        if self.pages_fetched >= self.max_pages {
            return false;
        }
        self.pages_fetched += 1;
        true
    }

    /// Records `steps` render iterations performed by the renderer
    ///
    /// The count is clamped to the remaining budget.
    pub fn record_render_steps(&mut self, steps: u32) {
        self.render_steps = self
            .render_steps
            .saturating_add(steps)
            .min(self.max_render_steps);
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    pub fn render_steps(&self) -> u32 {
        self.render_steps
    }

    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }

    pub fn max_render_steps(&self) -> u32 {
        self.max_render_steps
    }

    /// Render steps still available
    pub fn remaining_render_steps(&self) -> u32 {
        self.max_render_steps - self.render_steps
    }

    /// Marks a listing page as visited
    ///
    /// Returns false if the page had already been visited.
    pub fn mark_visited(&mut self, page: &Url) -> bool {
        self.visited_pages.insert(dedup_page_key(page))
    }

    /// Returns true if the listing page has already been visited
    pub fn was_visited(&self, page: &Url) -> bool {
        self.visited_pages.contains(&dedup_page_key(page))
    }
}

/// Listing pages differ by query (`?page=2`), so their key keeps it
fn dedup_page_key(page: &Url) -> String {
    match page.query() {
        Some(query) if !query.is_empty() => format!("{}?{}", dedup_key(page), query),
        _ => dedup_key(page),
    }
}
