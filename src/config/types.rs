use serde::Deserialize;

/// Browser-like user agent presented on every request
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36";

/// Main configuration structure
///
/// Every section has defaults, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub fetch: FetchConfig,
    pub render: RenderConfig,
    pub relevance: RelevanceConfig,
    #[serde(rename = "seed")]
    pub seeds: Vec<SeedEntry>,
}

/// Crawl limits and scheduling
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Maximum page fetches per seed (static and link strategies)
    #[serde(rename = "max-pages")]
    pub max_pages: u32,

    /// Maximum scroll/click iterations per seed (rendered strategy)
    #[serde(rename = "max-render-steps")]
    pub max_render_steps: u32,

    /// Number of seeds crawled at the same time
    #[serde(rename = "max-concurrent-seeds")]
    pub max_concurrent_seeds: u32,

    /// Overall deadline for a crawl, checked between steps
    #[serde(rename = "crawl-deadline-secs")]
    pub crawl_deadline_secs: Option<u64>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_pages: 10,
            max_render_steps: 5,
            max_concurrent_seeds: 4,
            crawl_deadline_secs: None,
        }
    }
}

/// HTTP fetching and retry behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Per-request timeout (milliseconds)
    #[serde(rename = "request-timeout-ms")]
    pub request_timeout_ms: u64,

    #[serde(rename = "connect-timeout-ms")]
    pub connect_timeout_ms: u64,

    /// Total attempts per URL, including the first one
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (milliseconds)
    #[serde(rename = "base-delay-ms")]
    pub base_delay_ms: u64,

    /// Upper bound for a single backoff delay (milliseconds)
    #[serde(rename = "max-delay-ms")]
    pub max_delay_ms: u64,

    /// Random extra delay, as a fraction of the computed backoff
    pub jitter: f64,

    #[serde(rename = "max-redirects")]
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_ms: 10_000,
            connect_timeout_ms: 5_000,
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
            jitter: 0.25,
            max_redirects: 10,
        }
    }
}

/// Headless browser session settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    #[serde(rename = "navigation-timeout-ms")]
    pub navigation_timeout_ms: u64,

    /// How long the DOM must stay unchanged to count as settled
    #[serde(rename = "idle-ms")]
    pub idle_ms: u64,

    /// Upper bound on waiting for the DOM to settle after one step
    #[serde(rename = "step-timeout-ms")]
    pub step_timeout_ms: u64,

    #[serde(rename = "scroll-px")]
    pub scroll_px: u32,

    pub headless: bool,

    #[serde(rename = "chrome-executable")]
    pub chrome_executable: Option<String>,

    /// Case-insensitive texts identifying a "load more" control
    #[serde(rename = "load-more-labels")]
    pub load_more_labels: Vec<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: 30_000,
            idle_ms: 1_500,
            step_timeout_ms: 5_000,
            scroll_px: 3_000,
            headless: true,
            chrome_executable: None,
            load_more_labels: vec![
                "load more".to_string(),
                "show more".to_string(),
                "more".to_string(),
            ],
        }
    }
}

/// Link relevance heuristic
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelevanceConfig {
    /// Case-insensitive substrings that mark a URL as a candidate article
    pub keywords: Vec<String>,

    /// Accept URLs containing a 20xx year
    #[serde(rename = "match-years")]
    pub match_years: bool,
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            keywords: vec![
                "article".to_string(),
                "news".to_string(),
                "robot".to_string(),
            ],
            match_years: true,
        }
    }
}

/// A listing page to crawl
#[derive(Debug, Clone, Deserialize)]
pub struct SeedEntry {
    pub url: String,

    /// Overrides `crawler.max-pages` for this seed
    #[serde(rename = "max-pages")]
    pub max_pages: Option<u32>,

    /// Overrides `crawler.max-render-steps` for this seed
    #[serde(rename = "max-render-steps")]
    pub max_render_steps: Option<u32>,
}
