//! Crawler coordinator - per-seed crawl orchestration
//!
//! This module contains the main crawl loop that ties the pieces together
//! for each seed:
//! - Classifying the seed into a pagination strategy
//! - Advancing the strategy until it stops, the budget runs out or the crawl
//!   is cancelled
//! - Falling back to the seed URL itself when a strategy fails outright
//! - Running many seeds concurrently with isolated sessions

use crate::config::{Config, SeedRequest};
use crate::crawler::classifier::{classify, StrategyDecision};
use crate::crawler::fetcher::{fetch_raw, fetch_raw_cached, ContentCache, HttpFetcher, PageFetcher};
use crate::crawler::parser::{KeywordRelevance, RelevanceFilter};
use crate::crawler::render::Renderer;
use crate::crawler::strategy::{strategy_for, StepOutcome, StopReason, StrategyContext};
use crate::state::{CrawlSession, RetrievedPage};
use crate::CrawlError;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Outcome of crawling one seed
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub seed: String,
    /// None if the seed could not be classified
    pub decision: Option<StrategyDecision>,
    /// Discovered URLs, de-duplicated, in first-seen order
    pub urls: Vec<String>,
    /// Listing pages retrieved along the way
    #[serde(skip)]
    pub pages: Vec<RetrievedPage>,
    pub stop: Option<StopReason>,
    pub pages_fetched: u32,
    pub render_steps: u32,
    /// True if the seed URL was emitted because its strategy failed
    pub fell_back: bool,
    pub error: Option<String>,
}

impl CrawlReport {
    fn from_session(seed: &SeedRequest, session: CrawlSession) -> Self {
        let pages_fetched = session.pages_fetched();
        let render_steps = session.render_steps();
        let (urls, pages) = session.into_parts();
        Self {
            seed: seed.url().to_string(),
            decision: None,
            urls,
            pages,
            stop: None,
            pages_fetched,
            render_steps,
            fell_back: false,
            error: None,
        }
    }

    /// Report for a seed whose task died before producing one
    fn fallback(seed: &SeedRequest, error: String) -> Self {
        let mut session = CrawlSession::new(seed.max_pages(), seed.max_render_steps());
        session.accept(seed.url());
        let mut report = Self::from_session(seed, session);
        report.fell_back = true;
        report.error = Some(error);
        report
    }

    /// Final HTML of a rendered crawl, for reuse without another fetch
    pub fn rendered_html(&self) -> Option<&str> {
        match self.decision {
            Some(StrategyDecision::RenderedScroll) => self.pages.first().map(|p| p.html.as_str()),
            _ => None,
        }
    }
}

/// Adaptive pagination crawler
///
/// Cheap to clone: collaborators are shared behind `Arc`s and every clone
/// observes the same cancellation token.
///
/// # Example
///
/// ```no_run
/// use pagecrawl::{Config, Crawler, SeedRequest};
///
/// # async fn run() -> pagecrawl::Result<()> {
/// let crawler = Crawler::from_config(&Config::default())?;
/// let seed = SeedRequest::new("https://example.com/news?page=1", 3, 5)?;
/// let report = crawler.crawl(&seed).await;
/// for url in &report.urls {
///     println!("{}", url);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Crawler {
    fetcher: Arc<dyn PageFetcher>,
    renderer: Arc<dyn Renderer>,
    filter: Arc<dyn RelevanceFilter>,
    max_concurrent_seeds: usize,
    deadline: Option<Duration>,
    cancel: CancellationToken,
}

impl Crawler {
    /// Creates a crawler with the default relevance heuristic and no deadline
    pub fn new(fetcher: Arc<dyn PageFetcher>, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            fetcher,
            renderer,
            filter: Arc::new(KeywordRelevance::default()),
            max_concurrent_seeds: 4,
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Builds the production crawler: HTTP fetcher plus headless browser
    ///
    /// Without the `browser` feature, rendered seeds fall back to a plain
    /// HTTP snapshot.
    pub fn from_config(config: &Config) -> Result<Self, CrawlError> {
        let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new(&config.fetch)?);

        #[cfg(feature = "browser")]
        let renderer: Arc<dyn Renderer> =
            Arc::new(crate::crawler::browser::BrowserRenderer::new(config.render.clone()));
        #[cfg(not(feature = "browser"))]
        let renderer: Arc<dyn Renderer> = Arc::new(
            crate::crawler::render::HttpSnapshotRenderer::new(Arc::clone(&fetcher)),
        );

        Ok(Self::new(fetcher, renderer)
            .with_filter(Arc::new(KeywordRelevance::from(&config.relevance)))
            .with_max_concurrent_seeds(config.crawler.max_concurrent_seeds as usize)
            .with_deadline(config.crawler.crawl_deadline_secs.map(Duration::from_secs)))
    }

    pub fn with_filter(mut self, filter: Arc<dyn RelevanceFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_max_concurrent_seeds(mut self, n: usize) -> Self {
        self.max_concurrent_seeds = n.max(1);
        self
    }

    /// Wall-clock budget for a single `crawl` or a whole `crawl_all`
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that stops every in-progress crawl of this crawler when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Crawls one seed
    ///
    /// Never fails: problems are logged and reflected in the report.
    pub async fn crawl(&self, seed: &SeedRequest) -> CrawlReport {
        let deadline = self.deadline.map(|d| Instant::now() + d);
        self.crawl_until(seed, deadline).await
    }

    /// Crawls one seed and returns only the discovered URLs
    pub async fn crawl_urls(&self, seed: &SeedRequest) -> Vec<String> {
        self.crawl(seed).await.urls
    }

    /// Crawls all seeds concurrently, each with its own session
    ///
    /// Reports come back in seed order. A seed whose task panics is reported
    /// as a fallback to its own URL; other seeds are unaffected.
    pub async fn crawl_all(&self, seeds: &[SeedRequest]) -> Vec<CrawlReport> {
        let deadline = self.deadline.map(|d| Instant::now() + d);
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_seeds));

        tracing::info!(
            "Crawling {} seeds ({} at a time)",
            seeds.len(),
            self.max_concurrent_seeds
        );

        let handles: Vec<_> = seeds
            .iter()
            .cloned()
            .map(|seed| {
                let crawler = self.clone();
                let semaphore = Arc::clone(&semaphore);
                tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    crawler.crawl_until(&seed, deadline).await
                })
            })
            .collect();

        let mut reports = Vec::with_capacity(seeds.len());
        for (seed, handle) in seeds.iter().zip(handles) {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    tracing::error!("Crawl task for {} failed: {}", seed.url(), e);
                    reports.push(CrawlReport::fallback(seed, format!("crawl task failed: {}", e)));
                }
            }
        }
        reports
    }

    /// Raw HTML of a discovered URL, empty on failure
    pub async fn fetch_raw(&self, url: &str) -> String {
        fetch_raw(self.fetcher.as_ref(), url).await
    }

    /// Like [`Crawler::fetch_raw`], reusing content already in `cache`
    pub async fn fetch_raw_cached(&self, url: &str, cache: &mut ContentCache) -> String {
        fetch_raw_cached(self.fetcher.as_ref(), url, cache).await
    }

    async fn crawl_until(&self, seed: &SeedRequest, deadline: Option<Instant>) -> CrawlReport {
        let span = tracing::info_span!("seed", url = %seed.url());
        self.run_seed(seed, deadline).instrument(span).await
    }

    async fn run_seed(&self, seed: &SeedRequest, deadline: Option<Instant>) -> CrawlReport {
        let mut session = CrawlSession::new(seed.max_pages(), seed.max_render_steps());
        let mut decision = None;

        let result = self
            .drive(seed, &mut session, deadline, &mut decision)
            .await;

        let mut fell_back = false;
        let mut error = None;
        let stop = match result {
            Ok(stop) => Some(stop),
            Err(e @ CrawlError::Classification { .. }) => {
                tracing::warn!("{}", e);
                error = Some(e.to_string());
                None
            }
            Err(e) => {
                tracing::warn!("Strategy failed: {}", e);
                if session.is_empty() {
                    tracing::info!("Falling back to the seed URL");
                    session.accept(seed.url());
                    fell_back = true;
                }
                error = Some(e.to_string());
                None
            }
        };

        let mut report = CrawlReport::from_session(seed, session);
        report.decision = decision;
        report.stop = stop;
        report.fell_back = fell_back;
        report.error = error;

        tracing::info!(
            "Found {} URLs in {} pages, {} render steps ({})",
            report.urls.len(),
            report.pages_fetched,
            report.render_steps,
            report
                .stop
                .as_ref()
                .map_or_else(|| "failed".to_string(), ToString::to_string)
        );
        report
    }

    async fn drive(
        &self,
        seed: &SeedRequest,
        session: &mut CrawlSession,
        deadline: Option<Instant>,
        decision: &mut Option<StrategyDecision>,
    ) -> Result<StopReason, CrawlError> {
        let classification = match self
            .guarded(deadline, classify(seed.url(), self.fetcher.as_ref()))
            .await
        {
            Ok(classification) => classification?,
            Err(stop) => return Ok(stop),
        };
        *decision = Some(classification.decision);
        tracing::info!("Using {} pagination", classification.decision);

        // The classifier's fetch is the first page of the budget
        let seed_html = match classification.seed_page {
            Some(page) => {
                if !session.try_begin_page() {
                    return Ok(StopReason::PageCap);
                }
                session.mark_visited(seed.url());
                Some(page.into_body())
            }
            None => None,
        };

        let mut strategy = strategy_for(classification.decision, seed, seed_html);
        let ctx = StrategyContext {
            seed,
            fetcher: self.fetcher.as_ref(),
            renderer: self.renderer.as_ref(),
            filter: self.filter.as_ref(),
        };

        loop {
            let outcome = match self
                .guarded(deadline, strategy.advance(&ctx, session))
                .await
            {
                Ok(outcome) => outcome?,
                Err(stop) => return Ok(stop),
            };

            match outcome {
                StepOutcome::Continue => {
                    tracing::debug!(
                        "{} URLs after {} pages",
                        session.len(),
                        session.pages_fetched()
                    );
                }
                StepOutcome::Stop(reason) => return Ok(reason),
            }
        }
    }

    /// Runs `work` unless the crawl is cancelled or the deadline passes first
    async fn guarded<F: Future>(
        &self,
        deadline: Option<Instant>,
        work: F,
    ) -> Result<F::Output, StopReason> {
        if self.cancel.is_cancelled() {
            return Err(StopReason::Cancelled);
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                tracing::info!("Crawl cancelled");
                Err(StopReason::Cancelled)
            }
            _ = wait_for(deadline) => {
                tracing::info!("Crawl deadline reached");
                Err(StopReason::DeadlineReached)
            }
            output = work => Ok(output),
        }
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
