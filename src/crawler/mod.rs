//! Crawler module for listing-page pagination
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with bounded retry and backoff
//! - Rendered fetching of JavaScript-driven listings
//! - HTML parsing: candidate links and "next" anchors
//! - Classification of each seed into a pagination strategy
//! - The strategies themselves and the per-seed orchestration

#[cfg(feature = "browser")]
mod browser;
mod classifier;
mod coordinator;
mod fetcher;
mod parser;
mod render;
mod retry;
mod strategy;

#[cfg(feature = "browser")]
pub use browser::BrowserRenderer;
pub use classifier::{classify, Classification, StrategyDecision};
pub use coordinator::{CrawlReport, Crawler};
pub use fetcher::{
    build_http_client, classify_status, fetch_raw, fetch_raw_cached, ContentCache, FailureKind,
    FetchOutcome, FetchResult, HttpFetcher, PageFetcher, Sleeper, TokioSleeper,
};
pub use parser::{
    extract_links, find_next_link, has_pagination_anchor, AcceptAll, CandidateLink,
    KeywordRelevance, RelevanceFilter,
};
pub use render::{HttpSnapshotRenderer, RenderStop, RenderedPage, Renderer};
pub use retry::{RetryDecision, RetryPolicy, RetryState};
pub use strategy::{
    strategy_for, LinkFollow, PaginationStrategy, RenderedScroll, StaticOffset, StepOutcome,
    StopReason, StrategyContext,
};
