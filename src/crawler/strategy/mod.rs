//! Pagination strategies
//!
//! Each strategy advances a seed's crawl one listing page at a time. All of
//! them share the same session (seen set, accumulator, budgets) and stop on
//! their own terms, reported as a [`StopReason`].

mod link_follow;
mod rendered;
mod static_offset;

pub use link_follow::LinkFollow;
pub use rendered::RenderedScroll;
pub use static_offset::StaticOffset;

use crate::config::SeedRequest;
use crate::crawler::classifier::StrategyDecision;
use crate::crawler::fetcher::PageFetcher;
use crate::crawler::parser::{extract_links, RelevanceFilter};
use crate::crawler::render::{RenderStop, Renderer};
use crate::state::CrawlSession;
use crate::CrawlError;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use url::Url;

/// Why a seed's crawl stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum StopReason {
    /// `max-pages` listing pages were fetched
    PageCap,
    /// A listing page contributed no unseen links
    NoNewLinks,
    /// A listing page could not be fetched
    FetchFailed,
    /// No "next" anchor on the last page
    NoNextLink,
    /// The next page had already been visited
    Cycle,
    /// The single render session ended
    Rendered(RenderStop),
    /// The crawl was cancelled by the caller
    Cancelled,
    /// The crawl deadline passed
    DeadlineReached,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PageCap => write!(f, "page cap reached"),
            Self::NoNewLinks => write!(f, "no new links"),
            Self::FetchFailed => write!(f, "fetch failed"),
            Self::NoNextLink => write!(f, "no next link"),
            Self::Cycle => write!(f, "pagination cycle"),
            Self::Rendered(stop) => write!(f, "rendered ({})", stop),
            Self::Cancelled => write!(f, "cancelled"),
            Self::DeadlineReached => write!(f, "deadline reached"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Stop(StopReason),
}

/// Collaborators a strategy needs for one step
pub struct StrategyContext<'a> {
    pub seed: &'a SeedRequest,
    pub fetcher: &'a dyn PageFetcher,
    pub renderer: &'a dyn Renderer,
    pub filter: &'a dyn RelevanceFilter,
}

/// Advances a crawl by one listing page
#[async_trait]
pub trait PaginationStrategy: Send {
    fn decision(&self) -> StrategyDecision;

    /// Processes the next listing page
    ///
    /// Errors are reserved for failures that make the whole strategy unusable;
    /// an unreachable page is a [`StopReason::FetchFailed`].
    async fn advance(
        &mut self,
        ctx: &StrategyContext<'_>,
        session: &mut CrawlSession,
    ) -> Result<StepOutcome, CrawlError>;
}

/// Builds the strategy for a decision
///
/// `seed_page` is the seed HTML already fetched by the classifier, if any.
pub fn strategy_for(
    decision: StrategyDecision,
    seed: &SeedRequest,
    seed_page: Option<String>,
) -> Box<dyn PaginationStrategy> {
    match decision {
        StrategyDecision::StaticOffset => Box::new(StaticOffset::new(seed.url())),
        StrategyDecision::LinkFollow => Box::new(LinkFollow::new(seed.url().clone(), seed_page)),
        StrategyDecision::RenderedScroll => Box::new(RenderedScroll::new()),
    }
}

/// Extracts relevant links from a listing page into the session
///
/// Returns the number of links that were not seen before.
fn harvest(
    session: &mut CrawlSession,
    html: &str,
    page_url: &Url,
    filter: &dyn RelevanceFilter,
) -> usize {
    let links = extract_links(html, page_url, filter);
    let found = links.len();
    let new = links
        .iter()
        .filter(|link| session.accept(&link.absolute_url))
        .count();
    tracing::debug!("{}: {} relevant links, {} new", page_url, found, new);
    new
}
