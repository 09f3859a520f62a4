//! Rendered fetching for JavaScript-driven listings
//!
//! A [`Renderer`] loads a page, drives progressive loading (clicking a
//! "load more" control or scrolling) for a bounded number of steps, and hands
//! back the final HTML. Partial results are preferred over failures: once the
//! renderer is up, timeouts end the session early instead of erroring.

use crate::crawler::fetcher::PageFetcher;
use crate::RenderError;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Why a render session ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum RenderStop {
    /// All allowed steps were performed
    StepBudget,
    /// A step produced no new anchors
    NoNewContent,
    /// The DOM did not settle within the step timeout
    IdleTimeout,
    /// Navigation to the seed failed or timed out
    NavigationFailed(String),
    /// A scroll or click could not be performed
    StepFailed(String),
    /// Plain HTTP snapshot, no steps performed
    Snapshot,
}

impl fmt::Display for RenderStop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StepBudget => write!(f, "step budget reached"),
            Self::NoNewContent => write!(f, "no new content"),
            Self::IdleTimeout => write!(f, "timed out waiting for idle"),
            Self::NavigationFailed(e) => write!(f, "navigation failed: {}", e),
            Self::StepFailed(e) => write!(f, "step failed: {}", e),
            Self::Snapshot => write!(f, "static snapshot"),
        }
    }
}

/// Final state of a render session
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// HTML at the end of the session; empty if nothing could be loaded
    pub html: String,
    /// Scroll/click iterations performed
    pub steps_taken: u32,
    pub stop: RenderStop,
}

/// Loads a page after JavaScript-driven content has been revealed
///
/// `max_steps` is a hard upper bound on scroll/click iterations. Only failing
/// to start a session at all is an error.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render_and_collect(
        &self,
        url: &Url,
        max_steps: u32,
    ) -> Result<RenderedPage, RenderError>;
}

/// Renderer that returns the plain HTTP response without running scripts
///
/// Used when headless browser support is compiled out.
#[derive(Clone)]
pub struct HttpSnapshotRenderer {
    fetcher: Arc<dyn PageFetcher>,
}

impl HttpSnapshotRenderer {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl Renderer for HttpSnapshotRenderer {
    async fn render_and_collect(
        &self,
        url: &Url,
        _max_steps: u32,
    ) -> Result<RenderedPage, RenderError> {
        let result = self.fetcher.fetch(url).await;
        let stop = match result.failure_reason() {
            Some(reason) => RenderStop::NavigationFailed(reason.to_string()),
            None => RenderStop::Snapshot,
        };

        Ok(RenderedPage {
            html: result.into_body(),
            steps_taken: 0,
            stop,
        })
    }
}
