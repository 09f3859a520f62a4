//! Strategy classification
//!
//! Picks one pagination strategy per seed, once, before any pagination
//! happens. The decision never changes mid-crawl.

use crate::crawler::fetcher::{FetchResult, PageFetcher};
use crate::crawler::parser::has_pagination_anchor;
use crate::url::looks_like_static_pagination;
use crate::CrawlError;
use serde::Serialize;
use std::fmt;
use url::Url;

/// How a seed's listing is paginated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyDecision {
    /// Page number in the URL (`?page=2`, `/p/2`)
    StaticOffset,
    /// Explicit "next" anchors between pages
    LinkFollow,
    /// JavaScript-driven infinite scroll or "load more"
    RenderedScroll,
}

impl fmt::Display for StrategyDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StaticOffset => write!(f, "static-offset"),
            Self::LinkFollow => write!(f, "link-follow"),
            Self::RenderedScroll => write!(f, "rendered-scroll"),
        }
    }
}

/// Result of classifying a seed
#[derive(Debug, Clone)]
pub struct Classification {
    pub decision: StrategyDecision,
    /// The seed page, if it had to be fetched to decide
    pub seed_page: Option<FetchResult>,
}

/// Classifies a seed URL
///
/// 1. A pagination token in the URL itself means StaticOffset (no fetch)
/// 2. Otherwise the seed page is fetched once; a "next"/"more" anchor means
///    LinkFollow
/// 3. Anything else is assumed to be JavaScript-driven: RenderedScroll
///
/// Fails with [`CrawlError::Classification`] only when the seed page cannot be
/// fetched.
pub async fn classify(seed: &Url, fetcher: &dyn PageFetcher) -> Result<Classification, CrawlError> {
    if looks_like_static_pagination(seed.as_str()) {
        tracing::debug!("{} carries a pagination token", seed);
        return Ok(Classification {
            decision: StrategyDecision::StaticOffset,
            seed_page: None,
        });
    }

    let page = fetcher.fetch(seed).await;
    let decision = match page.body() {
        Some(body) if has_pagination_anchor(body) => StrategyDecision::LinkFollow,
        Some(_) => StrategyDecision::RenderedScroll,
        None => {
            return Err(CrawlError::Classification {
                url: seed.to_string(),
                reason: page
                    .failure_reason()
                    .unwrap_or("seed page could not be fetched")
                    .to_string(),
            })
        }
    };

    tracing::debug!("Classified {} as {}", seed, decision);
    Ok(Classification {
        decision,
        seed_page: Some(page),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::fetcher::{FailureKind, FetchOutcome};
    use async_trait::async_trait;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubFetcher {
        body: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl StubFetcher {
        fn new(body: Option<&'static str>) -> Self {
            Self {
                body,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PageFetcher for StubFetcher {
        async fn fetch(&self, url: &Url) -> FetchResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let outcome = match self.body {
                Some(body) => FetchOutcome::Success {
                    final_url: url.to_string(),
                    status_code: 200,
                    body: body.to_string(),
                },
                None => FetchOutcome::Failed {
                    status_code: Some(404),
                    reason: "HTTP 404".to_string(),
                    kind: FailureKind::Permanent,
                },
            };
            FetchResult::new(url, outcome, 1)
        }
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_static_pattern_skips_fetch() {
        let fetcher = StubFetcher::new(None);
        let result = classify(&url("https://example.com/news?page=1"), &fetcher)
            .await
            .unwrap();
        assert_eq!(result.decision, StrategyDecision::StaticOffset);
        assert!(result.seed_page.is_none());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_next_anchor_means_link_follow() {
        let fetcher = StubFetcher::new(Some(r#"<a href="/archive/2">Next page</a>"#));
        let result = classify(&url("https://example.com/archive"), &fetcher)
            .await
            .unwrap();
        assert_eq!(result.decision, StrategyDecision::LinkFollow);
        assert!(result.seed_page.unwrap().is_success());
    }

    #[tokio::test]
    async fn test_no_anchor_means_rendered_scroll() {
        let fetcher = StubFetcher::new(Some(r#"<a href="/article/1">Robots</a>"#));
        let result = classify(&url("https://example.com/blog"), &fetcher)
            .await
            .unwrap();
        assert_eq!(result.decision, StrategyDecision::RenderedScroll);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_classification_error() {
        let fetcher = StubFetcher::new(None);
        let err = classify(&url("https://example.com/blog"), &fetcher)
            .await
            .unwrap_err();
        assert!(matches!(err, CrawlError::Classification { .. }));
    }

    #[test]
    fn test_decision_display() {
        assert_eq!(StrategyDecision::LinkFollow.to_string(), "link-follow");
        assert_eq!(
            serde_json::to_string(&StrategyDecision::RenderedScroll).unwrap(),
            "\"rendered_scroll\""
        );
    }

    proptest! {
        #[test]
        fn prop_paginated_seeds_are_static(
            path in "[a-z]{1,10}",
            n in 0u32..100_000,
            slash in any::<bool>(),
        ) {
            let seed = if slash {
                format!("https://example.com/{}/p/{}", path, n)
            } else {
                format!("https://example.com/{}?page={}", path, n)
            };
            let fetcher = StubFetcher::new(None);
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let result = runtime.block_on(classify(&url(&seed), &fetcher)).unwrap();
            prop_assert_eq!(result.decision, StrategyDecision::StaticOffset);
        }
    }
}
