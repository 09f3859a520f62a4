use super::{harvest, PaginationStrategy, StepOutcome, StopReason, StrategyContext};
use crate::crawler::classifier::StrategyDecision;
use crate::crawler::parser::find_next_link;
use crate::state::CrawlSession;
use crate::CrawlError;
use async_trait::async_trait;
use url::Url;

/// Follows explicit "next" anchors from the seed page onwards
#[derive(Debug, Clone)]
pub struct LinkFollow {
    next: Option<Url>,
    /// Seed HTML fetched during classification, consumed by the first step
    primed: Option<String>,
}

impl LinkFollow {
    /// `seed_page` must already be counted against the page budget and marked
    /// visited when given.
    pub fn new(seed: Url, seed_page: Option<String>) -> Self {
        Self {
            next: Some(seed),
            primed: seed_page,
        }
    }
}

#[async_trait]
impl PaginationStrategy for LinkFollow {
    fn decision(&self) -> StrategyDecision {
        StrategyDecision::LinkFollow
    }

    async fn advance(
        &mut self,
        ctx: &StrategyContext<'_>,
        session: &mut CrawlSession,
    ) -> Result<StepOutcome, CrawlError> {
        let Some(current) = self.next.take() else {
            return Ok(StepOutcome::Stop(StopReason::NoNextLink));
        };

        let html = match self.primed.take() {
            Some(html) => html,
            None => {
                if !session.mark_visited(&current) {
                    return Ok(StepOutcome::Stop(StopReason::Cycle));
                }
                if !session.try_begin_page() {
                    return Ok(StepOutcome::Stop(StopReason::PageCap));
                }
                let result = ctx.fetcher.fetch(&current).await;
                if !result.is_success() {
                    tracing::info!(
                        "Stopping at {}: {}",
                        current,
                        result.failure_reason().unwrap_or("fetch failed")
                    );
                    return Ok(StepOutcome::Stop(StopReason::FetchFailed));
                }
                result.into_body()
            }
        };

        let new = harvest(session, &html, &current, ctx.filter);
        let next = find_next_link(&html, &current);
        session.record_page(&current, html);

        if new == 0 {
            return Ok(StepOutcome::Stop(StopReason::NoNewLinks));
        }

        match next {
            None => Ok(StepOutcome::Stop(StopReason::NoNextLink)),
            Some(next) if session.was_visited(&next) => {
                tracing::debug!("Next link {} was already visited", next);
                Ok(StepOutcome::Stop(StopReason::Cycle))
            }
            Some(next) => {
                self.next = Some(next);
                Ok(StepOutcome::Continue)
            }
        }
    }
}
