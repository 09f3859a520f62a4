use super::{harvest, PaginationStrategy, StepOutcome, StopReason, StrategyContext};
use crate::crawler::classifier::StrategyDecision;
use crate::state::CrawlSession;
use crate::url::with_page_number;
use crate::CrawlError;
use async_trait::async_trait;
use url::Url;

/// Walks `page=1, page=2, ...` by rewriting the seed's pagination token
#[derive(Debug, Clone)]
pub struct StaticOffset {
    template: String,
    next_page: u32,
}

impl StaticOffset {
    pub fn new(seed: &Url) -> Self {
        Self {
            template: seed.to_string(),
            next_page: 1,
        }
    }

    fn page_url(&self) -> Result<Url, CrawlError> {
        let rewritten = with_page_number(&self.template, self.next_page).ok_or_else(|| {
            CrawlError::NoPaginationToken {
                url: self.template.clone(),
            }
        })?;
        Ok(Url::parse(&rewritten)?)
    }
}

#[async_trait]
impl PaginationStrategy for StaticOffset {
    fn decision(&self) -> StrategyDecision {
        StrategyDecision::StaticOffset
    }

    async fn advance(
        &mut self,
        ctx: &StrategyContext<'_>,
        session: &mut CrawlSession,
    ) -> Result<StepOutcome, CrawlError> {
        let page_url = self.page_url()?;

        if !session.mark_visited(&page_url) {
            return Ok(StepOutcome::Stop(StopReason::Cycle));
        }
        if !session.try_begin_page() {
            return Ok(StepOutcome::Stop(StopReason::PageCap));
        }

        tracing::debug!("Fetching page {}: {}", self.next_page, page_url);
        let result = ctx.fetcher.fetch(&page_url).await;
        let Some(html) = result.body() else {
            tracing::info!(
                "Stopping at page {}: {}",
                self.next_page,
                result.failure_reason().unwrap_or("fetch failed")
            );
            return Ok(StepOutcome::Stop(StopReason::FetchFailed));
        };

        let new = harvest(session, html, &page_url, ctx.filter);
        session.record_page(&page_url, result.into_body());

        if new == 0 {
            return Ok(StepOutcome::Stop(StopReason::NoNewLinks));
        }
        self.next_page += 1;
        Ok(StepOutcome::Continue)
    }
}
