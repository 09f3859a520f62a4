use super::{harvest, PaginationStrategy, StepOutcome, StopReason, StrategyContext};
use crate::crawler::classifier::StrategyDecision;
use crate::state::CrawlSession;
use crate::CrawlError;
use async_trait::async_trait;

/// One render session over the seed; links come from the final DOM only
#[derive(Debug, Clone, Default)]
pub struct RenderedScroll {
    done: bool,
}

impl RenderedScroll {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaginationStrategy for RenderedScroll {
    fn decision(&self) -> StrategyDecision {
        StrategyDecision::RenderedScroll
    }

    async fn advance(
        &mut self,
        ctx: &StrategyContext<'_>,
        session: &mut CrawlSession,
    ) -> Result<StepOutcome, CrawlError> {
        if self.done || session.remaining_render_steps() == 0 {
            return Ok(StepOutcome::Stop(StopReason::PageCap));
        }
        self.done = true;

        let seed = ctx.seed.url();
        let rendered = ctx
            .renderer
            .render_and_collect(seed, session.remaining_render_steps())
            .await?;
        session.record_render_steps(rendered.steps_taken);

        if rendered.html.is_empty() {
            tracing::warn!("Render of {} produced no content ({})", seed, rendered.stop);
        } else {
            harvest(session, &rendered.html, seed, ctx.filter);
            session.record_page(seed, rendered.html);
        }

        Ok(StepOutcome::Stop(StopReason::Rendered(rendered.stop)))
    }
}
