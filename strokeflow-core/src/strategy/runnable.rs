//! The general purpose strategy: every `DoStroke` job simply executes its payload.

use super::{StrategyConfig, StrokeStrategy};
use crate::executor::StrokeContext;
use crate::job::{JobError, JobPayload};

/// Optional behavior around the lifetime of a [`RunnableBasedStrokeStrategy`].
///
/// Any hook may submit further jobs through [`StrokeContext::jobs`].
pub trait RunnableHooks: Send + Sync {
    fn init(&self, _ctx: &StrokeContext) -> Result<(), JobError> {
        Ok(())
    }
    fn cancel(&self, _ctx: &StrokeContext) -> Result<(), JobError> {
        Ok(())
    }
    fn finish(&self, _ctx: &StrokeContext) -> Result<(), JobError> {
        Ok(())
    }
}
impl RunnableHooks for () {}

/// Strategy whose jobs are the work itself: runnables and commands carried in the payload.
pub struct RunnableBasedStrokeStrategy<H: RunnableHooks = ()> {
    config: StrategyConfig,
    hooks: H,
}
impl RunnableBasedStrokeStrategy<()> {
    #[must_use]
    pub fn new(config: StrategyConfig) -> Self {
        Self { config, hooks: () }
    }
}
impl<H: RunnableHooks> RunnableBasedStrokeStrategy<H> {
    #[must_use]
    pub fn with_hooks(config: StrategyConfig, hooks: H) -> Self {
        Self { config, hooks }
    }
    #[must_use]
    pub fn hooks(&self) -> &H {
        &self.hooks
    }
}
impl<H: RunnableHooks> StrokeStrategy for RunnableBasedStrokeStrategy<H> {
    fn config(&self) -> &StrategyConfig {
        &self.config
    }
    fn init_stroke_callback(&self, ctx: &StrokeContext) -> Result<(), JobError> {
        self.hooks.init(ctx)
    }
    fn do_stroke_callback(&self, payload: JobPayload, ctx: &StrokeContext) -> Result<(), JobError> {
        ctx.execute(payload)
    }
    fn cancel_stroke_callback(&self, ctx: &StrokeContext) -> Result<(), JobError> {
        self.hooks.cancel(ctx)
    }
    fn finish_stroke_callback(&self, ctx: &StrokeContext) -> Result<(), JobError> {
        self.hooks.finish(ctx)
    }
}
