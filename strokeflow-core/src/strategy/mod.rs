//! # Stroke strategies
//!
//! A strategy is the state machine behind one stroke. The executor drives it through its job
//! categories: `Init`, then any number of `DoStroke` jobs (optionally interrupted by
//! `Suspend`/`Resume` pairs), then exactly one of `Finish` or `Cancel`.

pub mod runnable;

pub use runnable::{RunnableBasedStrokeStrategy, RunnableHooks};

use crate::executor::StrokeContext;
use crate::job::{Exclusivity, JobError, JobPayload, JobTags, Sequentiality};

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, strum::AsRefStr)]
pub enum JobCategory {
    Init,
    DoStroke,
    Suspend,
    Resume,
    Cancel,
    Finish,
}
impl JobCategory {
    /// Categories after which the stroke is over.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancel | Self::Finish)
    }
    /// Categories that wait for the stroke to go idle before starting, regardless of their tags.
    #[must_use]
    pub fn needs_idle(self) -> bool {
        matches!(self, Self::Init | Self::Cancel | Self::Finish)
    }
}

/// How the executor treats one of a strategy's fixed categories.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct CategoryConfig {
    /// If disabled, the category's job still takes its place in the queue but the callback is skipped.
    pub enabled: bool,
    pub sequentiality: Sequentiality,
    pub exclusivity: Exclusivity,
}
impl CategoryConfig {
    const fn new(sequentiality: Sequentiality, exclusivity: Exclusivity) -> Self {
        Self {
            enabled: true,
            sequentiality,
            exclusivity,
        }
    }
    /// Tags of this category's job.
    #[must_use]
    pub fn tags(&self) -> JobTags {
        JobTags {
            // Rollback and state machine jobs are never skipped.
            cancellable: false,
            ..JobTags::new(self.sequentiality, self.exclusivity)
        }
    }
}

#[derive(Clone, Debug)]
pub struct StrategyConfig {
    /// Name for logs.
    pub name: &'static str,
    pub init: CategoryConfig,
    pub suspend: CategoryConfig,
    pub resume: CategoryConfig,
    pub cancel: CategoryConfig,
    pub finish: CategoryConfig,
    /// If set, cancelling a suspended stroke still runs the cancel callback. Otherwise a suspended
    /// stroke is considered already rewound and is dropped quietly.
    pub needs_explicit_cancel: bool,
}
impl StrategyConfig {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            init: CategoryConfig::new(Sequentiality::Sequential, Exclusivity::Normal),
            suspend: CategoryConfig::new(Sequentiality::Barrier, Exclusivity::Normal),
            resume: CategoryConfig::new(Sequentiality::Barrier, Exclusivity::Normal),
            // Exclusive so that no partial work races the rollback.
            cancel: CategoryConfig::new(Sequentiality::Sequential, Exclusivity::Exclusive),
            finish: CategoryConfig::new(Sequentiality::Sequential, Exclusivity::Normal),
            needs_explicit_cancel: false,
        }
    }
    /// Config of a fixed category. None for `DoStroke`, whose jobs carry their own tags.
    #[must_use]
    pub fn category(&self, category: JobCategory) -> Option<&CategoryConfig> {
        match category {
            JobCategory::Init => Some(&self.init),
            JobCategory::DoStroke => None,
            JobCategory::Suspend => Some(&self.suspend),
            JobCategory::Resume => Some(&self.resume),
            JobCategory::Cancel => Some(&self.cancel),
            JobCategory::Finish => Some(&self.finish),
        }
    }
    #[must_use]
    pub fn enable(mut self, category: JobCategory, enabled: bool) -> Self {
        if let Some(config) = self.category_mut(category) {
            config.enabled = enabled;
        }
        self
    }
    #[must_use]
    pub fn with_tags(
        mut self,
        category: JobCategory,
        sequentiality: Sequentiality,
        exclusivity: Exclusivity,
    ) -> Self {
        if let Some(config) = self.category_mut(category) {
            config.sequentiality = sequentiality;
            config.exclusivity = exclusivity;
        }
        self
    }
    #[must_use]
    pub fn needs_explicit_cancel(mut self, needs: bool) -> Self {
        self.needs_explicit_cancel = needs;
        self
    }
    fn category_mut(&mut self, category: JobCategory) -> Option<&mut CategoryConfig> {
        match category {
            JobCategory::Init => Some(&mut self.init),
            JobCategory::DoStroke => None,
            JobCategory::Suspend => Some(&mut self.suspend),
            JobCategory::Resume => Some(&mut self.resume),
            JobCategory::Cancel => Some(&mut self.cancel),
            JobCategory::Finish => Some(&mut self.finish),
        }
    }
}

/// The state machine contract of a stroke.
///
/// Callbacks run on worker threads, possibly concurrently with each other for `DoStroke` jobs,
/// hence `&self`. Retained-command bookkeeping (rewind on suspend, redo on resume, undo on cancel)
/// is done by the executor around these callbacks.
pub trait StrokeStrategy: Send + Sync {
    fn config(&self) -> &StrategyConfig;

    fn init_stroke_callback(&self, _ctx: &StrokeContext) -> Result<(), JobError> {
        Ok(())
    }
    fn do_stroke_callback(&self, payload: JobPayload, ctx: &StrokeContext)
        -> Result<(), JobError>;
    fn suspend_stroke_callback(&self, _ctx: &StrokeContext) -> Result<(), JobError> {
        Ok(())
    }
    fn resume_stroke_callback(&self, _ctx: &StrokeContext) -> Result<(), JobError> {
        Ok(())
    }
    fn cancel_stroke_callback(&self, _ctx: &StrokeContext) -> Result<(), JobError> {
        Ok(())
    }
    fn finish_stroke_callback(&self, _ctx: &StrokeContext) -> Result<(), JobError> {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{JobCategory, StrategyConfig};
    use crate::job::{Exclusivity, Sequentiality};

    #[test]
    fn default_categories() {
        let config = StrategyConfig::new("test");
        assert_eq!(config.init.sequentiality, Sequentiality::Sequential);
        assert_eq!(config.suspend.sequentiality, Sequentiality::Barrier);
        assert_eq!(config.resume.sequentiality, Sequentiality::Barrier);
        assert_eq!(config.cancel.sequentiality, Sequentiality::Sequential);
        assert_eq!(config.cancel.exclusivity, Exclusivity::Exclusive);
        assert!(config.category(JobCategory::DoStroke).is_none());
        assert!(!config.cancel.tags().cancellable);
    }
    #[test]
    fn builder_overrides() {
        let config = StrategyConfig::new("test")
            .enable(JobCategory::Init, false)
            .with_tags(
                JobCategory::Finish,
                Sequentiality::Barrier,
                Exclusivity::Exclusive,
            )
            .needs_explicit_cancel(true);
        assert!(!config.init.enabled);
        assert_eq!(config.finish.sequentiality, Sequentiality::Barrier);
        assert_eq!(config.finish.exclusivity, Exclusivity::Exclusive);
        assert!(config.needs_explicit_cancel);
    }
}
