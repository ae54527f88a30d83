//! Ordered fallback chains with an attempt budget.
//!
//! A chain is a list of stages tried strictly in order. The driver stops at
//! the first stage that produces a value or when the budget is spent.
//! Stages that do not apply to an entity are skipped without consuming
//! budget.

use async_trait::async_trait;
use linkwise_core::{Error, FallbackStage};
use tracing::debug;

/// Why a stage produced no value.
#[derive(Debug)]
pub enum StageFailure {
    /// The stage has nothing to work with (no URL, no translator, ...).
    NotApplicable,
    /// The stage ran and found nothing acceptable.
    NoMatch,
    /// The stage ran and hit an error.
    Failed(Error),
}

impl From<Error> for StageFailure {
    fn from(e: Error) -> Self {
        Self::Failed(e)
    }
}

/// Runs one stage of a chain for one entity.
#[async_trait]
pub trait StageExecutor<T: Send>: Send {
    async fn run_stage(&mut self, stage: FallbackStage) -> Result<T, StageFailure>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackPlan {
    stages: Vec<FallbackStage>,
    max_attempts: u32,
}

impl FallbackPlan {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            stages: Vec::new(),
            max_attempts,
        }
    }

    /// Append a stage if it is enabled.
    pub fn stage(mut self, stage: FallbackStage, enabled: bool) -> Self {
        if enabled && !self.stages.contains(&stage) {
            self.stages.push(stage);
        }
        self
    }

    /// Drop stages that were already attempted for this entity.
    pub fn without(mut self, attempted: &[FallbackStage]) -> Self {
        self.stages.retain(|s| !attempted.contains(s));
        self
    }

    pub fn stages(&self) -> &[FallbackStage] {
        &self.stages
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty() || self.max_attempts == 0
    }
}

/// Result of running a chain.
#[derive(Debug)]
pub struct ChainOutcome<T> {
    pub value: Option<T>,
    /// Stage that produced `value`.
    pub stage: Option<FallbackStage>,
    /// Stages actually run, successful or not.
    pub attempts: u32,
    pub attempted: Vec<FallbackStage>,
    pub last_error: Option<Error>,
}

impl<T> ChainOutcome<T> {
    pub fn is_success(&self) -> bool {
        self.value.is_some()
    }
}

pub async fn run_chain<T, E>(plan: &FallbackPlan, executor: &mut E) -> ChainOutcome<T>
where
    T: Send,
    E: StageExecutor<T> + ?Sized,
{
    let mut outcome = ChainOutcome {
        value: None,
        stage: None,
        attempts: 0,
        attempted: Vec::new(),
        last_error: None,
    };

    for &stage in plan.stages() {
        if outcome.attempts >= plan.max_attempts() {
            debug!(
                "Fallback budget exhausted attempts={} next={}",
                outcome.attempts, stage
            );
            break;
        }
        match executor.run_stage(stage).await {
            Ok(value) => {
                outcome.attempts += 1;
                outcome.attempted.push(stage);
                outcome.value = Some(value);
                outcome.stage = Some(stage);
                debug!("Fallback stage succeeded stage={}", stage);
                break;
            }
            Err(StageFailure::NotApplicable) => {
                debug!("Fallback stage not applicable stage={}", stage);
            }
            Err(StageFailure::NoMatch) => {
                outcome.attempts += 1;
                outcome.attempted.push(stage);
                debug!("Fallback stage found nothing stage={}", stage);
            }
            Err(StageFailure::Failed(e)) => {
                outcome.attempts += 1;
                outcome.attempted.push(stage);
                debug!("Fallback stage failed stage={} error={}", stage, e);
                outcome.last_error = Some(e);
            }
        }
    }
    outcome
}
