//! The long-running poll loop driving the pipeline.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::pipeline::{CycleReport, DraftPipeline};

/// Wait after a cycle that completed.
pub const DEFAULT_NORMAL_INTERVAL: Duration = Duration::from_secs(10);

/// Wait after a cycle that failed as a whole.
pub const DEFAULT_ERROR_COOLDOWN: Duration = Duration::from_secs(300);

/// One unit of polled work.
#[async_trait]
pub trait Cycle: Send + Sync {
    async fn run_cycle(&self) -> Result<CycleReport>;
}

#[async_trait]
impl Cycle for DraftPipeline {
    async fn run_cycle(&self) -> Result<CycleReport> {
        DraftPipeline::run_cycle(self).await
    }
}

/// The two delays between cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayPolicy {
    pub normal_interval: Duration,
    pub error_cooldown: Duration,
}

impl Default for DelayPolicy {
    fn default() -> Self {
        Self {
            normal_interval: DEFAULT_NORMAL_INTERVAL,
            error_cooldown: DEFAULT_ERROR_COOLDOWN,
        }
    }
}

impl DelayPolicy {
    /// Delay to wait after a cycle with the given outcome.
    pub fn after<T, E>(&self, outcome: &std::result::Result<T, E>) -> Duration {
        match outcome {
            Ok(_) => self.normal_interval,
            Err(_) => self.error_cooldown,
        }
    }
}

/// Totals over the lifetime of a loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    /// Cycles that ran to completion or failed (interrupted ones excluded).
    pub cycles: u64,
    pub failed_cycles: u64,
    pub processed: u64,
    pub failed: u64,
}

/// Runs cycles until cancelled.
///
/// There is no retry ceiling: a failing cycle only switches the next delay
/// to the cool-down. Cancellation is observed between cycles, during the
/// delay and while a cycle runs; an interrupted cycle leaves its current
/// item unread.
pub struct PollLoop {
    policy: DelayPolicy,
    cancel: CancellationToken,
}

impl PollLoop {
    pub fn new(policy: DelayPolicy, cancel: CancellationToken) -> Self {
        Self { policy, cancel }
    }

    pub async fn run(&self, cycle: &dyn Cycle) -> LoopSummary {
        let mut summary = LoopSummary::default();
        info!(
            normal_secs = self.policy.normal_interval.as_secs(),
            cooldown_secs = self.policy.error_cooldown.as_secs(),
            "Poll loop started"
        );

        while !self.cancel.is_cancelled() {
            let outcome = tokio::select! {
                outcome = cycle.run_cycle() => outcome,
                _ = self.cancel.cancelled() => break,
            };

            summary.cycles += 1;
            match &outcome {
                Ok(report) => {
                    summary.processed += report.processed as u64;
                    summary.failed += report.failed as u64;
                }
                Err(e) => {
                    summary.failed_cycles += 1;
                    error!(error = %e, "Cycle failed, cooling down");
                }
            }

            let delay = self.policy.after(&outcome);
            debug!(secs = delay.as_secs(), "Waiting for next cycle");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.cancel.cancelled() => break,
            }
        }

        info!(
            cycles = summary.cycles,
            failed_cycles = summary.failed_cycles,
            processed = summary.processed,
            failed = summary.failed,
            "Poll loop stopped"
        );
        summary
    }
}
