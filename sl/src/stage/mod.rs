//! Stage loops
//!
//! Each stage is a small state machine run as its own task. A cycle either
//! completes, notices the run has stopped, or fails. A failed cycle is
//! logged, cleaned up after, and retried after a fixed backoff; a stage is
//! never killed by one failure.

#[cfg(test)]
pub(crate) mod mock;
mod quota;
mod stage1;
mod stage2;
mod stage3;
mod station;

pub use quota::ColorQuota;
pub use stage1::Loader;
pub use stage2::Transfer;
pub use stage3::{Destination, Sorter, destination};
pub use station::{StopObservation, Station};

use std::time::Duration;

use async_trait::async_trait;
use tracing::{Instrument, error, info, info_span};

use crate::coordinator::RunControl;

/// Outcome of one stage cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Item handled; start the next cycle
    Done,
    /// The run stopped during the cycle
    Stopped,
}

/// One of the three line stages
#[async_trait]
pub trait Stage: Send + 'static {
    fn name(&self) -> &'static str;

    /// Delay after a failed cycle
    fn backoff(&self) -> Duration;

    /// Run one full cycle
    async fn cycle(&mut self, run: &RunControl) -> eyre::Result<CycleOutcome>;

    /// Best-effort cleanup after a failed cycle
    async fn recover(&mut self) {}
}

/// Per-stage cycle counts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub stage: &'static str,
    pub cycles: u64,
    pub failures: u64,
}

/// Drive a stage until the run stops, returning it with its counts
pub async fn run_stage<S: Stage>(mut stage: S, run: RunControl) -> (S, StageReport) {
    let name = stage.name();
    let mut report = StageReport {
        stage: name,
        cycles: 0,
        failures: 0,
    };
    let mut cycle = 0u64;

    while run.is_running() {
        cycle += 1;
        let span = info_span!("stage", stage = name, cycle);
        let outcome = stage.cycle(&run).instrument(span.clone()).await;

        match outcome {
            Ok(CycleOutcome::Done) => report.cycles += 1,
            Ok(CycleOutcome::Stopped) => break,
            Err(e) => {
                report.failures += 1;
                async {
                    error!(error = %format!("{:#}", e), "Cycle failed");
                    stage.recover().await;
                }
                .instrument(span)
                .await;
                if !run.sleep(stage.backoff()).await {
                    break;
                }
            }
        }
    }

    info!(stage = name, cycles = report.cycles, failures = report.failures, "Stage loop terminated");
    (stage, report)
}
