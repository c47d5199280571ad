use meter_client::domain::RollupTransition;
use time::{Duration, OffsetDateTime};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::{
    pipeline::{PipelineError, RollupPipeline},
    store::Store,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleSettings {
    /// Distance kept from "now" so late live readings can still arrive.
    pub safety_margin: Duration,
    pub poll_interval: std::time::Duration,
    /// Upper bound on repeated passes of one stage within a sweep.
    pub max_passes_per_stage: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageReport {
    pub transition: RollupTransition,
    /// Passes that wrote at least one reading.
    pub productive_passes: u32,
    /// False when the pass limit was hit while work remained.
    pub drained: bool,
}

/// Drives the live -> day -> month -> year chain in dependency order.
pub struct RollupScheduler<S> {
    pipeline: RollupPipeline<S>,
    settings: ScheduleSettings,
}

impl<S: Store> RollupScheduler<S> {
    pub fn new(pipeline: RollupPipeline<S>, settings: ScheduleSettings) -> Self {
        Self { pipeline, settings }
    }

    pub fn pipeline(&self) -> &RollupPipeline<S> {
        &self.pipeline
    }

    /// One sweep with the cutoff `now` minus the safety margin.
    pub async fn sweep(&self, now: OffsetDateTime) -> Result<Vec<StageReport>, PipelineError> {
        self.sweep_until(now - self.settings.safety_margin).await
    }

    /// Runs every stage until it reports no more work, in dependency order.
    pub async fn sweep_until(
        &self,
        maximum_date_time: OffsetDateTime,
    ) -> Result<Vec<StageReport>, PipelineError> {
        let mut reports = Vec::with_capacity(RollupTransition::ALL.len());

        for transition in RollupTransition::ALL {
            let mut report = StageReport {
                transition,
                productive_passes: 0,
                drained: false,
            };

            while report.productive_passes < self.settings.max_passes_per_stage {
                if !self.pipeline.run(transition, maximum_date_time).await? {
                    report.drained = true;
                    break;
                }
                report.productive_passes += 1;
            }

            if !report.drained {
                tracing::warn!(
                    transition = %transition,
                    passes = report.productive_passes,
                    "pass limit reached with backlog remaining, continuing next sweep"
                );
            }
            reports.push(report);
        }

        Ok(reports)
    }

    /// Sweeps on every poll tick until `cancel` fires. Store errors end the
    /// current sweep only; contract errors stop the scheduler.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), PipelineError> {
        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("rollup scheduler stopped");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }

            match self.sweep(OffsetDateTime::now_utc()).await {
                Ok(reports) => {
                    let passes: u32 = reports.iter().map(|r| r.productive_passes).sum();
                    tracing::debug!(passes, "rollup sweep finished");
                }
                Err(e) if e.is_fatal() => {
                    tracing::error!(error = %e, "rollup sweep hit a contract violation");
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "rollup sweep failed, retrying next tick");
                }
            }
        }
    }
}
