//! Rollup of one resolution into the next coarser one, label by label.
//!
//! Per label a run goes `Idle -> WindowLoaded -> BucketsComputed -> Writing
//! -> CursorAdvanced`. Only the cursor survives between runs.

use std::{sync::Arc, time::Instant};

use meter_client::domain::RollupTransition;
use time::{Duration, OffsetDateTime, PrimitiveDateTime};

use crate::{
    location::LocationContext,
    sinks::RollupWriter,
    sources::SourceWindowLoader,
    store::{Store, StoreError},
    transform::{BucketReducer, ContractError, TemporalReducer},
};

/// About 32 days of 5-minute live readings.
pub const DEFAULT_READINGS_PER_LABEL: usize = 9280;
pub const DEFAULT_STALENESS_DAYS: i64 = 600;

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("contract violation: {0}")]
    Contract(#[from] ContractError),
    #[error("{0}")]
    Store(#[from] StoreError),
}

impl PipelineError {
    /// Contract violations are programmer errors; store errors heal on the
    /// next run because the cursor was not advanced.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::Contract(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollupSettings {
    /// Source readings loaded per label and run.
    pub readings_per_label: usize,
    /// Labels without a source reading this recent are not discovered.
    pub staleness: Duration,
}

impl Default for RollupSettings {
    fn default() -> Self {
        Self {
            readings_per_label: DEFAULT_READINGS_PER_LABEL,
            staleness: Duration::days(DEFAULT_STALENESS_DAYS),
        }
    }
}

pub struct RollupPipeline<S> {
    store: S,
    temporal: TemporalReducer,
    settings: RollupSettings,
}

impl<S: Store> RollupPipeline<S> {
    pub fn new(store: S, location: Arc<dyn LocationContext>, settings: RollupSettings) -> Self {
        Self {
            store,
            temporal: TemporalReducer::new(location),
            settings,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn pipe_live_to_day(
        &self,
        maximum_date_time: OffsetDateTime,
    ) -> Result<bool, PipelineError> {
        self.run(RollupTransition::LiveToDay, maximum_date_time).await
    }

    pub async fn pipe_day_to_month(
        &self,
        maximum_date_time: OffsetDateTime,
    ) -> Result<bool, PipelineError> {
        self.run(RollupTransition::DayToMonth, maximum_date_time).await
    }

    pub async fn pipe_month_to_year(
        &self,
        maximum_date_time: OffsetDateTime,
    ) -> Result<bool, PipelineError> {
        self.run(RollupTransition::MonthToYear, maximum_date_time).await
    }

    /// Rolls every active label up one step, writing nothing at or after the
    /// bucket of `maximum_date_time`.
    ///
    /// Returns whether any reading was written; a label with a full window
    /// may have more backlog, so callers repeat until this returns false.
    ///
    /// A store failure on one label does not stop the others: the remaining
    /// labels are still rolled up and the first store error is returned
    /// afterwards. Contract violations abort immediately.
    pub async fn run(
        &self,
        transition: RollupTransition,
        maximum_date_time: OffsetDateTime,
    ) -> Result<bool, PipelineError> {
        let maximum = self
            .temporal
            .reduce(maximum_date_time, transition.destination())?;

        let loader = SourceWindowLoader::new(&self.store, transition, self.settings);
        let labels = loader
            .discover_labels(maximum_date_time)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, transition = %transition, "label discovery failed");
                metrics::counter!(
                    "rollup_store_errors_total",
                    "resolution" => transition.destination().name()
                )
                .increment(1);
                PipelineError::Store(e)
            })?;

        let mut wrote_any = false;
        let mut first_failure = None;
        let mut failed_labels = 0;
        for label in &labels {
            match self.run_label(&loader, transition, label, maximum).await {
                Ok(written) => wrote_any |= written > 0,
                Err(PipelineError::Store(e)) => {
                    failed_labels += 1;
                    first_failure.get_or_insert(e);
                }
                Err(e) => return Err(e),
            }
        }

        tracing::debug!(
            transition = %transition,
            labels = labels.len(),
            failed_labels,
            wrote_any,
            "rollup pass finished"
        );

        match first_failure {
            Some(e) => Err(PipelineError::Store(e)),
            None => Ok(wrote_any),
        }
    }

    async fn run_label(
        &self,
        loader: &SourceWindowLoader<'_, S>,
        transition: RollupTransition,
        label: &str,
        maximum: PrimitiveDateTime,
    ) -> Result<usize, PipelineError> {
        let started = Instant::now();
        let destination = transition.destination();

        let window = loader
            .load(label)
            .await
            .map_err(|e| read_failure(label, transition, e))?;
        if window.records.is_empty() {
            return Ok(0);
        }

        let bounds = loader
            .load_bounds(&self.temporal, label, maximum)
            .await
            .map_err(|e| match e {
                PipelineError::Store(e) => read_failure(label, transition, e),
                other => other,
            })?;
        let reduced =
            BucketReducer::new(&self.temporal, destination).reduce(&window.records, bounds)?;

        if reduced.exchange_boundaries > 0 {
            tracing::warn!(
                label,
                transition = %transition,
                exchanges = reduced.exchange_boundaries,
                "meter exchange in window, keeping readings on both sides"
            );
            metrics::counter!(
                "rollup_exchange_boundaries_total",
                "resolution" => destination.name()
            )
            .increment(reduced.exchange_boundaries as u64);
        }

        let written = RollupWriter::new(&self.store, destination)
            .write_all(&reduced.selected)
            .await?;

        metrics::histogram!(
            "rollup_label_duration_seconds",
            "resolution" => destination.name()
        )
        .record(started.elapsed().as_secs_f64());

        if written > 0 {
            tracing::info!(
                label,
                transition = %transition,
                loaded = window.records.len(),
                written,
                after = window.cursor,
                "label rolled up"
            );
        }

        Ok(written)
    }
}

/// Write failures are logged and counted by the writer; read failures here.
fn read_failure(label: &str, transition: RollupTransition, err: StoreError) -> PipelineError {
    tracing::error!(
        error = %err,
        label,
        transition = %transition,
        "loading rollup state failed, skipping label this run"
    );
    metrics::counter!(
        "rollup_store_errors_total",
        "resolution" => transition.destination().name()
    )
    .increment(1);
    PipelineError::Store(err)
}
