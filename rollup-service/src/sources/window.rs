use meter_client::domain::{ReadingRecord, RollupTransition};
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::{
    pipeline::{PipelineError, RollupSettings},
    store::{Store, StoreError},
    transform::{CoarseBounds, TemporalReducer},
};

/// Not-yet-rolled-up source readings of one label.
#[derive(Debug, Clone)]
pub struct LabelWindow {
    pub label: String,
    /// Cursor the window was loaded after; 0 when the label was never rolled up.
    pub cursor: i64,
    pub records: Vec<ReadingRecord>,
}

/// Loads bounded batches of source readings for one rollup transition.
pub struct SourceWindowLoader<'a, S> {
    store: &'a S,
    transition: RollupTransition,
    settings: RollupSettings,
}

impl<'a, S: Store> SourceWindowLoader<'a, S> {
    pub fn new(store: &'a S, transition: RollupTransition, settings: RollupSettings) -> Self {
        Self {
            store,
            transition,
            settings,
        }
    }

    /// Labels with source readings newer than the staleness cap before
    /// `maximum_date_time`. Dormant labels are skipped.
    pub async fn discover_labels(
        &self,
        maximum_date_time: OffsetDateTime,
    ) -> Result<Vec<String>, StoreError> {
        let newer_than = maximum_date_time - self.settings.staleness;
        self.store
            .discover_labels(self.transition.source(), newer_than)
            .await
    }

    pub async fn load(&self, label: &str) -> Result<LabelWindow, StoreError> {
        let cursor = self
            .store
            .load_cursor(label, self.transition.destination())
            .await?
            .unwrap_or(0);

        let records = self
            .store
            .load_window(
                label,
                self.transition.source(),
                cursor,
                self.settings.readings_per_label,
            )
            .await?;

        tracing::debug!(
            label,
            transition = %self.transition,
            cursor,
            loaded = records.len(),
            "source window loaded"
        );

        Ok(LabelWindow {
            label: label.to_string(),
            cursor,
            records,
        })
    }

    /// Coarse bounds for `label`: above the newest destination bucket and
    /// below `maximum`.
    pub async fn load_bounds(
        &self,
        temporal: &TemporalReducer,
        label: &str,
        maximum: PrimitiveDateTime,
    ) -> Result<CoarseBounds, PipelineError> {
        let destination = self.transition.destination();
        let minimum = match self.store.load_max_timestamp(label, destination).await? {
            Some(ts) => Some(temporal.reduce(ts, destination)?),
            None => None,
        };

        Ok(CoarseBounds { minimum, maximum })
    }
}
