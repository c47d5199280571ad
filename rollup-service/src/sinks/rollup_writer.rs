use meter_client::domain::{ReadingRecord, Resolution};

use crate::store::{Store, StoreError};

/// Persists selected readings into a destination resolution, one
/// transaction per reading, advancing the label's cursor with each.
pub struct RollupWriter<'a, S> {
    store: &'a S,
    destination: Resolution,
}

impl<'a, S: Store> RollupWriter<'a, S> {
    pub fn new(store: &'a S, destination: Resolution) -> Self {
        Self { store, destination }
    }

    /// Writes `records` in the given order and returns how many were written.
    ///
    /// Stops at the first failure; readings already written keep their
    /// advanced cursor, the failed one and the rest are retried next run.
    pub async fn write_all(&self, records: &[ReadingRecord]) -> Result<usize, StoreError> {
        let mut written = 0;

        for record in records {
            match self
                .store
                .write_reading_and_advance_cursor(record, self.destination, record.id())
                .await
            {
                Ok(()) => {
                    written += 1;
                    metrics::counter!(
                        "rollup_readings_written_total",
                        "resolution" => self.destination.name()
                    )
                    .increment(1);
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        label = %record.reading.label,
                        source_id = record.id(),
                        destination = %self.destination,
                        written,
                        "rollup write failed, cursor left at last committed reading"
                    );
                    metrics::counter!(
                        "rollup_store_errors_total",
                        "resolution" => self.destination.name()
                    )
                    .increment(1);
                    return Err(e);
                }
            }
        }

        Ok(written)
    }
}
