//! Persistence collaborator of the rollup pipeline.

pub mod memory;
pub mod postgres;

use meter_client::domain::{ReadingRecord, Resolution};
use time::OffsetDateTime;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Store failures. All of them are retried by the next run, since the
/// cursor of the failed reading was not advanced.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("corrupt data: {0}")]
    Corrupt(String),
    #[error("store error: {0}")]
    Backend(String),
}

#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// Labels with at least one `resolution` reading newer than `newer_than`.
    async fn discover_labels(
        &self,
        resolution: Resolution,
        newer_than: OffsetDateTime,
    ) -> Result<Vec<String>, StoreError>;

    /// Up to `limit` readings of `label` with id above `after_id`, ascending by id.
    async fn load_window(
        &self,
        label: &str,
        resolution: Resolution,
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<ReadingRecord>, StoreError>;

    /// Timestamp of the newest `resolution` reading of `label`.
    async fn load_max_timestamp(
        &self,
        label: &str,
        resolution: Resolution,
    ) -> Result<Option<OffsetDateTime>, StoreError>;

    async fn load_cursor(
        &self,
        label: &str,
        destination: Resolution,
    ) -> Result<Option<i64>, StoreError>;

    /// Insert `record` into `destination` and set the cursor of its label to
    /// `position`, atomically.
    async fn write_reading_and_advance_cursor(
        &self,
        record: &ReadingRecord,
        destination: Resolution,
        position: i64,
    ) -> Result<(), StoreError>;
}
