use meter_client::{
    db::{cursor_queries, reading_queries},
    domain::{ParseUnitError, ReadingRecord, Resolution},
};
use sqlx::postgres::PgPool;
use time::OffsetDateTime;

use super::{Store, StoreError};

/// `Store` backed by the per-resolution Postgres tables.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn from_sqlx(err: &sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(err.to_string())
        }
        sqlx::Error::Database(db) if db.constraint().is_some() => {
            StoreError::Constraint(err.to_string())
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Corrupt(err.to_string())
        }
        _ => StoreError::Backend(err.to_string()),
    }
}

fn classify(err: anyhow::Error) -> StoreError {
    if err.downcast_ref::<ParseUnitError>().is_some() {
        return StoreError::Corrupt(format!("{err:#}"));
    }
    match err.downcast_ref::<sqlx::Error>() {
        Some(sqlx_err) => from_sqlx(sqlx_err),
        None => StoreError::Backend(format!("{err:#}")),
    }
}

#[async_trait::async_trait]
impl Store for PgStore {
    async fn discover_labels(
        &self,
        resolution: Resolution,
        newer_than: OffsetDateTime,
    ) -> Result<Vec<String>, StoreError> {
        reading_queries::labels_active_since(&self.pool, resolution, newer_than)
            .await
            .map_err(classify)
    }

    async fn load_window(
        &self,
        label: &str,
        resolution: Resolution,
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<ReadingRecord>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        reading_queries::load_readings_after(&self.pool, resolution, label, after_id, limit)
            .await
            .map_err(classify)
    }

    async fn load_max_timestamp(
        &self,
        label: &str,
        resolution: Resolution,
    ) -> Result<Option<OffsetDateTime>, StoreError> {
        reading_queries::max_timestamp(&self.pool, resolution, label)
            .await
            .map_err(classify)
    }

    async fn load_cursor(
        &self,
        label: &str,
        destination: Resolution,
    ) -> Result<Option<i64>, StoreError> {
        let cursor = cursor_queries::load_cursor(&self.pool, destination.name(), label)
            .await
            .map_err(classify)?;
        Ok(cursor.map(|c| c.position))
    }

    async fn write_reading_and_advance_cursor(
        &self,
        record: &ReadingRecord,
        destination: Resolution,
        position: i64,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| from_sqlx(&e))?;

        let reading_id = reading_queries::insert_reading(&mut tx, destination, &record.reading)
            .await
            .map_err(classify)?;
        reading_queries::insert_registers(&mut tx, destination, reading_id, &record.registers)
            .await
            .map_err(classify)?;
        cursor_queries::upsert_position(
            &mut tx,
            destination.name(),
            &record.reading.label,
            position,
        )
        .await
        .map_err(classify)?;

        // Dropping `tx` on any error above rolls the whole reading back.
        tx.commit().await.map_err(|e| from_sqlx(&e))
    }
}
