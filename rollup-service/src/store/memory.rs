use std::{collections::HashMap, sync::Arc};

use meter_client::domain::{Cursor, Reading, ReadingRecord, Register, Resolution};
use parking_lot::Mutex;
use time::OffsetDateTime;

use super::{Store, StoreError};

#[derive(Debug, Default)]
struct Inner {
    readings: HashMap<Resolution, Vec<ReadingRecord>>,
    last_id: HashMap<Resolution, i64>,
    cursors: HashMap<(Resolution, String), i64>,
    /// Successful writes left before writes start failing.
    writes_before_failure: Option<usize>,
}

impl Inner {
    fn append(
        &mut self,
        resolution: Resolution,
        reading: &Reading,
        registers: &[Register],
    ) -> ReadingRecord {
        let id = self.last_id.entry(resolution).or_insert(0);
        *id += 1;
        let id = *id;

        let record = ReadingRecord::new(
            Reading { id, ..reading.clone() },
            registers.iter().map(|r| r.reassigned(id)).collect(),
        );
        self.readings
            .entry(resolution)
            .or_default()
            .push(record.clone());
        record
    }
}

/// Process-local `Store` with the same semantics as the Postgres one.
///
/// Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a reading to `resolution`, assigning the next id.
    pub fn insert(
        &self,
        resolution: Resolution,
        label: &str,
        device_id: Option<&str>,
        timestamp: OffsetDateTime,
        registers: Vec<Register>,
    ) -> ReadingRecord {
        let reading = Reading {
            id: 0,
            label: label.to_string(),
            device_id: device_id.map(str::to_string),
            timestamp,
        };
        self.inner.lock().append(resolution, &reading, &registers)
    }

    pub fn readings(&self, resolution: Resolution, label: &str) -> Vec<ReadingRecord> {
        self.inner
            .lock()
            .readings
            .get(&resolution)
            .map(|all| {
                all.iter()
                    .filter(|r| r.reading.label == label)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn cursor(&self, label: &str, destination: Resolution) -> Option<Cursor> {
        self.inner
            .lock()
            .cursors
            .get(&(destination, label.to_string()))
            .map(|&position| Cursor {
                stream_name: destination.name().to_string(),
                label: label.to_string(),
                position,
            })
    }

    /// Let `successful` more writes through, then fail every write.
    pub fn fail_writes_after(&self, successful: usize) {
        self.inner.lock().writes_before_failure = Some(successful);
    }

    pub fn heal(&self) {
        self.inner.lock().writes_before_failure = None;
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn discover_labels(
        &self,
        resolution: Resolution,
        newer_than: OffsetDateTime,
    ) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock();
        let mut labels: Vec<String> = inner
            .readings
            .get(&resolution)
            .into_iter()
            .flatten()
            .filter(|r| r.reading.timestamp > newer_than)
            .map(|r| r.reading.label.clone())
            .collect();
        labels.sort();
        labels.dedup();
        Ok(labels)
    }

    async fn load_window(
        &self,
        label: &str,
        resolution: Resolution,
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<ReadingRecord>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .readings
            .get(&resolution)
            .into_iter()
            .flatten()
            .filter(|r| r.reading.label == label && r.id() > after_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn load_max_timestamp(
        &self,
        label: &str,
        resolution: Resolution,
    ) -> Result<Option<OffsetDateTime>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .readings
            .get(&resolution)
            .into_iter()
            .flatten()
            .filter(|r| r.reading.label == label)
            .map(|r| r.reading.timestamp)
            .max())
    }

    async fn load_cursor(
        &self,
        label: &str,
        destination: Resolution,
    ) -> Result<Option<i64>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .cursors
            .get(&(destination, label.to_string()))
            .copied())
    }

    async fn write_reading_and_advance_cursor(
        &self,
        record: &ReadingRecord,
        destination: Resolution,
        position: i64,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();

        if let Some(remaining) = inner.writes_before_failure.as_mut() {
            if *remaining == 0 {
                return Err(StoreError::Unavailable("injected write failure".to_string()));
            }
            *remaining -= 1;
        }

        inner.append(destination, &record.reading, &record.registers);
        let cursor = inner
            .cursors
            .entry((destination, record.reading.label.clone()))
            .or_insert(position);
        *cursor = (*cursor).max(position);
        Ok(())
    }
}
