use std::sync::Arc;

use meter_client::domain::{ReadingRecord, Register, Resolution, Unit};
use rollup_service::{
    location::FixedOffsetLocation,
    store::{MemoryStore, Store, StoreError},
    PipelineError, RollupPipeline, RollupSettings,
};
use time::{macros::datetime, macros::offset, OffsetDateTime};

// All fixtures use a +04:00 installation; comments give local wall-clock times.
fn pipeline(store: &MemoryStore) -> RollupPipeline<MemoryStore> {
    RollupPipeline::new(
        store.clone(),
        Arc::new(FixedOffsetLocation::new(offset!(+04:00))),
        RollupSettings::default(),
    )
}

fn energy(value: i64) -> Vec<Register> {
    vec![
        Register {
            reading_id: 0,
            code: "1.0.1.8.0.255".to_string(),
            value,
            scale: 0,
            unit: Unit::WattHour,
        },
        Register {
            reading_id: 0,
            code: "1.0.1.7.0.255".to_string(),
            value: 1500,
            scale: -1,
            unit: Unit::Watt,
        },
    ]
}

fn live(store: &MemoryStore, label: &str, device: &str, ts: OffsetDateTime) -> ReadingRecord {
    store.insert(Resolution::Live, label, Some(device), ts, energy(ts.unix_timestamp()))
}

fn day_timestamps(store: &MemoryStore, label: &str) -> Vec<OffsetDateTime> {
    store
        .readings(Resolution::Day, label)
        .into_iter()
        .map(|r| r.reading.timestamp)
        .collect()
}

const CUTOFF: OffsetDateTime = datetime!(2024-06-10 00:00:00 UTC); // 06-10 04:00

#[tokio::test]
async fn end_to_end_day_rollup_keeps_latest_of_each_finished_day() {
    let store = MemoryStore::new();
    live(&store, "A", "1", datetime!(2024-06-08 04:00:00 UTC)); // 06-08 08:00
    live(&store, "A", "1", datetime!(2024-06-09 05:00:00 UTC)); // 06-09 09:00
    let latest = live(&store, "A", "1", datetime!(2024-06-09 08:00:00 UTC)); // 06-09 12:00
    live(&store, "A", "1", datetime!(2024-06-09 23:00:00 UTC)); // 06-10 03:00

    let wrote = pipeline(&store).pipe_live_to_day(CUTOFF).await.unwrap();

    assert!(wrote);
    assert_eq!(
        day_timestamps(&store, "A"),
        vec![
            datetime!(2024-06-08 04:00:00 UTC),
            datetime!(2024-06-09 08:00:00 UTC),
        ]
    );
    assert_eq!(store.cursor("A", Resolution::Day).unwrap().position, latest.id());
}

#[tokio::test]
async fn registers_and_original_timestamp_are_carried_forward() {
    let store = MemoryStore::new();
    let source = live(&store, "A", "1", datetime!(2024-06-08 14:00:00 UTC)); // 18:00

    pipeline(&store).pipe_live_to_day(CUTOFF).await.unwrap();

    let days = store.readings(Resolution::Day, "A");
    assert_eq!(days.len(), 1);
    let day = &days[0];
    assert_eq!(day.reading.timestamp, source.reading.timestamp);
    assert_eq!(day.reading.device_id.as_deref(), Some("1"));
    assert_eq!(day.registers.len(), source.registers.len());
    for (written, original) in day.registers.iter().zip(&source.registers) {
        assert_eq!(written.reading_id, day.id());
        assert_eq!(written.code, original.code);
        assert_eq!(written.value, original.value);
        assert_eq!(written.scale, original.scale);
        assert_eq!(written.unit, original.unit);
    }
}

#[tokio::test]
async fn second_run_is_idempotent() {
    let store = MemoryStore::new();
    for day in 1..=5 {
        let ts = datetime!(2024-06-01 14:00:00 UTC) + time::Duration::days(day);
        live(&store, "A", "1", ts);
    }
    let p = pipeline(&store);

    assert!(p.pipe_live_to_day(CUTOFF).await.unwrap());
    let written = store.readings(Resolution::Day, "A");
    let cursor = store.cursor("A", Resolution::Day);

    assert!(!p.pipe_live_to_day(CUTOFF).await.unwrap());
    assert_eq!(store.readings(Resolution::Day, "A"), written);
    assert_eq!(store.cursor("A", Resolution::Day), cursor);
}

#[tokio::test]
async fn unfinished_day_is_not_rolled_up() {
    let store = MemoryStore::new();
    live(&store, "A", "1", datetime!(2024-06-08 10:59:00 UTC)); // 14:59

    let p = pipeline(&store);
    assert!(!p.pipe_live_to_day(CUTOFF).await.unwrap());
    assert!(store.cursor("A", Resolution::Day).is_none());

    live(&store, "A", "1", datetime!(2024-06-08 11:01:00 UTC)); // 15:01
    assert!(p.pipe_live_to_day(CUTOFF).await.unwrap());
    assert_eq!(
        day_timestamps(&store, "A"),
        vec![datetime!(2024-06-08 11:01:00 UTC)]
    );
}

#[tokio::test]
async fn meter_exchange_keeps_both_readings() {
    let store = MemoryStore::new();
    live(&store, "A", "1", datetime!(2024-06-01 04:00:00 UTC)); // 06-01 08:00
    live(&store, "A", "2", datetime!(2024-06-01 06:00:00 UTC)); // 06-01 10:00
    live(&store, "A", "2", datetime!(2024-06-02 14:00:00 UTC)); // 06-02 18:00

    pipeline(&store).pipe_live_to_day(CUTOFF).await.unwrap();

    let devices: Vec<Option<String>> = store
        .readings(Resolution::Day, "A")
        .into_iter()
        .map(|r| r.reading.device_id)
        .collect();
    assert_eq!(
        devices,
        vec![
            Some("1".to_string()),
            Some("2".to_string()),
            Some("2".to_string())
        ]
    );
}

#[tokio::test]
async fn only_readings_after_cursor_are_considered() {
    let store = MemoryStore::new();
    live(&store, "A", "1", datetime!(2024-06-01 14:00:00 UTC));
    live(&store, "A", "1", datetime!(2024-06-02 14:00:00 UTC));
    let p = pipeline(&store);

    assert!(p.pipe_live_to_day(CUTOFF).await.unwrap());
    let first_cursor = store.cursor("A", Resolution::Day).unwrap().position;

    let next = live(&store, "A", "1", datetime!(2024-06-03 14:00:00 UTC));
    assert!(p.pipe_live_to_day(CUTOFF).await.unwrap());

    assert_eq!(store.readings(Resolution::Day, "A").len(), 3);
    let cursor = store.cursor("A", Resolution::Day).unwrap().position;
    assert!(cursor > first_cursor);
    assert_eq!(cursor, next.id());
}

#[tokio::test]
async fn existing_destination_buckets_are_never_rewritten() {
    let store = MemoryStore::new();
    store.insert(
        Resolution::Day,
        "A",
        Some("1"),
        datetime!(2024-06-05 14:00:00 UTC),
        energy(1),
    );
    live(&store, "A", "1", datetime!(2024-06-03 14:00:00 UTC));
    live(&store, "A", "1", datetime!(2024-06-04 14:00:00 UTC));
    live(&store, "A", "1", datetime!(2024-06-05 16:00:00 UTC));
    live(&store, "A", "1", datetime!(2024-06-06 14:00:00 UTC));
    live(&store, "A", "1", datetime!(2024-06-07 04:00:00 UTC)); // 08:00, unfinished

    pipeline(&store).pipe_live_to_day(CUTOFF).await.unwrap();

    assert_eq!(
        day_timestamps(&store, "A"),
        vec![
            datetime!(2024-06-05 14:00:00 UTC),
            datetime!(2024-06-06 14:00:00 UTC),
        ]
    );
}

#[tokio::test]
async fn failed_write_resumes_from_last_committed_reading() {
    let store = MemoryStore::new();
    for day in 1..=5 {
        live(
            &store,
            "A",
            "1",
            datetime!(2024-06-01 14:00:00 UTC) + time::Duration::days(day - 1),
        );
    }
    live(&store, "A", "1", datetime!(2024-06-06 04:00:00 UTC)); // unfinished
    let p = pipeline(&store);

    store.fail_writes_after(2);
    let err = p.pipe_live_to_day(CUTOFF).await.unwrap_err();
    assert!(matches!(err, PipelineError::Store(_)));
    assert!(!err.is_fatal());
    assert_eq!(store.readings(Resolution::Day, "A").len(), 2);
    assert_eq!(store.cursor("A", Resolution::Day).unwrap().position, 2);

    store.heal();
    assert!(p.pipe_live_to_day(CUTOFF).await.unwrap());
    assert_eq!(store.readings(Resolution::Day, "A").len(), 5);
    assert_eq!(store.cursor("A", Resolution::Day).unwrap().position, 5);
    assert!(!p.pipe_live_to_day(CUTOFF).await.unwrap());
}

#[tokio::test]
async fn dormant_labels_are_not_discovered() {
    let store = MemoryStore::new();
    live(&store, "old", "1", datetime!(2022-01-01 14:00:00 UTC));
    live(&store, "old", "1", datetime!(2022-01-02 14:00:00 UTC));

    assert!(!pipeline(&store).pipe_live_to_day(CUTOFF).await.unwrap());
    assert!(store.readings(Resolution::Day, "old").is_empty());
}

#[tokio::test]
async fn labels_are_rolled_up_independently() {
    let store = MemoryStore::new();
    live(&store, "A", "1", datetime!(2024-06-01 14:00:00 UTC));
    live(&store, "B", "7", datetime!(2024-06-01 14:00:00 UTC));
    live(&store, "B", "7", datetime!(2024-06-02 14:00:00 UTC));

    pipeline(&store).pipe_live_to_day(CUTOFF).await.unwrap();

    assert_eq!(store.readings(Resolution::Day, "A").len(), 1);
    assert_eq!(store.readings(Resolution::Day, "B").len(), 2);
    assert_eq!(store.cursor("A", Resolution::Day).unwrap().position, 1);
    assert_eq!(store.cursor("B", Resolution::Day).unwrap().position, 3);
}

#[tokio::test]
async fn non_utc_cutoff_is_a_contract_violation() {
    let store = MemoryStore::new();
    live(&store, "A", "1", datetime!(2024-06-01 14:00:00 UTC));

    let err = pipeline(&store)
        .pipe_live_to_day(datetime!(2024-06-10 04:00:00 +04:00))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Contract(_)));
    assert!(err.is_fatal());
    assert!(store.readings(Resolution::Day, "A").is_empty());
}

#[tokio::test]
async fn month_and_year_stages_chain_off_the_day_stream() {
    let store = MemoryStore::new();
    // Day readings for Jan, Feb and early Mar 2023, 18:00 local each.
    for day in 0..65 {
        store.insert(
            Resolution::Day,
            "A",
            Some("1"),
            datetime!(2023-01-01 14:00:00 UTC) + time::Duration::days(day),
            energy(day),
        );
    }
    let p = pipeline(&store);

    assert!(p.pipe_day_to_month(CUTOFF).await.unwrap());
    let months: Vec<OffsetDateTime> = store
        .readings(Resolution::Month, "A")
        .into_iter()
        .map(|r| r.reading.timestamp)
        .collect();
    // March 2023 is unfinished within the window.
    assert_eq!(
        months,
        vec![
            datetime!(2023-01-31 14:00:00 UTC),
            datetime!(2023-02-28 14:00:00 UTC),
        ]
    );

    // The newest month reading (February) is far from 83 % of 2023.
    assert!(!p.pipe_month_to_year(CUTOFF).await.unwrap());
    assert!(store.readings(Resolution::Year, "A").is_empty());
}

/// Delegates to a `MemoryStore` but cannot decode the window of one label.
struct CorruptLabelStore {
    inner: MemoryStore,
    corrupt_label: &'static str,
}

#[async_trait::async_trait]
impl Store for CorruptLabelStore {
    async fn discover_labels(
        &self,
        resolution: Resolution,
        newer_than: OffsetDateTime,
    ) -> Result<Vec<String>, StoreError> {
        self.inner.discover_labels(resolution, newer_than).await
    }

    async fn load_window(
        &self,
        label: &str,
        resolution: Resolution,
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<ReadingRecord>, StoreError> {
        if label == self.corrupt_label {
            return Err(StoreError::Corrupt("bad register row".to_string()));
        }
        self.inner.load_window(label, resolution, after_id, limit).await
    }

    async fn load_max_timestamp(
        &self,
        label: &str,
        resolution: Resolution,
    ) -> Result<Option<OffsetDateTime>, StoreError> {
        self.inner.load_max_timestamp(label, resolution).await
    }

    async fn load_cursor(
        &self,
        label: &str,
        destination: Resolution,
    ) -> Result<Option<i64>, StoreError> {
        self.inner.load_cursor(label, destination).await
    }

    async fn write_reading_and_advance_cursor(
        &self,
        record: &ReadingRecord,
        destination: Resolution,
        position: i64,
    ) -> Result<(), StoreError> {
        self.inner
            .write_reading_and_advance_cursor(record, destination, position)
            .await
    }
}

#[tokio::test]
async fn failing_label_does_not_block_later_labels() {
    let store = MemoryStore::new();
    live(&store, "A", "1", datetime!(2024-06-01 14:00:00 UTC));
    live(&store, "B", "7", datetime!(2024-06-01 14:00:00 UTC));
    let p = RollupPipeline::new(
        CorruptLabelStore {
            inner: store.clone(),
            corrupt_label: "A",
        },
        Arc::new(FixedOffsetLocation::new(offset!(+04:00))),
        RollupSettings::default(),
    );

    for _ in 0..3 {
        let err = p.pipe_live_to_day(CUTOFF).await.unwrap_err();
        assert!(matches!(err, PipelineError::Store(StoreError::Corrupt(_))));
        assert!(!err.is_fatal());
    }

    assert!(store.readings(Resolution::Day, "A").is_empty());
    assert_eq!(store.readings(Resolution::Day, "B").len(), 1);
    assert_eq!(store.cursor("B", Resolution::Day).unwrap().position, 2);
}

#[tokio::test]
async fn failed_write_on_one_label_still_rolls_up_the_next() {
    let store = MemoryStore::new();
    live(&store, "A", "1", datetime!(2024-06-01 14:00:00 UTC));
    live(&store, "A", "1", datetime!(2024-06-02 14:00:00 UTC));
    live(&store, "B", "7", datetime!(2024-06-01 14:00:00 UTC));
    let p = pipeline(&store);

    // A's second write fails and the store stays down for B; both resume once healed.
    store.fail_writes_after(1);
    assert!(p.pipe_live_to_day(CUTOFF).await.is_err());
    assert_eq!(store.readings(Resolution::Day, "A").len(), 1);
    assert!(store.readings(Resolution::Day, "B").is_empty());

    store.heal();
    assert!(p.pipe_live_to_day(CUTOFF).await.unwrap());
    assert_eq!(store.readings(Resolution::Day, "A").len(), 2);
    assert_eq!(store.readings(Resolution::Day, "B").len(), 1);
}
