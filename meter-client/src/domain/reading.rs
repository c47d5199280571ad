use time::OffsetDateTime;

use super::Register;

/// One timestamped reading of a meter at a given resolution.
///
/// `id` is the per-resolution arrival sequence; `timestamp` is always the
/// original fine-grained instant, also in coarser resolutions.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Reading {
    pub id: i64,
    pub label: String,
    pub device_id: Option<String>,
    #[sqlx(rename = "ts")]
    pub timestamp: OffsetDateTime,
}

/// A reading together with the registers it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReadingRecord {
    pub reading: Reading,
    pub registers: Vec<Register>,
}

impl ReadingRecord {
    pub fn new(reading: Reading, registers: Vec<Register>) -> Self {
        Self { reading, registers }
    }

    pub fn id(&self) -> i64 {
        self.reading.id
    }
}
