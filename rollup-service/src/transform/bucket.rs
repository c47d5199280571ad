use std::collections::{BTreeMap, BTreeSet};

use meter_client::domain::{ReadingRecord, Resolution};
use time::PrimitiveDateTime;

use super::{exchange_boundary, ContractError, TemporalReducer};

/// Exclusive coarse-timestamp range a label may write into during one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoarseBounds {
    /// Latest bucket already present in the destination; `None` when empty.
    pub minimum: Option<PrimitiveDateTime>,
    pub maximum: PrimitiveDateTime,
}

impl CoarseBounds {
    fn admits(&self, coarse: PrimitiveDateTime, maximum: PrimitiveDateTime) -> bool {
        self.minimum.map_or(true, |min| coarse > min) && coarse < maximum
    }
}

/// Window readings sharing one coarse timestamp.
#[derive(Debug, Clone)]
pub struct CoarseBucket<'a> {
    pub coarse_timestamp: PrimitiveDateTime,
    /// Members in arrival order, with their index in the window.
    pub members: Vec<(usize, &'a ReadingRecord)>,
}

impl<'a> CoarseBucket<'a> {
    /// The member with the latest source timestamp.
    pub fn representative(&self) -> Option<(usize, &'a ReadingRecord)> {
        self.members
            .iter()
            .copied()
            .max_by_key(|(_, r)| r.reading.timestamp)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReducedWindow {
    /// Readings to write, ascending by source id.
    pub selected: Vec<ReadingRecord>,
    /// Meter exchanges found in the window.
    pub exchange_boundaries: usize,
    /// Upper bound after excluding an unfinished trailing bucket.
    pub effective_maximum: Option<PrimitiveDateTime>,
}

/// Reduces a label's source window to the readings of its coarse buckets.
pub struct BucketReducer<'a> {
    temporal: &'a TemporalReducer,
    destination: Resolution,
}

impl<'a> BucketReducer<'a> {
    pub fn new(temporal: &'a TemporalReducer, destination: Resolution) -> Self {
        Self {
            temporal,
            destination,
        }
    }

    /// Groups `window` by coarse timestamp, ordered by bucket.
    pub fn group<'w>(
        &self,
        window: &'w [ReadingRecord],
    ) -> Result<Vec<CoarseBucket<'w>>, ContractError> {
        let mut buckets: BTreeMap<PrimitiveDateTime, CoarseBucket<'w>> = BTreeMap::new();

        for (idx, record) in window.iter().enumerate() {
            let coarse = self
                .temporal
                .reduce(record.reading.timestamp, self.destination)?;
            buckets
                .entry(coarse)
                .or_insert_with(|| CoarseBucket {
                    coarse_timestamp: coarse,
                    members: Vec::new(),
                })
                .members
                .push((idx, record));
        }

        Ok(buckets.into_values().collect())
    }

    /// Selects the readings of `window` to roll up.
    ///
    /// `window` must hold one label's readings in ascending id order.
    pub fn reduce(
        &self,
        window: &[ReadingRecord],
        bounds: CoarseBounds,
    ) -> Result<ReducedWindow, ContractError> {
        let buckets = self.group(window)?;
        let Some(trailing) = buckets.last() else {
            return Ok(ReducedWindow::default());
        };

        // The newest bucket may still be accumulating readings.
        let mut effective_maximum = bounds.maximum;
        if let Some((_, latest)) = trailing.representative() {
            let complete = self
                .temporal
                .is_past_completeness_threshold(latest.reading.timestamp, self.destination)?;
            if !complete && trailing.coarse_timestamp < effective_maximum {
                effective_maximum = trailing.coarse_timestamp;
            }
        }

        let mut coarse_of = vec![bounds.maximum; window.len()];
        let mut candidates = BTreeSet::new();
        for bucket in &buckets {
            for (idx, _) in &bucket.members {
                coarse_of[*idx] = bucket.coarse_timestamp;
            }
            if let Some((idx, _)) = bucket.representative() {
                candidates.insert(idx);
            }
        }

        // Keep both sides of every meter exchange so pre- and post-exchange
        // cumulative values never collapse into one sample.
        let mut exchange_boundaries = 0;
        for (idx, pair) in window.windows(2).enumerate() {
            if exchange_boundary(&pair[0].reading, &pair[1].reading) {
                exchange_boundaries += 1;
                candidates.insert(idx);
                candidates.insert(idx + 1);
            }
        }

        let mut selected: Vec<ReadingRecord> = candidates
            .into_iter()
            .filter(|&idx| bounds.admits(coarse_of[idx], effective_maximum))
            .map(|idx| window[idx].clone())
            .collect();
        selected.sort_by_key(ReadingRecord::id);

        Ok(ReducedWindow {
            selected,
            exchange_boundaries,
            effective_maximum: Some(effective_maximum),
        })
    }
}
