//! Bucket implementation
//!
//! A fixed-width time bucket holding one accumulator per configured kind
//! and, optionally, the raw samples that fell into it.

use std::mem::size_of;

use serde::{Deserialize, Serialize};

use crate::aggregation::{aggregator, average, AggregationKind};
use crate::error::{Result, TskvError};
use crate::model::{TimePoint, TimeRecord, Value};

/// Estimated cost of one retained raw sample (timestamp + value)
pub const SAMPLE_SIZE: usize = size_of::<TimePoint>() + size_of::<Value>();

/// Estimated cost of one accumulator slot
pub const SLOT_SIZE: usize = size_of::<Value>();

// =============================================================================
// Slot Layout
// =============================================================================

/// Which stored kinds a bucket maintains, and in which slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotLayout {
    kinds: Vec<AggregationKind>,
}

impl SlotLayout {
    /// Build the layout from the kinds requested at initialization
    ///
    /// `Avg` is satisfied by maintaining Sum and Count. Duplicates collapse,
    /// slot order follows first appearance.
    pub fn from_requested(requested: &[AggregationKind]) -> Result<Self> {
        if requested.is_empty() {
            return Err(TskvError::InvalidOptions(
                "at least one aggregation kind is required".to_string(),
            ));
        }

        let mut kinds = Vec::with_capacity(requested.len() + 1);
        for &kind in requested {
            let expanded: &[AggregationKind] = match kind {
                AggregationKind::None => {
                    return Err(TskvError::InvalidOptions(
                        "raw retention is controlled by store_raw, not by an aggregation kind"
                            .to_string(),
                    ));
                }
                AggregationKind::Avg => &[AggregationKind::Sum, AggregationKind::Count],
                AggregationKind::Sum => &[AggregationKind::Sum],
                AggregationKind::Count => &[AggregationKind::Count],
                AggregationKind::Min => &[AggregationKind::Min],
                AggregationKind::Max => &[AggregationKind::Max],
                AggregationKind::Last => &[AggregationKind::Last],
            };
            for kind in expanded {
                if !kinds.contains(kind) {
                    kinds.push(*kind);
                }
            }
        }

        Ok(Self { kinds })
    }

    /// Slot index of a stored kind
    pub fn slot(&self, kind: AggregationKind) -> Option<usize> {
        self.kinds.iter().position(|k| *k == kind)
    }

    /// Whether a read of `kind` can be answered from the accumulators
    pub fn supports(&self, kind: AggregationKind) -> bool {
        match kind {
            AggregationKind::None => false,
            AggregationKind::Avg => {
                self.slot(AggregationKind::Sum).is_some()
                    && self.slot(AggregationKind::Count).is_some()
            }
            _ => self.slot(kind).is_some(),
        }
    }

    pub fn kinds(&self) -> &[AggregationKind] {
        &self.kinds
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

// =============================================================================
// Bucket
// =============================================================================

/// One `[start, start + interval)` bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    start: TimePoint,
    samples: u64,
    slots: Vec<Option<Value>>,
    /// Sorted by timestamp, ties in arrival order
    raw: Option<Vec<TimeRecord>>,
}

impl Bucket {
    /// Create an empty bucket
    pub fn new(start: TimePoint, layout: &SlotLayout, store_raw: bool) -> Self {
        Self {
            start,
            samples: 0,
            slots: vec![None; layout.len()],
            raw: store_raw.then(Vec::new),
        }
    }

    /// Bucket key for a timestamp: `floor(timestamp / interval) * interval`
    ///
    /// Below the lowest aligned boundary the floor is not representable; those
    /// timestamps share a clamped bucket starting at `TimePoint::MIN`.
    pub fn key(timestamp: TimePoint, interval: i64) -> TimePoint {
        timestamp
            .checked_sub(timestamp.rem_euclid(interval))
            .unwrap_or(TimePoint::MIN)
    }

    pub fn start(&self) -> TimePoint {
        self.start
    }

    /// Next aligned boundary after `start`, saturating at `TimePoint::MAX`
    pub fn end(&self, interval: i64) -> TimePoint {
        self.start
            .saturating_add(interval - self.start.rem_euclid(interval))
    }

    /// Number of samples folded into this bucket
    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Accumulator states, one per layout slot
    pub fn accumulators(&self) -> &[Option<Value>] {
        &self.slots
    }

    pub fn raw(&self) -> Option<&[TimeRecord]> {
        self.raw.as_deref()
    }

    /// Estimated footprint: accumulator slots plus retained samples
    pub fn byte_size(&self) -> usize {
        let raw = self.raw.as_ref().map(|r| r.len()).unwrap_or(0);
        self.slots.len() * SLOT_SIZE + raw * SAMPLE_SIZE
    }

    /// Fold a sample that arrived after every sample already in the bucket
    pub fn fold(&mut self, layout: &SlotLayout, record: TimeRecord) -> Result<()> {
        if let Some(raw) = self.raw.as_mut() {
            raw.try_reserve(1)?;
            let pos = raw.partition_point(|r| r.timestamp <= record.timestamp);
            raw.insert(pos, record);
        }

        for (slot, kind) in self.slots.iter_mut().zip(layout.kinds()) {
            if let Some(agg) = aggregator(*kind) {
                *slot = Some(agg.fold(*slot, record.value));
            }
        }
        self.samples += 1;
        Ok(())
    }

    /// Merge a bucket whose samples all arrived after this one's
    pub fn merge(&mut self, layout: &SlotLayout, newer: &Bucket) -> Result<()> {
        let raw = self.merged_raw(newer)?;
        self.apply_merge(layout, newer, raw);
        Ok(())
    }

    /// Raw list this bucket would hold after merging `newer`
    ///
    /// The only fallible step of a merge. Leaves `self` untouched.
    pub fn merged_raw(&self, newer: &Bucket) -> Result<Option<Vec<TimeRecord>>> {
        match (self.raw.as_deref(), newer.raw.as_deref()) {
            (Some(older), Some(newer)) => merge_sorted(older, newer).map(Some),
            _ => Ok(None),
        }
    }

    /// Complete a merge whose raw list came from [`Bucket::merged_raw`]
    pub fn apply_merge(
        &mut self,
        layout: &SlotLayout,
        newer: &Bucket,
        raw: Option<Vec<TimeRecord>>,
    ) {
        for ((slot, other), kind) in self
            .slots
            .iter_mut()
            .zip(&newer.slots)
            .zip(layout.kinds())
        {
            if let Some(agg) = aggregator(*kind) {
                *slot = agg.merge(*slot, *other);
            }
        }

        if let (Some(current), Some(merged)) = (self.raw.as_mut(), raw) {
            *current = merged;
        }

        self.samples += newer.samples;
    }

    /// Re-key the bucket (used when coarsening)
    pub(crate) fn with_start(mut self, start: TimePoint) -> Self {
        self.start = start;
        self
    }

    /// Value of a kind in this bucket, deriving Avg from Sum and Count
    pub fn value(&self, layout: &SlotLayout, kind: AggregationKind) -> Option<Value> {
        match kind {
            AggregationKind::None => None,
            AggregationKind::Avg => {
                let sum = self.slot_value(layout, AggregationKind::Sum)?;
                let count = self.slot_value(layout, AggregationKind::Count)?;
                Some(average(sum, count))
            }
            _ => self.slot_value(layout, kind),
        }
    }

    fn slot_value(&self, layout: &SlotLayout, kind: AggregationKind) -> Option<Value> {
        self.slots.get(layout.slot(kind)?).copied().flatten()
    }
}

/// Stable merge of two timestamp-sorted lists; `older` wins ties
fn merge_sorted(older: &[TimeRecord], newer: &[TimeRecord]) -> Result<Vec<TimeRecord>> {
    let mut merged = Vec::new();
    merged.try_reserve_exact(older.len() + newer.len())?;

    let (mut i, mut j) = (0, 0);
    while i < older.len() && j < newer.len() {
        if older[i].timestamp <= newer[j].timestamp {
            merged.push(older[i]);
            i += 1;
        } else {
            merged.push(newer[j]);
            j += 1;
        }
    }
    merged.extend_from_slice(&older[i..]);
    merged.extend_from_slice(&newer[j..]);
    Ok(merged)
}
