//! MemTable implementation
//!
//! BTreeMap of `Arc<Bucket>` behind an RwLock.
//!
//! ## Concurrency
//! - Writes stage a batch into private buckets, then take the write lock
//!   once to merge them and run retention. Allocation for the merge happens
//!   before the map is touched: a batch is applied whole or not at all.
//! - Reads clone the `Arc`s of intersecting buckets under the read lock
//!   and compute after releasing it. A bucket a reader still holds is
//!   copied on the next write to it (`Arc::make_mut`), so the reader's view
//!   stays consistent and eviction never frees memory it references.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::aggregation::AggregationKind;
use crate::config::Options;
use crate::error::{Result, TskvError};
use crate::model::{TimePoint, TimeRange, TimeRecord, Value};
use crate::snapshot::Snapshot;

use super::retention;
use super::{Bucket, MemTableStats, ReadResult, SlotLayout};

/// In-memory bucketed aggregation table
pub struct MemTable {
    options: Options,
    layout: SlotLayout,

    /// Buckets keyed by start time
    buckets: RwLock<BTreeMap<TimePoint, Arc<Bucket>>>,

    /// Estimated footprint in bytes (updated with the write lock held)
    size: AtomicUsize,

    /// Lifetime eviction count
    evicted: AtomicU64,
}

impl MemTable {
    /// Create an empty memtable
    ///
    /// Validates `options` and builds the slot layout from `kinds`.
    pub fn new(options: Options, kinds: &[AggregationKind]) -> Result<Self> {
        options.validate()?;
        let layout = SlotLayout::from_requested(kinds)?;

        Ok(Self {
            options,
            layout,
            buckets: RwLock::new(BTreeMap::new()),
            size: AtomicUsize::new(0),
            evicted: AtomicU64::new(0),
        })
    }

    // =========================================================================
    // Write Path
    // =========================================================================

    /// Fold a batch of records, then run retention once
    pub fn write(&self, records: &[TimeRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let interval = self.interval();

        // Stage outside the lock, in arrival order
        let mut staged: BTreeMap<TimePoint, Bucket> = BTreeMap::new();
        for record in records {
            let key = Bucket::key(record.timestamp, interval);
            staged
                .entry(key)
                .or_insert_with(|| Bucket::new(key, &self.layout, self.options.store_raw))
                .fold(&self.layout, *record)?;
        }
        let touched = staged.len();

        let mut buckets = self.buckets.write();

        // Fallible steps first: the map is untouched if any of them fails
        let mut prepared = Vec::new();
        prepared.try_reserve_exact(touched)?;
        for (key, partial) in staged {
            let raw = match buckets.get(&key) {
                Some(existing) => existing.merged_raw(&partial)?,
                None => None,
            };
            prepared.push((key, partial, raw));
        }

        let mut size = self.size.load(Ordering::Acquire);
        for (key, partial, raw) in prepared {
            match buckets.entry(key) {
                Entry::Occupied(mut entry) => {
                    let bucket = Arc::make_mut(entry.get_mut());
                    let before = bucket.byte_size();
                    bucket.apply_merge(&self.layout, &partial, raw);
                    size = size - before + bucket.byte_size();
                }
                Entry::Vacant(entry) => {
                    size += partial.byte_size();
                    entry.insert(Arc::new(partial));
                }
            }
        }

        let outcome = retention::enforce(&mut buckets, &self.options, size);
        self.size.store(outcome.size, Ordering::Release);

        if outcome.evicted() > 0 {
            self.evicted
                .fetch_add(outcome.evicted() as u64, Ordering::Relaxed);
            tracing::debug!(
                by_age = outcome.evicted_by_age,
                by_size = outcome.evicted_by_size,
                bytes_freed = outcome.bytes_freed,
                "Retention evicted buckets"
            );
        }

        tracing::debug!(
            records = records.len(),
            buckets_touched = touched,
            buckets = buckets.len(),
            bytes = outcome.size,
            "Write batch applied"
        );

        Ok(())
    }

    // =========================================================================
    // Query Engine
    // =========================================================================

    /// One value per intersecting bucket, ascending time
    ///
    /// `AggregationKind::None` returns raw values instead.
    pub fn read(&self, range: &TimeRange, kind: AggregationKind) -> Result<Vec<Value>> {
        Ok(self.read_detailed(range, kind)?.values)
    }

    /// Values with their bucket starts and the uncovered prefix of `range`
    pub fn read_detailed(&self, range: &TimeRange, kind: AggregationKind) -> Result<ReadResult> {
        if kind == AggregationKind::None {
            return self.read_raw_detailed(range);
        }
        if !self.layout.supports(kind) {
            return Err(TskvError::AggregationNotConfigured(kind));
        }

        let (hits, not_found) = self.intersecting(range);
        tracing::trace!(?range, %kind, buckets = hits.len(), "Read");

        let mut result = ReadResult {
            not_found,
            ..Default::default()
        };
        result.values.try_reserve_exact(hits.len())?;
        result.bucket_starts.try_reserve_exact(hits.len())?;

        for bucket in &hits {
            if let Some(value) = bucket.value(&self.layout, kind) {
                result.bucket_starts.push(bucket.start());
                result.values.push(value);
            }
        }

        Ok(result)
    }

    /// Raw samples of intersecting buckets, sorted by timestamp
    pub fn read_raw(&self, range: &TimeRange) -> Result<Vec<TimeRecord>> {
        if !self.options.store_raw {
            return Err(TskvError::RawUnavailable);
        }
        let (hits, _) = self.intersecting(range);
        concat_raw(&hits)
    }

    /// Timestamps of the raw samples of intersecting buckets
    pub fn read_raw_timestamps(&self, range: &TimeRange) -> Result<Vec<TimePoint>> {
        Ok(self
            .read_raw(range)?
            .into_iter()
            .map(|r| r.timestamp)
            .collect())
    }

    fn read_raw_detailed(&self, range: &TimeRange) -> Result<ReadResult> {
        if !self.options.store_raw {
            return Err(TskvError::RawUnavailable);
        }
        let (hits, not_found) = self.intersecting(range);
        tracing::trace!(?range, buckets = hits.len(), "Raw read");
        let records = concat_raw(&hits)?;

        let mut result = ReadResult {
            not_found,
            ..Default::default()
        };
        result.values.try_reserve_exact(records.len())?;
        result.bucket_starts.try_reserve_exact(records.len())?;
        for record in records {
            result.bucket_starts.push(record.timestamp);
            result.values.push(record.value);
        }
        Ok(result)
    }

    /// Snapshot the buckets intersecting `range`
    fn intersecting(&self, range: &TimeRange) -> (Vec<Arc<Bucket>>, Option<TimeRange>) {
        let buckets = self.buckets.read();
        let oldest = buckets.keys().next().copied();

        let hits = if range.start < range.end {
            let lower = Bucket::key(range.start, self.interval());
            buckets
                .range(lower..range.end)
                .map(|(_, bucket)| Arc::clone(bucket))
                .collect()
        } else {
            Vec::new()
        };
        drop(buckets);

        (hits, self.not_found(range, oldest))
    }

    /// Part of `range` older than the oldest retained bucket
    fn not_found(&self, range: &TimeRange, oldest: Option<TimePoint>) -> Option<TimeRange> {
        if range.start >= range.end {
            return None;
        }
        match oldest {
            None => Some(*range),
            Some(oldest) if range.start < oldest => {
                Some(TimeRange::new(range.start, range.end.min(oldest)))
            }
            Some(_) => None,
        }
    }

    // =========================================================================
    // Extraction
    // =========================================================================

    /// Drain every bucket into a snapshot, leaving the table empty
    pub fn extract(&self) -> Snapshot {
        let drained = {
            let mut buckets = self.buckets.write();
            self.size.store(0, Ordering::Release);
            std::mem::take(&mut *buckets)
        };

        let buckets = drained
            .into_values()
            .map(|bucket| Arc::try_unwrap(bucket).unwrap_or_else(|shared| (*shared).clone()))
            .collect();

        Snapshot::new(
            self.options.interval,
            self.layout.clone(),
            self.options.store_raw,
            buckets,
        )
    }

    /// Drop every bucket
    pub fn clear(&self) {
        let mut buckets = self.buckets.write();
        buckets.clear();
        self.size.store(0, Ordering::Release);
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn layout(&self) -> &SlotLayout {
        &self.layout
    }

    /// Estimated footprint in bytes
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.read().is_empty()
    }

    pub fn stats(&self) -> MemTableStats {
        let buckets = self.buckets.read();
        let interval = self.interval();

        let time_range = match (buckets.values().next(), buckets.values().next_back()) {
            (Some(first), Some(last)) => TimeRange::new(first.start(), last.end(interval)),
            _ => TimeRange::UNSET,
        };

        MemTableStats {
            buckets: buckets.len(),
            samples: buckets.values().map(|b| b.samples()).sum(),
            bytes: self.size.load(Ordering::Acquire),
            evicted_buckets: self.evicted.load(Ordering::Relaxed),
            time_range,
        }
    }

    fn interval(&self) -> i64 {
        self.options.interval.as_millis()
    }
}

/// Concatenate the raw lists of time-ordered buckets
fn concat_raw(buckets: &[Arc<Bucket>]) -> Result<Vec<TimeRecord>> {
    let total: usize = buckets
        .iter()
        .map(|b| b.raw().map(|r| r.len()).unwrap_or(0))
        .sum();

    let mut records = Vec::new();
    records.try_reserve_exact(total)?;
    for bucket in buckets {
        if let Some(raw) = bucket.raw() {
            records.extend_from_slice(raw);
        }
    }
    Ok(records)
}
