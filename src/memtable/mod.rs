//! MemTable Module
//!
//! In-memory bucketed aggregation store for recent samples.
//!
//! ## Responsibilities
//! - Assign each record to its `[k * interval, (k + 1) * interval)` bucket
//! - Fold values into per-bucket accumulators (and raw lists, if enabled)
//! - Evict whole buckets to honor age and byte bounds
//! - Answer range queries at bucket granularity
//!
//! ## Data Structure Choice
//! `BTreeMap<TimePoint, Arc<Bucket>>` wrapped in an RwLock:
//! - Ordered keys give the range lookup and oldest-first eviction
//! - `Arc` buckets let readers finish on a snapshot while the writer
//!   evicts or copies-on-write

mod bucket;
mod retention;
mod table;

use serde::{Deserialize, Serialize};

use crate::model::{TimePoint, TimeRange, Value};

pub use bucket::{Bucket, SlotLayout, SAMPLE_SIZE, SLOT_SIZE};
pub use table::MemTable;

/// Result of a detailed read
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadResult {
    /// Bucket start per value (sample timestamps for raw reads)
    pub bucket_starts: Vec<TimePoint>,

    /// One value per intersecting bucket (per sample for raw reads), ascending time
    pub values: Vec<Value>,

    /// Prefix of the requested range older than anything retained here
    pub not_found: Option<TimeRange>,
}

impl ReadResult {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Point-in-time counters for a memtable
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemTableStats {
    pub buckets: usize,
    pub samples: u64,
    /// Estimated footprint in bytes
    pub bytes: usize,
    /// Buckets evicted over the memtable's lifetime
    pub evicted_buckets: u64,
    /// `[oldest_start, latest_end)`, or unset when empty
    pub time_range: TimeRange,
}
