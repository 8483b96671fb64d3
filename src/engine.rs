//! Engine Module
//!
//! The lifecycle wrapper callers talk to.
//!
//! ## Responsibilities
//! - Initialize / Write / Read / Finish over one memtable at a time
//! - Reject operations outside an init..finish window
//! - Serialize writers, lifecycle changes and extraction
//!
//! Engines are plain values: a process may hold any number of them.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::aggregation::AggregationKind;
use crate::config::Options;
use crate::error::{Result, TskvError};
use crate::memtable::{MemTable, MemTableStats, ReadResult};
use crate::model::{TimePoint, TimeRange, TimeRecord, Value};
use crate::snapshot::Snapshot;

/// The memtable engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (write/extract/init/finish): Serialized by `write_lock`
///   - Only ONE write operation at a time
///   - A write batch, its folds and its retention pass are one unit
///
/// - **Reads**: Concurrent, no write_lock needed
///   - Take the current memtable `Arc` under a short read lock
///   - MemTable snapshots the buckets it touches, then computes lock-free
///   - A read racing `finish` completes on the memtable it started with
pub struct Engine {
    /// Live memtable between init and finish
    memtable: RwLock<Option<Arc<MemTable>>>,

    /// Serializes write operations (write/extract/init/finish)
    write_lock: Mutex<()>,
}

impl Engine {
    /// Create an uninitialized engine
    pub fn new() -> Self {
        Self {
            memtable: RwLock::new(None),
            write_lock: Mutex::new(()),
        }
    }

    /// Create and initialize an engine in one step
    pub fn open(options: Options, kinds: &[AggregationKind]) -> Result<Self> {
        let engine = Self::new();
        engine.init(options, kinds)?;
        Ok(engine)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Validate options and fix the aggregation kinds for this lifetime
    pub fn init(&self, options: Options, kinds: &[AggregationKind]) -> Result<()> {
        let _write_guard = self.write_lock.lock();

        if self.memtable.read().is_some() {
            return Err(TskvError::AlreadyInitialized);
        }

        let memtable = MemTable::new(options, kinds)?;
        tracing::info!(
            interval = %memtable.options().interval,
            max_bytes_size = ?memtable.options().max_bytes_size,
            max_age = ?memtable.options().max_age.map(|a| a.as_millis()),
            store_raw = memtable.options().store_raw,
            kinds = ?memtable.layout().kinds(),
            "Engine initialized"
        );

        *self.memtable.write() = Some(Arc::new(memtable));
        Ok(())
    }

    /// Release every bucket and return to the uninitialized state
    pub fn finish(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();

        let memtable = self
            .memtable
            .write()
            .take()
            .ok_or(TskvError::NotInitialized)?;

        tracing::info!(
            buckets = memtable.bucket_count(),
            bytes = memtable.size(),
            "Engine finished"
        );
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.memtable.read().is_some()
    }

    // =========================================================================
    // Write Path
    // =========================================================================

    /// Append a batch of records
    ///
    /// Steps:
    /// 1. Acquire write lock
    /// 2. Fold the batch into its buckets
    /// 3. Run retention once for the whole batch
    pub fn write(&self, records: &[TimeRecord]) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        let memtable = self.current()?;
        memtable.write(records)
    }

    /// Append a batch given as parallel timestamp/value arrays
    pub fn write_columns(&self, timestamps: &[TimePoint], values: &[Value]) -> Result<()> {
        if timestamps.len() != values.len() {
            return Err(TskvError::InvalidInput(format!(
                "{} timestamps but {} values",
                timestamps.len(),
                values.len()
            )));
        }

        let mut records = Vec::new();
        records.try_reserve_exact(timestamps.len())?;
        records.extend(
            timestamps
                .iter()
                .zip(values)
                .map(|(&timestamp, &value)| TimeRecord { timestamp, value }),
        );

        self.write(&records)
    }

    // =========================================================================
    // Query Engine
    // =========================================================================

    /// One value per intersecting bucket, ascending time
    pub fn read(&self, range: &TimeRange, kind: AggregationKind) -> Result<Vec<Value>> {
        self.current()?.read(range, kind)
    }

    /// Values, their bucket starts, and the part of `range` not held here
    pub fn read_detailed(&self, range: &TimeRange, kind: AggregationKind) -> Result<ReadResult> {
        self.current()?.read_detailed(range, kind)
    }

    /// Raw samples of intersecting buckets
    pub fn read_raw(&self, range: &TimeRange) -> Result<Vec<TimeRecord>> {
        self.current()?.read_raw(range)
    }

    /// Raw sample timestamps of intersecting buckets
    pub fn read_raw_timestamps(&self, range: &TimeRange) -> Result<Vec<TimePoint>> {
        self.current()?.read_raw_timestamps(range)
    }

    // =========================================================================
    // Extraction
    // =========================================================================

    /// Drain every bucket for hand-off to a flush layer
    pub fn extract(&self) -> Result<Snapshot> {
        let _write_guard = self.write_lock.lock();
        let snapshot = self.current()?.extract();

        tracing::info!(
            buckets = snapshot.len(),
            time_range = ?snapshot.time_range(),
            "Extracted memtable"
        );
        Ok(snapshot)
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn stats(&self) -> Result<MemTableStats> {
        Ok(self.current()?.stats())
    }

    /// Get the options of the live memtable
    pub fn options(&self) -> Result<Options> {
        Ok(self.current()?.options().clone())
    }

    fn current(&self) -> Result<Arc<MemTable>> {
        self.memtable
            .read()
            .as_ref()
            .map(Arc::clone)
            .ok_or(TskvError::NotInitialized)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
