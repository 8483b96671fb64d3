//! Snapshot Module
//!
//! Buckets drained out of a memtable, ready to be handed to a flush layer.
//!
//! ## Encoded Format
//! ```text
//! ┌───────────┬─────────┬─────────┬──────────────────────────┐
//! │ MAGIC (4) │ CRC (4) │ Len (4) │ Payload (bincode)        │
//! └───────────┴─────────┴─────────┴──────────────────────────┘
//! ```
//! CRC32 covers the payload only. Integers are little-endian.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::aggregation::AggregationKind;
use crate::error::{Result, TskvError};
use crate::memtable::{Bucket, SlotLayout};
use crate::model::{Duration, TimeRange, Value};

/// Magic bytes at the start of every encoded snapshot
pub const MAGIC: &[u8; 4] = b"TSKV";

/// Header size: magic (4) + crc (4) + payload length (4)
pub const HEADER_SIZE: usize = 12;

/// Time-ordered buckets extracted from a memtable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    interval: Duration,
    layout: SlotLayout,
    store_raw: bool,
    buckets: Vec<Bucket>,
}

impl Snapshot {
    pub(crate) fn new(
        interval: Duration,
        layout: SlotLayout,
        store_raw: bool,
        buckets: Vec<Bucket>,
    ) -> Self {
        Self {
            interval,
            layout,
            store_raw,
            buckets,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn layout(&self) -> &SlotLayout {
        &self.layout
    }

    pub fn store_raw(&self) -> bool {
        self.store_raw
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// `[first_start, last_end)`, or unset when empty
    pub fn time_range(&self) -> TimeRange {
        match (self.buckets.first(), self.buckets.last()) {
            (Some(first), Some(last)) => {
                TimeRange::new(first.start(), last.end(self.interval.as_millis()))
            }
            _ => TimeRange::UNSET,
        }
    }

    /// One value of `kind` per bucket, ascending time
    pub fn values(&self, kind: AggregationKind) -> Result<Vec<Value>> {
        if !self.layout.supports(kind) {
            return Err(TskvError::AggregationNotConfigured(kind));
        }
        Ok(self
            .buckets
            .iter()
            .filter_map(|b| b.value(&self.layout, kind))
            .collect())
    }

    // =========================================================================
    // Rescaling
    // =========================================================================

    /// Coarsen to `interval`, which must be a positive multiple of the current one
    ///
    /// Buckets falling into the same coarse bucket are merged oldest first.
    pub fn rescale(&self, interval: Duration) -> Result<Snapshot> {
        let current = self.interval.as_millis();
        let target = interval.as_millis();
        if target <= 0 || target % current != 0 {
            return Err(TskvError::InvalidOptions(format!(
                "cannot rescale {} buckets to {}",
                self.interval, interval
            )));
        }

        let mut coarse: Vec<Bucket> = Vec::new();
        for bucket in &self.buckets {
            let key = Bucket::key(bucket.start(), target);
            match coarse.last_mut() {
                Some(last) if last.start() == key => last.merge(&self.layout, bucket)?,
                _ => coarse.push(bucket.clone().with_start(key)),
            }
        }

        Ok(Snapshot::new(
            interval,
            self.layout.clone(),
            self.store_raw,
            coarse,
        ))
    }

    // =========================================================================
    // Encoding
    // =========================================================================

    /// Encode into a checksummed frame
    pub fn encode(&self) -> Result<Bytes> {
        let payload = bincode::serialize(self)?;
        let len = u32::try_from(payload.len()).map_err(|_| {
            TskvError::Serialization(format!("snapshot too large: {} bytes", payload.len()))
        })?;

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
        buf.put_slice(MAGIC);
        buf.put_u32_le(crc32fast::hash(&payload));
        buf.put_u32_le(len);
        buf.put_slice(&payload);
        Ok(buf.freeze())
    }

    /// Decode a frame produced by [`Snapshot::encode`]
    pub fn decode(bytes: &[u8]) -> Result<Snapshot> {
        if bytes.len() < HEADER_SIZE {
            return Err(TskvError::SnapshotCorruption(format!(
                "incomplete header: expected {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }
        if &bytes[..4] != MAGIC {
            return Err(TskvError::SnapshotCorruption("bad magic".to_string()));
        }

        let mut header = &bytes[4..HEADER_SIZE];
        let crc = header.get_u32_le();
        let len = header.get_u32_le() as usize;

        let payload = bytes.get(HEADER_SIZE..HEADER_SIZE + len).ok_or_else(|| {
            TskvError::SnapshotCorruption(format!(
                "incomplete payload: expected {} bytes, got {}",
                len,
                bytes.len() - HEADER_SIZE
            ))
        })?;

        let actual = crc32fast::hash(payload);
        if actual != crc {
            return Err(TskvError::SnapshotCorruption(format!(
                "checksum mismatch: expected {:08x}, got {:08x}",
                crc, actual
            )));
        }

        let snapshot: Snapshot = bincode::deserialize(payload)?;
        snapshot.check()?;
        Ok(snapshot)
    }

    /// Reject payloads that decode but do not describe a valid snapshot
    fn check(&self) -> Result<()> {
        let interval = self.interval.as_millis();
        if interval <= 0 {
            return Err(TskvError::SnapshotCorruption(format!(
                "non-positive interval {}",
                self.interval
            )));
        }

        let kinds = self.layout.kinds();
        if kinds.is_empty() {
            return Err(TskvError::SnapshotCorruption(
                "empty slot layout".to_string(),
            ));
        }
        for (i, kind) in kinds.iter().enumerate() {
            if !kind.has_accumulator() || kinds[..i].contains(kind) {
                return Err(TskvError::SnapshotCorruption(format!(
                    "invalid slot layout {:?}",
                    kinds
                )));
            }
        }

        let mut previous = None;
        for bucket in &self.buckets {
            if bucket.accumulators().len() != self.layout.len()
                || bucket.raw().is_some() != self.store_raw
                || Bucket::key(bucket.start(), interval) != bucket.start()
                || previous.map_or(false, |p| p >= bucket.start())
            {
                return Err(TskvError::SnapshotCorruption(format!(
                    "bucket at {} does not match the snapshot layout",
                    bucket.start()
                )));
            }
            previous = Some(bucket.start());
        }
        Ok(())
    }
}
