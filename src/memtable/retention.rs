//! Retention controller
//!
//! Runs once per write batch, with the bucket map write-locked. Evicts whole
//! buckets, oldest first, until the age and byte bounds hold.
//!
//! - Age: evict every bucket whose end is `<= latest_bucket_end - max_age`.
//! - Bytes: while the footprint exceeds `max_bytes_size`, evict the oldest
//!   bucket. The newest bucket is never evicted for size; if it alone
//!   exceeds the cap it stays as the best achievable state.
//!
//! Evicted buckets are dropped from the map only. Readers that cloned the
//! `Arc` keep their copy alive until they finish.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::Options;
use crate::model::TimePoint;

use super::Bucket;

/// What a retention pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RetentionOutcome {
    /// Footprint after the pass
    pub size: usize,
    pub evicted_by_age: usize,
    pub evicted_by_size: usize,
    pub bytes_freed: usize,
}

impl RetentionOutcome {
    pub fn evicted(&self) -> usize {
        self.evicted_by_age + self.evicted_by_size
    }

    fn release(&mut self, bytes: usize) {
        self.size = self.size.saturating_sub(bytes);
        self.bytes_freed += bytes;
    }
}

/// Trim `buckets` to satisfy both bounds
pub(crate) fn enforce(
    buckets: &mut BTreeMap<TimePoint, Arc<Bucket>>,
    options: &Options,
    size: usize,
) -> RetentionOutcome {
    let mut outcome = RetentionOutcome {
        size,
        ..Default::default()
    };
    let interval = options.interval.as_millis();

    if let Some(max_age) = options.max_age {
        if let Some(latest) = buckets.values().next_back() {
            let cutoff = latest
                .end(interval)
                .saturating_sub(max_age.as_millis());

            while let Some(entry) = buckets.first_entry() {
                if entry.get().end(interval) > cutoff {
                    break;
                }
                let bucket = entry.remove();
                outcome.release(bucket.byte_size());
                outcome.evicted_by_age += 1;
            }
        }
    }

    if let Some(max_bytes) = options.max_bytes_size {
        while outcome.size > max_bytes && buckets.len() > 1 {
            match buckets.pop_first() {
                Some((_, bucket)) => {
                    outcome.release(bucket.byte_size());
                    outcome.evicted_by_size += 1;
                }
                None => break,
            }
        }
    }

    outcome
}
