//! Core data model
//!
//! Timestamps, durations, time ranges and the records producers append.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Milliseconds since an arbitrary fixed epoch
pub type TimePoint = i64;

/// Sample value
pub type Value = f64;

// =============================================================================
// Duration
// =============================================================================

/// A span of time in milliseconds
///
/// Months are fixed at 30 days. Constructors saturate at the `i64` bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Duration(i64);

impl Duration {
    const SECOND: i64 = 1000;
    const MINUTE: i64 = 60 * Self::SECOND;
    const HOUR: i64 = 60 * Self::MINUTE;
    const DAY: i64 = 24 * Self::HOUR;

    pub const fn milliseconds(ms: i64) -> Self {
        Self(ms)
    }

    pub const fn seconds(seconds: i64) -> Self {
        Self(seconds.saturating_mul(Self::SECOND))
    }

    pub const fn minutes(minutes: i64) -> Self {
        Self(minutes.saturating_mul(Self::MINUTE))
    }

    pub const fn hours(hours: i64) -> Self {
        Self(hours.saturating_mul(Self::HOUR))
    }

    pub const fn days(days: i64) -> Self {
        Self(days.saturating_mul(Self::DAY))
    }

    pub const fn weeks(weeks: i64) -> Self {
        Self(weeks.saturating_mul(7 * Self::DAY))
    }

    pub const fn months(months: i64) -> Self {
        Self(months.saturating_mul(30 * Self::DAY))
    }

    /// Length in milliseconds
    pub const fn as_millis(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

// =============================================================================
// TimeRange
// =============================================================================

/// Half-open range `[start, end)`
///
/// `start == end == 0` is the "unset" sentinel: merging it with another
/// range yields the other range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: TimePoint,
    pub end: TimePoint,
}

impl TimeRange {
    pub const UNSET: TimeRange = TimeRange { start: 0, end: 0 };

    pub const fn new(start: TimePoint, end: TimePoint) -> Self {
        Self { start, end }
    }

    pub fn is_unset(&self) -> bool {
        self.start == 0 && self.end == 0
    }

    /// Span of the range (zero for empty or inverted ranges)
    pub fn duration(&self) -> Duration {
        Duration::milliseconds(self.end.saturating_sub(self.start).max(0))
    }

    /// Smallest range covering both operands
    pub fn merge(&self, other: &TimeRange) -> TimeRange {
        if self.is_unset() {
            return *other;
        }
        if other.is_unset() {
            return *self;
        }
        TimeRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Whether `[start, end)` shares at least one instant with this range
    pub fn intersects(&self, start: TimePoint, end: TimePoint) -> bool {
        start < self.end && self.start < end
    }

    pub fn contains(&self, timestamp: TimePoint) -> bool {
        self.start <= timestamp && timestamp < self.end
    }
}

// =============================================================================
// TimeRecord
// =============================================================================

/// A single time-stamped sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRecord {
    pub timestamp: TimePoint,
    pub value: Value,
}

impl TimeRecord {
    pub const fn new(timestamp: TimePoint, value: Value) -> Self {
        Self { timestamp, value }
    }
}

impl From<(TimePoint, Value)> for TimeRecord {
    fn from((timestamp, value): (TimePoint, Value)) -> Self {
        Self { timestamp, value }
    }
}
