//! Aggregation Module
//!
//! The canonical aggregation enumeration and the registry of fold/merge
//! functions every bucket uses.
//!
//! ## Wire Codes
//! ```text
//! ┌──────┬───────┬───────┬─────┬─────┬──────┬─────┐
//! │ None │  Sum  │ Count │ Min │ Max │ Last │ Avg │
//! │  0   │   1   │   2   │  3  │  4  │  5   │  6  │
//! └──────┴───────┴───────┴─────┴─────┴──────┴─────┘
//!  \_____________ stored ______________/    derived
//! ```
//!
//! Codes 0-5 cross the engine boundary and must never be renumbered.
//! `None` requests raw samples; `Avg` is computed at read time as Sum/Count.

mod registry;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TskvError};

pub use registry::{aggregator, average, Aggregator};

/// Aggregation kinds, numerically aligned with the wire codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum AggregationKind {
    /// Raw samples (no aggregation)
    None = 0,
    Sum = 1,
    Count = 2,
    Min = 3,
    Max = 4,
    Last = 5,
    /// Derived from Sum and Count, never stored
    Avg = 6,
}

/// Code ↔ kind mapping; the single source for decoding wire codes
pub const CODE_TABLE: [(u8, AggregationKind); 7] = [
    (0, AggregationKind::None),
    (1, AggregationKind::Sum),
    (2, AggregationKind::Count),
    (3, AggregationKind::Min),
    (4, AggregationKind::Max),
    (5, AggregationKind::Last),
    (6, AggregationKind::Avg),
];

impl AggregationKind {
    /// Kinds that own an accumulator slot
    pub const STORED: [AggregationKind; 5] = [
        AggregationKind::Sum,
        AggregationKind::Count,
        AggregationKind::Min,
        AggregationKind::Max,
        AggregationKind::Last,
    ];

    /// Numeric code used across the engine boundary
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decode a wire code
    pub fn from_code(code: u8) -> Result<Self> {
        CODE_TABLE
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, kind)| *kind)
            .ok_or(TskvError::UnknownAggregationCode(code))
    }

    /// Whether this kind is part of the stored enumeration (codes 0-5)
    pub fn is_stored(self) -> bool {
        self != AggregationKind::Avg
    }

    /// Whether a bucket keeps an accumulator for this kind
    pub fn has_accumulator(self) -> bool {
        !matches!(self, AggregationKind::None | AggregationKind::Avg)
    }

    pub fn name(self) -> &'static str {
        match self {
            AggregationKind::None => "none",
            AggregationKind::Sum => "sum",
            AggregationKind::Count => "count",
            AggregationKind::Min => "min",
            AggregationKind::Max => "max",
            AggregationKind::Last => "last",
            AggregationKind::Avg => "avg",
        }
    }
}

impl fmt::Display for AggregationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AggregationKind {
    type Err = TskvError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "raw" => Ok(AggregationKind::None),
            "sum" => Ok(AggregationKind::Sum),
            "count" => Ok(AggregationKind::Count),
            "min" => Ok(AggregationKind::Min),
            "max" => Ok(AggregationKind::Max),
            "last" => Ok(AggregationKind::Last),
            "avg" | "average" => Ok(AggregationKind::Avg),
            _ => Err(TskvError::UnknownAggregationName(s.to_string())),
        }
    }
}

impl TryFrom<u8> for AggregationKind {
    type Error = TskvError;

    fn try_from(code: u8) -> Result<Self> {
        Self::from_code(code)
    }
}
