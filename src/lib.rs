//! # tskv
//!
//! A write-optimized, in-memory time-series memtable with:
//! - Running aggregations (sum, count, min, max, last, avg) over fixed buckets
//! - Optional raw sample retention
//! - Age and byte bounded retention by whole-bucket eviction
//! - Single-writer/multi-reader concurrency model
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Engine                              │
//! │              init / write / read / finish                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                         MemTable                             │
//! │          (Single Writer / Multi Reader, RwLock)              │
//! └──────┬──────────────────────┬──────────────────────┬────────┘
//!        │                      │                      │
//!        ▼                      ▼                      ▼
//!  ┌───────────┐        ┌──────────────┐        ┌────────────┐
//!  │  Buckets  │        │  Retention   │        │  Snapshot  │
//!  │ Arc<...>  │        │ (age, bytes) │        │ (extract)  │
//!  └─────┬─────┘        └──────────────┘        └────────────┘
//!        │
//!        ▼
//!  ┌─────────────┐
//!  │ Aggregators │
//!  │ fold/merge  │
//!  └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod model;

pub mod aggregation;
pub mod memtable;
pub mod snapshot;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{TskvError, Result};
pub use config::Options;
pub use model::{Duration, TimePoint, TimeRange, TimeRecord, Value};
pub use aggregation::AggregationKind;
pub use memtable::{MemTable, MemTableStats, ReadResult};
pub use snapshot::Snapshot;
pub use engine::Engine;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of tskv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
