//! Error types for tskv
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

use crate::aggregation::AggregationKind;

/// Result type alias using TskvError
pub type Result<T> = std::result::Result<T, TskvError>;

/// Unified error type for tskv operations
#[derive(Debug, Error)]
pub enum TskvError {
    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Engine is not initialized")]
    NotInitialized,

    #[error("Engine is already initialized")]
    AlreadyInitialized,

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // -------------------------------------------------------------------------
    // Query Errors
    // -------------------------------------------------------------------------
    #[error("Aggregation {0} was not configured at initialization")]
    AggregationNotConfigured(AggregationKind),

    #[error("Raw samples are not retained (store_raw is disabled)")]
    RawUnavailable,

    #[error("Unknown aggregation code: {0}")]
    UnknownAggregationCode(u8),

    #[error("Unknown aggregation name: {0}")]
    UnknownAggregationName(String),

    // -------------------------------------------------------------------------
    // Resource Errors
    // -------------------------------------------------------------------------
    #[error("Allocation failure: {0}")]
    AllocationFailure(String),

    // -------------------------------------------------------------------------
    // Snapshot Errors
    // -------------------------------------------------------------------------
    #[error("Snapshot corruption detected: {0}")]
    SnapshotCorruption(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<std::collections::TryReserveError> for TskvError {
    fn from(err: std::collections::TryReserveError) -> Self {
        TskvError::AllocationFailure(err.to_string())
    }
}

impl From<bincode::Error> for TskvError {
    fn from(err: bincode::Error) -> Self {
        TskvError::Serialization(err.to_string())
    }
}
