//! Configuration for tskv
//!
//! Memtable options with sensible defaults and a builder.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TskvError};
use crate::model::Duration;

/// Options fixed for the lifetime of a memtable instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Options {
    // -------------------------------------------------------------------------
    // Bucketing
    // -------------------------------------------------------------------------
    /// Width of every aggregation bucket
    pub interval: Duration,

    // -------------------------------------------------------------------------
    // Retention
    // -------------------------------------------------------------------------
    /// Upper bound on the estimated footprint (in bytes)
    pub max_bytes_size: Option<usize>,

    /// Buckets ending at or before `latest_bucket_end - max_age` are evicted
    pub max_age: Option<Duration>,

    // -------------------------------------------------------------------------
    // Raw Storage
    // -------------------------------------------------------------------------
    /// Keep individual samples next to the aggregates
    pub store_raw: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::seconds(1),
            max_bytes_size: None,
            max_age: None,
            store_raw: false,
        }
    }
}

impl Options {
    /// Create a new options builder
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::default()
    }

    /// Check the options once, before any bucket is allocated
    pub fn validate(&self) -> Result<()> {
        if self.interval.as_millis() <= 0 {
            return Err(TskvError::InvalidOptions(format!(
                "interval must be positive, got {}",
                self.interval
            )));
        }
        if let Some(max_age) = self.max_age {
            if max_age.as_millis() <= 0 {
                return Err(TskvError::InvalidOptions(format!(
                    "max_age must be positive, got {}",
                    max_age
                )));
            }
        }
        if self.max_bytes_size == Some(0) {
            return Err(TskvError::InvalidOptions(
                "max_bytes_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Options
#[derive(Default)]
pub struct OptionsBuilder {
    options: Options,
}

impl OptionsBuilder {
    /// Set the bucket interval
    pub fn interval(mut self, interval: Duration) -> Self {
        self.options.interval = interval;
        self
    }

    /// Cap the estimated footprint (in bytes)
    pub fn max_bytes_size(mut self, size: usize) -> Self {
        self.options.max_bytes_size = Some(size);
        self
    }

    /// Cap the age of retained buckets
    pub fn max_age(mut self, age: Duration) -> Self {
        self.options.max_age = Some(age);
        self
    }

    /// Enable or disable raw sample retention
    pub fn store_raw(mut self, store_raw: bool) -> Self {
        self.options.store_raw = store_raw;
        self
    }

    pub fn build(self) -> Options {
        self.options
    }
}
