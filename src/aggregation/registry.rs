//! Aggregator registry
//!
//! Stateless fold/merge functions, one entry per stored kind.
//!
//! An accumulator state is `Option<Value>`: `None` is the identity (no
//! sample seen yet). `merge` takes the older state first; for Last the
//! newer state wins, for Min/Max ties keep the older value and NaN is
//! ignored unless every sample is NaN.

use super::AggregationKind;
use crate::model::Value;

/// Fold/merge functions for one aggregation kind
#[derive(Debug)]
pub struct Aggregator {
    kind: AggregationKind,
    /// State after the first sample
    seed: fn(Value) -> Value,
    /// (state, sample) -> state
    fold: fn(Value, Value) -> Value,
    /// (older, newer) -> state
    merge: fn(Value, Value) -> Value,
}

impl Aggregator {
    pub fn kind(&self) -> AggregationKind {
        self.kind
    }

    /// The empty state
    pub fn identity(&self) -> Option<Value> {
        None
    }

    /// Fold one sample into a state
    pub fn fold(&self, state: Option<Value>, sample: Value) -> Value {
        match state {
            Some(state) => (self.fold)(state, sample),
            None => (self.seed)(sample),
        }
    }

    /// Combine two partial states, `older` having arrived first
    pub fn merge(&self, older: Option<Value>, newer: Option<Value>) -> Option<Value> {
        match (older, newer) {
            (Some(a), Some(b)) => Some((self.merge)(a, b)),
            (a, None) => a,
            (None, b) => b,
        }
    }
}

// =============================================================================
// Function Table
// =============================================================================

fn identity_seed(sample: Value) -> Value {
    sample
}

fn count_seed(_sample: Value) -> Value {
    1.0
}

fn add(a: Value, b: Value) -> Value {
    a + b
}

fn count_fold(state: Value, _sample: Value) -> Value {
    state + 1.0
}

// NaN loses to any number, whichever side it arrives on

fn keep_min(current: Value, candidate: Value) -> Value {
    if candidate < current || current.is_nan() {
        candidate
    } else {
        current
    }
}

fn keep_max(current: Value, candidate: Value) -> Value {
    if candidate > current || current.is_nan() {
        candidate
    } else {
        current
    }
}

fn take_newer(_older: Value, newer: Value) -> Value {
    newer
}

static SUM: Aggregator = Aggregator {
    kind: AggregationKind::Sum,
    seed: identity_seed,
    fold: add,
    merge: add,
};

static COUNT: Aggregator = Aggregator {
    kind: AggregationKind::Count,
    seed: count_seed,
    fold: count_fold,
    merge: add,
};

static MIN: Aggregator = Aggregator {
    kind: AggregationKind::Min,
    seed: identity_seed,
    fold: keep_min,
    merge: keep_min,
};

static MAX: Aggregator = Aggregator {
    kind: AggregationKind::Max,
    seed: identity_seed,
    fold: keep_max,
    merge: keep_max,
};

static LAST: Aggregator = Aggregator {
    kind: AggregationKind::Last,
    seed: identity_seed,
    fold: take_newer,
    merge: take_newer,
};

/// Look up the aggregator for a stored kind
///
/// `None` and `Avg` have no accumulator and return `None`.
pub fn aggregator(kind: AggregationKind) -> Option<&'static Aggregator> {
    match kind {
        AggregationKind::Sum => Some(&SUM),
        AggregationKind::Count => Some(&COUNT),
        AggregationKind::Min => Some(&MIN),
        AggregationKind::Max => Some(&MAX),
        AggregationKind::Last => Some(&LAST),
        AggregationKind::None | AggregationKind::Avg => None,
    }
}

/// Average derived from a bucket's Sum and Count
pub fn average(sum: Value, count: Value) -> Value {
    sum / count
}
