//! Tests for Engine
//!
//! These tests verify:
//! - Lifecycle (init/finish) and its error cases
//! - Write/read through the engine, including the columnar write form
//! - Extraction and statistics
//! - Independent engines in one process
//! - Concurrent access patterns

use std::sync::Arc;
use std::thread;

use tskv::aggregation::AggregationKind;
use tskv::config::Options;
use tskv::engine::Engine;
use tskv::model::{Duration, TimeRange, TimeRecord};
use tskv::TskvError;

// =============================================================================
// Helper Functions
// =============================================================================

fn sum_count_options() -> Options {
    Options::builder()
        .interval(Duration::milliseconds(1000))
        .build()
}

fn setup_engine() -> Engine {
    Engine::open(
        sum_count_options(),
        &[AggregationKind::Sum, AggregationKind::Count],
    )
    .unwrap()
}

fn records(pairs: &[(i64, f64)]) -> Vec<TimeRecord> {
    pairs.iter().map(|&p| p.into()).collect()
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_operations_before_init_fail() {
    let engine = Engine::new();
    let range = TimeRange::new(0, 1000);

    assert!(!engine.is_initialized());
    assert!(matches!(
        engine.write(&records(&[(0, 1.0)])),
        Err(TskvError::NotInitialized)
    ));
    assert!(matches!(
        engine.read(&range, AggregationKind::Sum),
        Err(TskvError::NotInitialized)
    ));
    assert!(matches!(engine.read_raw(&range), Err(TskvError::NotInitialized)));
    assert!(matches!(engine.extract(), Err(TskvError::NotInitialized)));
    assert!(matches!(engine.stats(), Err(TskvError::NotInitialized)));
    assert!(matches!(engine.finish(), Err(TskvError::NotInitialized)));
}

#[test]
fn test_double_init_fails() {
    let engine = setup_engine();

    let result = engine.init(sum_count_options(), &[AggregationKind::Sum]);

    assert!(matches!(result, Err(TskvError::AlreadyInitialized)));
    assert!(engine.is_initialized());
}

#[test]
fn test_finish_then_operations_fail() {
    let engine = setup_engine();
    engine.write(&records(&[(0, 1.0)])).unwrap();

    engine.finish().unwrap();

    assert!(!engine.is_initialized());
    assert!(matches!(
        engine.read(&TimeRange::new(0, 1000), AggregationKind::Sum),
        Err(TskvError::NotInitialized)
    ));
    assert!(matches!(engine.finish(), Err(TskvError::NotInitialized)));
}

#[test]
fn test_reinit_after_finish_starts_empty() {
    let engine = setup_engine();
    engine.write(&records(&[(0, 1.0)])).unwrap();
    engine.finish().unwrap();

    engine
        .init(sum_count_options(), &[AggregationKind::Max])
        .unwrap();

    assert!(engine
        .read(&TimeRange::new(0, 1000), AggregationKind::Max)
        .unwrap()
        .is_empty());
    assert!(matches!(
        engine.read(&TimeRange::new(0, 1000), AggregationKind::Sum),
        Err(TskvError::AggregationNotConfigured(AggregationKind::Sum))
    ));
}

#[test]
fn test_init_rejects_invalid_options() {
    let engine = Engine::new();

    let options = Options::builder()
        .interval(Duration::milliseconds(0))
        .build();
    assert!(matches!(
        engine.init(options, &[AggregationKind::Sum]),
        Err(TskvError::InvalidOptions(_))
    ));
    assert!(matches!(
        engine.init(sum_count_options(), &[]),
        Err(TskvError::InvalidOptions(_))
    ));

    // A failed init leaves the engine uninitialized
    assert!(!engine.is_initialized());
    engine.init(sum_count_options(), &[AggregationKind::Sum]).unwrap();
}

// =============================================================================
// Write / Read Tests
// =============================================================================

#[test]
fn test_engine_write_read() {
    let engine = setup_engine();

    engine
        .write(&records(&[(0, 1.0), (500, 2.0), (1000, 3.0)]))
        .unwrap();

    assert_eq!(
        engine.read(&TimeRange::new(0, 2000), AggregationKind::Sum).unwrap(),
        vec![3.0, 3.0]
    );
    assert_eq!(
        engine.read(&TimeRange::new(0, 2000), AggregationKind::Count).unwrap(),
        vec![2.0, 1.0]
    );
    assert!(engine
        .read(&TimeRange::new(2000, 3000), AggregationKind::Sum)
        .unwrap()
        .is_empty());
}

#[test]
fn test_read_by_wire_code() {
    let engine = setup_engine();
    engine.write(&records(&[(0, 1.0), (500, 2.0)])).unwrap();

    let kind = AggregationKind::from_code(2).unwrap();
    assert_eq!(
        engine.read(&TimeRange::new(0, 1000), kind).unwrap(),
        vec![2.0]
    );
}

#[test]
fn test_write_columns() {
    let engine = setup_engine();

    engine
        .write_columns(&[0, 500, 1000], &[1.0, 2.0, 3.0])
        .unwrap();

    assert_eq!(
        engine.read(&TimeRange::new(0, 2000), AggregationKind::Sum).unwrap(),
        vec![3.0, 3.0]
    );
}

#[test]
fn test_write_columns_length_mismatch() {
    let engine = setup_engine();

    let result = engine.write_columns(&[0, 500], &[1.0]);

    assert!(matches!(result, Err(TskvError::InvalidInput(_))));
    assert_eq!(engine.stats().unwrap().samples, 0);
}

#[test]
fn test_unconfigured_and_raw_errors() {
    let engine = setup_engine();
    engine.write(&records(&[(0, 1.0)])).unwrap();
    let range = TimeRange::new(0, 1000);

    assert!(matches!(
        engine.read(&range, AggregationKind::Min),
        Err(TskvError::AggregationNotConfigured(AggregationKind::Min))
    ));
    assert!(matches!(
        engine.read(&range, AggregationKind::None),
        Err(TskvError::RawUnavailable)
    ));
    assert!(matches!(
        engine.read_raw_timestamps(&range),
        Err(TskvError::RawUnavailable)
    ));

    // Sum and Count configured, so Avg is derivable
    assert_eq!(engine.read(&range, AggregationKind::Avg).unwrap(), vec![1.0]);
}

#[test]
fn test_raw_reads_through_engine() {
    let options = Options::builder()
        .interval(Duration::milliseconds(1000))
        .store_raw(true)
        .build();
    let engine = Engine::open(options, &[AggregationKind::Last]).unwrap();

    engine
        .write(&records(&[(1500, 2.0), (200, 1.0), (1500, 3.0)]))
        .unwrap();

    let range = TimeRange::new(0, 2000);
    assert_eq!(engine.read_raw_timestamps(&range).unwrap(), vec![200, 1500, 1500]);
    assert_eq!(
        engine.read(&range, AggregationKind::None).unwrap(),
        vec![1.0, 2.0, 3.0]
    );
    assert_eq!(
        engine.read(&range, AggregationKind::Last).unwrap(),
        vec![1.0, 3.0]
    );
}

#[test]
fn test_read_detailed_reports_uncovered_prefix() {
    let engine = setup_engine();
    engine.write(&records(&[(5000, 1.0)])).unwrap();

    let result = engine
        .read_detailed(&TimeRange::new(0, 10_000), AggregationKind::Sum)
        .unwrap();

    assert_eq!(result.bucket_starts, vec![5000]);
    assert_eq!(result.values, vec![1.0]);
    assert_eq!(result.not_found, Some(TimeRange::new(0, 5000)));
}

#[test]
fn test_byte_bound_through_engine() {
    let options = Options::builder()
        .interval(Duration::milliseconds(1000))
        .max_bytes_size(8)
        .build();
    let engine = Engine::open(options, &[AggregationKind::Sum]).unwrap();

    engine.write(&records(&[(0, 1.0)])).unwrap();
    engine.write(&records(&[(5000, 2.0)])).unwrap();
    engine.write(&records(&[(10_000, 3.0)])).unwrap();

    assert!(engine
        .read(&TimeRange::new(0, 1000), AggregationKind::Sum)
        .unwrap()
        .is_empty());
    assert!(engine
        .read(&TimeRange::new(5000, 6000), AggregationKind::Sum)
        .unwrap()
        .is_empty());
    assert_eq!(
        engine.read(&TimeRange::new(10_000, 11_000), AggregationKind::Sum).unwrap(),
        vec![3.0]
    );
}

// =============================================================================
// Extraction / Stats Tests
// =============================================================================

#[test]
fn test_extract_through_engine() {
    let engine = setup_engine();
    engine
        .write(&records(&[(0, 1.0), (500, 2.0), (1000, 3.0)]))
        .unwrap();

    let snapshot = engine.extract().unwrap();

    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot.values(AggregationKind::Count).unwrap(), vec![2.0, 1.0]);
    assert_eq!(engine.stats().unwrap().buckets, 0);
    assert!(engine.is_initialized());
}

#[test]
fn test_stats_through_engine() {
    let engine = setup_engine();
    engine
        .write(&records(&[(0, 1.0), (500, 2.0), (1000, 3.0)]))
        .unwrap();

    let stats = engine.stats().unwrap();

    assert_eq!(stats.buckets, 2);
    assert_eq!(stats.samples, 3);
    assert_eq!(stats.time_range, TimeRange::new(0, 2000));
    assert_eq!(engine.options().unwrap(), sum_count_options());
}

#[test]
fn test_independent_engines() {
    let a = setup_engine();
    let b = setup_engine();

    a.write(&records(&[(0, 1.0)])).unwrap();
    b.write(&records(&[(0, 10.0)])).unwrap();
    b.finish().unwrap();

    assert_eq!(
        a.read(&TimeRange::new(0, 1000), AggregationKind::Sum).unwrap(),
        vec![1.0]
    );
    assert!(!b.is_initialized());
}

// =============================================================================
// Concurrent Access Tests
// =============================================================================

#[test]
fn test_concurrent_reads_and_writes() {
    let engine = Arc::new(setup_engine());
    let mut handles = vec![];

    let writer = Arc::clone(&engine);
    handles.push(thread::spawn(move || {
        for i in 0..100 {
            writer.write(&records(&[(i * 100, 2.0)])).unwrap();
        }
    }));

    for _ in 0..4 {
        let reader = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            for _ in 0..100 {
                let avg = reader
                    .read(&TimeRange::new(0, 10_000), AggregationKind::Avg)
                    .unwrap();
                assert!(avg.iter().all(|v| *v == 2.0));
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(
        engine.read(&TimeRange::new(0, 10_000), AggregationKind::Count).unwrap(),
        vec![10.0; 10]
    );
}

#[test]
fn test_reads_racing_finish_do_not_panic() {
    let engine = Arc::new(setup_engine());
    engine.write(&records(&[(0, 1.0)])).unwrap();

    let reader = Arc::clone(&engine);
    let handle = thread::spawn(move || {
        for _ in 0..1000 {
            match reader.read(&TimeRange::new(0, 1000), AggregationKind::Sum) {
                Ok(values) => assert_eq!(values, vec![1.0]),
                Err(TskvError::NotInitialized) => break,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
    });

    engine.finish().unwrap();
    handle.join().unwrap();
}
