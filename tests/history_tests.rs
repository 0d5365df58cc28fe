//! Integration tests for bounded metric history.
//!
//! These tests exercise the history store through the public API, including
//! recording from several threads at once as the monitor's sampler tasks do.

use chrono::{Duration as ChronoDuration, Utc};
use herakles_live_monitor::history_store::HistoryStore;
use herakles_live_monitor::{HistoryBuffer, HistoryPoint, MetricStream};
use std::sync::Arc;
use std::thread;

// -------------------------------------------------------------------------
// Buffer semantics
// -------------------------------------------------------------------------

#[test]
fn test_buffer_never_exceeds_capacity() {
    let mut buffer = HistoryBuffer::new(5);
    for i in 0..1000u32 {
        buffer.push(i);
        assert!(buffer.len() <= 5);
    }
    assert_eq!(buffer.snapshot(), vec![995, 996, 997, 998, 999]);
    assert_eq!(buffer.latest(), Some(&999));
}

#[test]
fn test_buffer_partial_fill_keeps_insertion_order() {
    let mut buffer = HistoryBuffer::new(60);
    for i in 0..3u32 {
        buffer.push(i);
    }
    assert_eq!(buffer.snapshot(), vec![0, 1, 2]);
    assert_eq!(buffer.capacity(), 60);
}

#[test]
fn test_points_are_chronological_after_wrap() {
    let mut buffer = HistoryBuffer::new(4);
    let start = Utc::now();
    for i in 0..9 {
        buffer.push(HistoryPoint::new(start + ChronoDuration::seconds(i), i as f64));
    }

    let points = buffer.snapshot();
    assert_eq!(points.len(), 4);
    for pair in points.windows(2) {
        assert!(pair[0].timestamp < pair[1].timestamp);
    }
    assert_eq!(points[0].value, 5.0);
}

#[test]
fn test_non_finite_values_recorded_as_zero() {
    let store = HistoryStore::new(8, 1000);
    store.record(
        MetricStream::Gpu,
        HistoryPoint::with_secondary(Utc::now(), f64::NAN, f64::INFINITY),
    );
    store.record(MetricStream::Gpu, HistoryPoint::new(Utc::now(), f64::NEG_INFINITY));

    for point in store.history(MetricStream::Gpu) {
        assert_eq!(point.value, 0.0);
        assert!(point.secondary.map(|s| s == 0.0).unwrap_or(true));
    }
}

// -------------------------------------------------------------------------
// Store
// -------------------------------------------------------------------------

#[test]
fn test_streams_are_independent() {
    let store = HistoryStore::new(2, 1000);
    for i in 0..5 {
        store.record(MetricStream::Cpu, HistoryPoint::new(Utc::now(), i as f64));
    }
    store.record(MetricStream::Disk, HistoryPoint::new(Utc::now(), 42.0));

    assert_eq!(store.len(MetricStream::Cpu), 2);
    assert_eq!(store.len(MetricStream::Disk), 1);
    assert!(store.history(MetricStream::Network).is_empty());

    let stats = store.stats();
    assert_eq!(stats.streams, 2);
    assert_eq!(stats.total_points, 3);
    assert_eq!(stats.capacity_per_stream, 2);
}

#[test]
fn test_history_window_seconds() {
    let stats = HistoryStore::new(60, 1000).stats();
    assert_eq!(stats.history_seconds, 60);

    let stats = HistoryStore::new(120, 250).stats();
    assert_eq!(stats.history_seconds, 30);
}

#[test]
fn test_concurrent_recording() {
    let store = Arc::new(HistoryStore::new(50, 1000));
    let mut handles = vec![];

    for stream in MetricStream::ALL {
        let store = store.clone();
        handles.push(thread::spawn(move || {
            for i in 0..200 {
                store.record(stream, HistoryPoint::new(Utc::now(), i as f64));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    for stream in MetricStream::ALL {
        let values: Vec<f64> = store.history(stream).iter().map(|p| p.value).collect();
        assert_eq!(values.len(), 50);
        assert_eq!(values.first(), Some(&150.0));
        assert_eq!(values.last(), Some(&199.0));
    }
    assert_eq!(store.stats().total_points, 50 * MetricStream::ALL.len());
}
