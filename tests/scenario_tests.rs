//! End-to-end rate scenarios for the CPU and network samplers.
//!
//! Readings are fed through `apply` with explicit timestamps so the
//! expected percentages and rates are exact.

use herakles_live_monitor::collectors::cpu::{CpuReading, CpuTicks};
use herakles_live_monitor::collectors::network::InterfaceReading;
use herakles_live_monitor::collectors::{CpuSampler, NetworkSampler};
use herakles_live_monitor::snapshot::CpuTopology;
use herakles_live_monitor::RateCounter;
use std::time::{Duration, Instant};

fn reading(user: u64, system: u64, idle: u64) -> CpuReading {
    let ticks = CpuTicks::new(user, system, idle, 0);
    CpuReading {
        total: ticks,
        cores: vec![ticks],
    }
}

fn cpu_sampler() -> CpuSampler {
    CpuSampler::with_topology("/nonexistent", CpuTopology::uniform(1))
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 0.01
}

// -------------------------------------------------------------------------
// CPU
// -------------------------------------------------------------------------

#[test]
fn test_cpu_first_reading_reports_zero() {
    let mut sampler = cpu_sampler();
    let snap = sampler.apply(reading(100, 50, 850));
    assert_eq!(snap.usage_percent, 0.0);
    assert_eq!(snap.cores.len(), 1);
    assert_eq!(snap.cores[0].usage_percent, 0.0);
}

#[test]
fn test_cpu_usage_from_tick_delta() {
    let mut sampler = cpu_sampler();
    sampler.apply(reading(100, 50, 850));

    // 70 busy ticks out of 110
    let snap = sampler.apply(reading(150, 70, 890));
    assert!(approx(snap.usage_percent, 63.64), "got {}", snap.usage_percent);
    assert!(approx(snap.user_percent, 45.45));
    assert!(approx(snap.system_percent, 18.18));
    assert!(approx(snap.idle_percent, 36.36));
    assert!(approx(snap.cores[0].usage_percent, 63.64));
}

#[test]
fn test_cpu_counter_reset_reports_zero_then_recovers() {
    let mut sampler = cpu_sampler();
    sampler.apply(reading(100, 50, 850));

    let reset = sampler.apply(reading(10, 5, 85));
    assert_eq!(reset.usage_percent, 0.0);

    // half busy relative to the post-reset baseline
    let snap = sampler.apply(reading(35, 30, 135));
    assert!(approx(snap.usage_percent, 50.0), "got {}", snap.usage_percent);
}

#[test]
fn test_cpu_idle_interval_reports_zero() {
    let mut sampler = cpu_sampler();
    sampler.apply(reading(100, 50, 850));
    let snap = sampler.apply(reading(100, 50, 850));
    assert_eq!(snap.usage_percent, 0.0);
    assert!(snap.usage_percent.is_finite());
}

// -------------------------------------------------------------------------
// Network
// -------------------------------------------------------------------------

#[test]
fn test_network_unchanged_counters_give_zero_rate() {
    let mut sampler = NetworkSampler::new("/nonexistent", "/nonexistent");
    let t0 = Instant::now();

    sampler.apply(vec![InterfaceReading::new("en0", 1000, 200)], t0);
    let snap = sampler.apply(
        vec![InterfaceReading::new("en0", 1000, 200)],
        t0 + Duration::from_secs(1),
    );

    let en0 = snap
        .interfaces
        .iter()
        .find(|i| i.name == "en0")
        .expect("en0 reported");
    assert_eq!(en0.rx_bytes_per_sec, 0.0);
    assert_eq!(en0.tx_bytes_per_sec, 0.0);
    assert!(en0.is_active);
}

#[test]
fn test_network_counter_reset_rebaselines() {
    let mut sampler = NetworkSampler::new("/nonexistent", "/nonexistent");
    let t0 = Instant::now();

    sampler.apply(vec![InterfaceReading::new("en0", 5000, 1000)], t0);
    let snap = sampler.apply(
        vec![InterfaceReading::new("en0", 50, 10)],
        t0 + Duration::from_secs(1),
    );

    assert_eq!(snap.rx_bytes_per_sec, 0.0);
    assert_eq!(snap.tx_bytes_per_sec, 0.0);
    assert_eq!(sampler.baseline("en0"), Some((50, 10)));

    let snap = sampler.apply(
        vec![InterfaceReading::new("en0", 1050, 210)],
        t0 + Duration::from_secs(3),
    );
    assert!(approx(snap.rx_bytes_per_sec, 500.0));
    assert!(approx(snap.tx_bytes_per_sec, 100.0));
}

#[test]
fn test_network_rate_over_one_second() {
    let mut sampler = NetworkSampler::new("/nonexistent", "/nonexistent");
    let t0 = Instant::now();

    sampler.apply(
        vec![
            InterfaceReading::new("en0", 1000, 200),
            InterfaceReading::new("wlan0", 0, 0),
        ],
        t0,
    );
    let snap = sampler.apply(
        vec![
            InterfaceReading::new("en0", 3000, 700),
            InterfaceReading::new("wlan0", 100, 0),
        ],
        t0 + Duration::from_secs(1),
    );

    assert!(approx(snap.rx_bytes_per_sec, 2100.0));
    assert!(approx(snap.tx_bytes_per_sec, 500.0));
    let names: Vec<&str> = snap.interfaces.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["en0", "wlan0"]);
}

#[test]
fn test_network_loopback_excluded() {
    let mut sampler = NetworkSampler::new("/nonexistent", "/nonexistent");
    let t0 = Instant::now();

    sampler.apply(vec![InterfaceReading::new("lo", 0, 0)], t0);
    let snap = sampler.apply(
        vec![InterfaceReading::new("lo", 1_000_000, 1_000_000)],
        t0 + Duration::from_secs(1),
    );
    assert!(snap.interfaces.is_empty());
    assert_eq!(snap.rx_bytes_per_sec, 0.0);
}

#[test]
fn test_network_vanished_interface_state_purged() {
    let mut sampler = NetworkSampler::new("/nonexistent", "/nonexistent");
    let t0 = Instant::now();

    sampler.apply(
        vec![
            InterfaceReading::new("en0", 1, 1),
            InterfaceReading::new("en1", 1, 1),
        ],
        t0,
    );
    assert_eq!(sampler.tracked_interfaces(), 2);

    sampler.apply(
        vec![InterfaceReading::new("en0", 2, 2)],
        t0 + Duration::from_secs(1),
    );
    assert_eq!(sampler.tracked_interfaces(), 1);
    assert_eq!(sampler.baseline("en1"), None);
}

// -------------------------------------------------------------------------
// Rate counter
// -------------------------------------------------------------------------

#[test]
fn test_rate_counter_never_negative() {
    let mut counter: RateCounter<&str> = RateCounter::new();
    let t0 = Instant::now();
    let values = [100u64, 50, 400, 0, 0, 250];

    for (i, value) in values.iter().enumerate() {
        let rate = counter.update("eth0", *value, t0 + Duration::from_millis(500 * i as u64));
        assert!(rate >= 0.0 && rate.is_finite(), "step {} gave {}", i, rate);
    }
}
