//! Network interface throughput from /proc/net/dev.
//!
//! Interface kinds and link state come from /sys/class/net. Byte counters
//! are converted into rates through per-interface [`RateCounter`]s.

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;

use crate::collectors::Sampler;
use crate::error::SampleResult;
use crate::rate::RateCounter;
use crate::snapshot::{InterfaceSnapshot, NetworkSnapshot};
use crate::system::{self, read_attr, read_attr_u64};

// ARPHRD_* link types from <linux/if_arp.h>
const ARPHRD_LOOPBACK: u64 = 772;
const ARPHRD_TUNNEL: u64 = 768;
const ARPHRD_TUNNEL6: u64 = 769;
const ARPHRD_SIT: u64 = 776;
const ARPHRD_IPGRE: u64 = 778;
const ARPHRD_NONE: u64 = 65534;

/// Link category relevant for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceKind {
    Physical,
    Loopback,
    Tunnel,
}

impl InterfaceKind {
    pub fn from_arphrd(link_type: u64) -> Self {
        match link_type {
            ARPHRD_LOOPBACK => InterfaceKind::Loopback,
            ARPHRD_TUNNEL | ARPHRD_TUNNEL6 | ARPHRD_SIT | ARPHRD_IPGRE | ARPHRD_NONE => {
                InterfaceKind::Tunnel
            }
            _ => InterfaceKind::Physical,
        }
    }
}

/// One row of /proc/net/dev enriched with sysfs attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceReading {
    pub name: String,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub kind: InterfaceKind,
    pub is_up: bool,
}

impl InterfaceReading {
    pub fn new(name: &str, rx_bytes: u64, tx_bytes: u64) -> Self {
        Self {
            name: name.to_string(),
            rx_bytes,
            tx_bytes,
            kind: if name == "lo" {
                InterfaceKind::Loopback
            } else {
                InterfaceKind::Physical
            },
            is_up: true,
        }
    }
}

/// Parses the byte counters of /proc/net/dev as `(name, rx, tx)`.
pub fn parse_netdev(content: &str) -> Vec<(String, u64, u64)> {
    let mut rows = Vec::new();

    for line in content.lines().skip(2) {
        let Some((name, stats)) = line.split_once(':') else {
            continue;
        };
        let values: Vec<&str> = stats.split_whitespace().collect();
        if values.len() < 16 {
            continue; // Skip malformed lines
        }
        rows.push((
            name.trim().to_string(),
            values[0].parse().unwrap_or(0),
            values[8].parse().unwrap_or(0),
        ));
    }

    rows
}

/// Logical interface name: VLAN parents (`@`) and aliases (`:`) are folded.
pub fn logical_name(name: &str) -> &str {
    let name = name.split('@').next().unwrap_or(name);
    name.split(':').next().unwrap_or(name)
}

/// Whether an interface is shown: never loopback, tunnels only while up and
/// carrying traffic.
pub fn is_interface_of_interest(reading: &InterfaceReading) -> bool {
    match reading.kind {
        InterfaceKind::Loopback => false,
        InterfaceKind::Tunnel => reading.is_up && (reading.rx_bytes > 0 || reading.tx_bytes > 0),
        InterfaceKind::Physical => true,
    }
}

fn read_interfaces(proc_root: &Path, sys_root: &Path) -> SampleResult<Vec<InterfaceReading>> {
    let content = system::read_file(&proc_root.join("net").join("dev"))?;
    let class = sys_root.join("class").join("net");

    Ok(parse_netdev(&content)
        .into_iter()
        .map(|(name, rx_bytes, tx_bytes)| {
            let dir = class.join(&name);
            let kind = match read_attr_u64(&dir.join("type")) {
                Some(t) => InterfaceKind::from_arphrd(t),
                None if name == "lo" => InterfaceKind::Loopback,
                None => InterfaceKind::Physical,
            };
            // "unknown" is reported by many virtual devices that still pass traffic
            let is_up = read_attr(&dir.join("operstate"))
                .map(|s| s != "down" && s != "notpresent")
                .unwrap_or(true);
            InterfaceReading {
                name,
                rx_bytes,
                tx_bytes,
                kind,
                is_up,
            }
        })
        .collect())
}

/// Stateful per-interface throughput sampler.
pub struct NetworkSampler {
    proc_root: PathBuf,
    sys_root: PathBuf,
    rx: RateCounter<String>,
    tx: RateCounter<String>,
}

impl NetworkSampler {
    pub fn new(proc_root: impl Into<PathBuf>, sys_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
            sys_root: sys_root.into(),
            rx: RateCounter::new(),
            tx: RateCounter::new(),
        }
    }

    /// Stored `(rx, tx)` baseline for an interface.
    pub fn baseline(&self, name: &str) -> Option<(u64, u64)> {
        let key = name.to_string();
        Some((self.rx.baseline(&key)?.value, self.tx.baseline(&key)?.value))
    }

    /// Number of interfaces with stored rate state.
    pub fn tracked_interfaces(&self) -> usize {
        self.rx.len()
    }

    /// Folds one set of readings taken at `at` into a snapshot.
    pub fn apply(&mut self, readings: Vec<InterfaceReading>, at: Instant) -> NetworkSnapshot {
        let mut merged: HashMap<String, (u64, u64)> = HashMap::new();
        for reading in readings.iter().filter(|r| is_interface_of_interest(r)) {
            let entry = merged
                .entry(logical_name(&reading.name).to_string())
                .or_insert((0, 0));
            entry.0 = entry.0.saturating_add(reading.rx_bytes);
            entry.1 = entry.1.saturating_add(reading.tx_bytes);
        }

        let mut interfaces: Vec<InterfaceSnapshot> = merged
            .into_iter()
            .map(|(name, (rx_bytes, tx_bytes))| {
                let rx_bytes_per_sec = self.rx.update(name.clone(), rx_bytes, at);
                let tx_bytes_per_sec = self.tx.update(name.clone(), tx_bytes, at);
                InterfaceSnapshot {
                    is_active: rx_bytes_per_sec > 0.0
                        || tx_bytes_per_sec > 0.0
                        || rx_bytes > 0
                        || tx_bytes > 0,
                    name,
                    rx_bytes,
                    tx_bytes,
                    rx_bytes_per_sec,
                    tx_bytes_per_sec,
                }
            })
            .collect();
        interfaces.sort_by(|a, b| a.name.cmp(&b.name));

        let live: HashSet<String> = interfaces.iter().map(|i| i.name.clone()).collect();
        let purged = self.rx.retain_keys(&live);
        self.tx.retain_keys(&live);
        if purged > 0 {
            debug!("Purged rate state for {} vanished interfaces", purged);
        }

        NetworkSnapshot {
            captured_at: Utc::now(),
            rx_bytes_per_sec: interfaces.iter().map(|i| i.rx_bytes_per_sec).sum(),
            tx_bytes_per_sec: interfaces.iter().map(|i| i.tx_bytes_per_sec).sum(),
            interfaces,
        }
    }
}

impl Sampler for NetworkSampler {
    type Output = NetworkSnapshot;

    fn sample(&mut self) -> SampleResult<NetworkSnapshot> {
        let readings = read_interfaces(&self.proc_root, &self.sys_root)?;
        let snapshot = self.apply(readings, Instant::now());
        debug!(
            "Network sample: {} interfaces, rx {:.0} B/s, tx {:.0} B/s",
            snapshot.interfaces.len(),
            snapshot.rx_bytes_per_sec,
            snapshot.tx_bytes_per_sec
        );
        Ok(snapshot)
    }
}
