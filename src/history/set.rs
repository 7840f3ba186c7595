//! Named collection of independent history buffers fed from snapshots.

use super::{HistoryBuffer, Sample};
use crate::model::Snapshot;

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Capacities used by the dashboard views.
pub const DASHBOARD_CAPACITY: usize = 20;
pub const PER_CORE_CAPACITY: usize = 10;
pub const NETWORK_CAPACITY: usize = 30;

/// Identifies one series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SeriesKey {
    Cpu,
    Memory,
    Core(usize),
    NetworkUpload,
    NetworkDownload,
}

impl SeriesKey {
    pub fn default_capacity(&self) -> usize {
        match self {
            SeriesKey::Cpu | SeriesKey::Memory => DASHBOARD_CAPACITY,
            SeriesKey::Core(_) => PER_CORE_CAPACITY,
            SeriesKey::NetworkUpload | SeriesKey::NetworkDownload => NETWORK_CAPACITY,
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesKey::Cpu => f.write_str("cpu"),
            SeriesKey::Memory => f.write_str("memory"),
            SeriesKey::Core(i) => write!(f, "core{}", i),
            SeriesKey::NetworkUpload => f.write_str("network-upload"),
            SeriesKey::NetworkDownload => f.write_str("network-download"),
        }
    }
}

impl FromStr for SeriesKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpu" => Ok(SeriesKey::Cpu),
            "memory" => Ok(SeriesKey::Memory),
            "network-upload" => Ok(SeriesKey::NetworkUpload),
            "network-download" => Ok(SeriesKey::NetworkDownload),
            other => other
                .strip_prefix("core")
                .and_then(|n| n.parse().ok())
                .map(SeriesKey::Core)
                .ok_or_else(|| format!("unknown series: {}", other)),
        }
    }
}

/// Buffers created lazily per key, each with its own capacity.
#[derive(Debug, Clone, Default)]
pub struct HistorySet {
    buffers: BTreeMap<SeriesKey, HistoryBuffer>,
}

impl HistorySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: SeriesKey, timestamp: DateTime<Utc>, value: f64) {
        self.buffers
            .entry(key)
            .or_insert_with(|| HistoryBuffer::new(key.default_capacity()))
            .push(timestamp, value);
    }

    /// Append one point per series from a snapshot. Per-core usage arrives
    /// as fractions and is stored as percent; network speeds are summed over
    /// all interfaces.
    pub fn record(&mut self, snapshot: &Snapshot, timestamp: DateTime<Utc>) {
        self.push(SeriesKey::Cpu, timestamp, snapshot.dashboard.cpu_usage);
        self.push(SeriesKey::Memory, timestamp, snapshot.dashboard.memory_usage);

        for (i, usage) in snapshot.cpu.per_core_usage.iter().enumerate() {
            self.push(SeriesKey::Core(i), timestamp, usage * 100.0);
        }

        if !snapshot.networks.is_empty() {
            let upload = snapshot
                .networks
                .iter()
                .fold(0u64, |acc, n| acc.saturating_add(n.upload_speed));
            let download = snapshot
                .networks
                .iter()
                .fold(0u64, |acc, n| acc.saturating_add(n.download_speed));
            self.push(SeriesKey::NetworkUpload, timestamp, upload as f64);
            self.push(SeriesKey::NetworkDownload, timestamp, download as f64);
        }
    }

    pub fn get(&self, key: SeriesKey) -> Option<&HistoryBuffer> {
        self.buffers.get(&key)
    }

    pub fn snapshot(&self, key: SeriesKey) -> Vec<Sample> {
        self.buffers
            .get(&key)
            .map(|b| b.snapshot())
            .unwrap_or_default()
    }

    pub fn keys(&self) -> Vec<SeriesKey> {
        self.buffers.keys().copied().collect()
    }

    pub fn clear(&mut self) {
        self.buffers.values_mut().for_each(HistoryBuffer::clear);
    }
}
