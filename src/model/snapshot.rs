//! Metrics snapshot types as delivered by the monitoring backend.

use super::lenient::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One polled metrics reading. Immutable once received.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Snapshot {
    /// Poll count at the time the scheduler accepted this snapshot.
    pub sequence: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub dashboard: Dashboard,
    #[serde(deserialize_with = "null_as_default")]
    pub cpu: CpuDetails,
    #[serde(deserialize_with = "null_as_default")]
    pub memory: MemoryDetails,
    #[serde(deserialize_with = "null_as_default")]
    pub disks: Vec<Disk>,
    #[serde(deserialize_with = "null_as_default")]
    pub networks: Vec<Network>,
    #[serde(deserialize_with = "null_as_default")]
    pub processes: Vec<ProcessSample>,
    #[serde(deserialize_with = "null_as_default")]
    pub alerts: Vec<AlertRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_info: Option<SystemInfo>,
}

impl Snapshot {
    /// Decode a snapshot from a raw response body.
    pub fn from_json(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    pub fn process(&self, pid: u32) -> Option<&ProcessSample> {
        self.processes.iter().find(|p| p.pid == pid)
    }

    pub fn count_alerts(&self, level: AlertLevel) -> usize {
        self.alerts.iter().filter(|a| a.level == level).count()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Dashboard {
    #[serde(deserialize_with = "string_or_empty")]
    pub status: String,
    #[serde(deserialize_with = "f64_or_zero")]
    pub cpu_usage: f64,
    #[serde(deserialize_with = "f64_or_zero")]
    pub memory_usage: f64,
    #[serde(deserialize_with = "f64_or_zero")]
    pub cpu_temperature: f64,
    #[serde(alias = "uptime", deserialize_with = "string_or_empty")]
    pub system_uptime: String,
    #[serde(deserialize_with = "u64_or_zero")]
    pub running_processes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CpuDetails {
    #[serde(deserialize_with = "string_or_empty")]
    pub name: String,
    #[serde(deserialize_with = "u32_or_zero")]
    pub physical_cores: u32,
    #[serde(deserialize_with = "u32_or_zero")]
    pub logical_cores: u32,
    /// Per-core load as fractions in `0.0..=1.0`.
    #[serde(deserialize_with = "f64_list")]
    pub per_core_usage: Vec<f64>,
    /// Negative entries mean "not available on this platform".
    #[serde(deserialize_with = "f64_list")]
    pub load_averages: Vec<f64>,
    #[serde(deserialize_with = "string_or_empty")]
    pub current_frequency: String,
    #[serde(deserialize_with = "string_or_empty")]
    pub max_frequency: String,
    #[serde(deserialize_with = "null_as_default")]
    pub cpu_ticks: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemoryDetails {
    #[serde(deserialize_with = "u64_or_zero")]
    pub total: u64,
    #[serde(deserialize_with = "u64_or_zero")]
    pub used: u64,
    #[serde(deserialize_with = "u64_or_zero")]
    pub available: u64,
    #[serde(deserialize_with = "u64_or_zero")]
    pub cached: u64,
    #[serde(deserialize_with = "f64_or_zero")]
    pub usage_percentage: f64,
    #[serde(deserialize_with = "u64_or_zero")]
    pub swap_total: u64,
    #[serde(deserialize_with = "u64_or_zero")]
    pub swap_used: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Disk {
    #[serde(deserialize_with = "string_or_empty")]
    pub name: String,
    #[serde(alias = "mount", deserialize_with = "string_or_empty")]
    pub mount_point: String,
    #[serde(rename = "type", deserialize_with = "string_or_empty")]
    pub fs_type: String,
    #[serde(alias = "total", deserialize_with = "u64_or_zero")]
    pub total_space: u64,
    #[serde(alias = "used", deserialize_with = "u64_or_zero")]
    pub used_space: u64,
    #[serde(alias = "free", deserialize_with = "u64_or_zero")]
    pub free_space: u64,
    #[serde(deserialize_with = "f64_or_zero")]
    pub usage_percentage: f64,
    #[serde(deserialize_with = "string_or_empty")]
    pub status: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Network {
    #[serde(deserialize_with = "string_or_empty")]
    pub name: String,
    #[serde(deserialize_with = "string_or_empty")]
    pub display_name: String,
    #[serde(deserialize_with = "u64_or_zero")]
    pub bytes_sent: u64,
    #[serde(deserialize_with = "u64_or_zero")]
    pub bytes_received: u64,
    #[serde(deserialize_with = "u64_or_zero")]
    pub upload_speed: u64,
    #[serde(deserialize_with = "u64_or_zero")]
    pub download_speed: u64,
}

/// A single process row from the backend's process table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessSample {
    #[serde(deserialize_with = "u32_or_zero")]
    pub pid: u32,
    #[serde(deserialize_with = "string_or_empty")]
    pub name: String,
    /// Percent of one CPU.
    #[serde(deserialize_with = "f64_or_zero")]
    pub cpu_usage: f64,
    /// Resident set size in bytes.
    #[serde(deserialize_with = "u64_or_zero")]
    pub memory_usage: u64,
    #[serde(deserialize_with = "u32_or_zero")]
    pub thread_count: u32,
    #[serde(deserialize_with = "string_or_empty")]
    pub state: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemInfo {
    #[serde(deserialize_with = "optional_datetime")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "string_or_empty")]
    pub os_name: String,
    #[serde(deserialize_with = "string_or_empty")]
    pub os_version: String,
    #[serde(deserialize_with = "string_or_empty")]
    pub os_manufacturer: String,
    #[serde(deserialize_with = "string_or_empty")]
    pub system_manufacturer: String,
    #[serde(deserialize_with = "string_or_empty")]
    pub system_model: String,
}

/// Canonical alert severity tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertLevel {
    Critical,
    Warning,
    Info,
}

impl AlertLevel {
    pub const ALL: [AlertLevel; 3] = [AlertLevel::Critical, AlertLevel::Warning, AlertLevel::Info];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Critical => "CRITICAL",
            AlertLevel::Warning => "WARNING",
            AlertLevel::Info => "INFO",
        }
    }

    /// Unrecognised levels are treated as informational.
    pub fn normalize(raw: &str) -> Self {
        raw.parse().unwrap_or(AlertLevel::Info)
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CRITICAL" => Ok(AlertLevel::Critical),
            "WARNING" => Ok(AlertLevel::Warning),
            "INFO" => Ok(AlertLevel::Info),
            other => Err(format!("unknown alert level: {}", other)),
        }
    }
}

impl<'de> Deserialize<'de> for AlertLevel {
    fn deserialize<D>(d: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = string_or_empty(d)?;
        Ok(AlertLevel::normalize(&raw))
    }
}

/// A backend-supplied or locally derived alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlertRecord {
    #[serde(rename = "type", deserialize_with = "string_or_empty")]
    pub alert_type: String,
    pub level: AlertLevel,
    #[serde(deserialize_with = "string_or_empty")]
    pub message: String,
    #[serde(deserialize_with = "f64_or_zero")]
    pub value: f64,
    #[serde(deserialize_with = "f64_or_zero")]
    pub threshold: f64,
    #[serde(deserialize_with = "datetime_or_now")]
    pub timestamp: DateTime<Utc>,
}

impl Default for AlertRecord {
    fn default() -> Self {
        Self {
            alert_type: String::new(),
            level: AlertLevel::Info,
            message: String::new(),
            value: 0.0,
            threshold: 0.0,
            timestamp: Utc::now(),
        }
    }
}
