//! Local threshold crossings, mirroring the levels the backend alerts on.

use crate::model::{AlertLevel, AlertRecord, Snapshot};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds {
    pub cpu_critical: f64,
    pub cpu_warning: f64,
    pub memory_critical: f64,
    pub memory_warning: f64,
    pub temperature_critical: f64,
    pub temperature_warning: f64,
    pub disk_critical: f64,
    pub disk_warning: f64,
    pub process_count_warning: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpu_critical: 90.0,
            cpu_warning: 70.0,
            memory_critical: 90.0,
            memory_warning: 80.0,
            temperature_critical: 80.0,
            temperature_warning: 70.0,
            disk_critical: 95.0,
            disk_warning: 90.0,
            process_count_warning: 300,
        }
    }
}

/// Host health as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HealthStatus::Healthy => "HEALTHY",
            HealthStatus::Warning => "WARNING",
            HealthStatus::Critical => "CRITICAL",
        })
    }
}

pub fn overall_status(cpu: f64, memory: f64, thresholds: &Thresholds) -> HealthStatus {
    if cpu >= thresholds.cpu_critical || memory >= thresholds.memory_critical {
        HealthStatus::Critical
    } else if cpu >= thresholds.cpu_warning || memory >= thresholds.memory_warning {
        HealthStatus::Warning
    } else {
        HealthStatus::Healthy
    }
}

fn record(
    alert_type: &str,
    level: AlertLevel,
    message: String,
    value: f64,
    threshold: f64,
    now: DateTime<Utc>,
) -> AlertRecord {
    AlertRecord {
        alert_type: alert_type.to_string(),
        level,
        message,
        value,
        threshold,
        timestamp: now,
    }
}

/// Alerts implied by a snapshot's values. Critical is checked before
/// warning so each metric yields at most one record (one per disk).
pub fn derive_alerts(snapshot: &Snapshot, thresholds: &Thresholds, now: DateTime<Utc>) -> Vec<AlertRecord> {
    let mut alerts = Vec::new();
    let t = thresholds;

    let cpu = snapshot.dashboard.cpu_usage;
    if cpu >= t.cpu_critical {
        alerts.push(record(
            "CPU",
            AlertLevel::Critical,
            format!("CPU usage critical: {:.1}%", cpu),
            cpu,
            t.cpu_critical,
            now,
        ));
    } else if cpu >= t.cpu_warning {
        alerts.push(record(
            "CPU",
            AlertLevel::Warning,
            format!("CPU usage high: {:.1}%", cpu),
            cpu,
            t.cpu_warning,
            now,
        ));
    }

    let memory = snapshot.dashboard.memory_usage;
    if memory >= t.memory_critical {
        alerts.push(record(
            "MEMORY",
            AlertLevel::Critical,
            format!("Memory usage critical: {:.1}%", memory),
            memory,
            t.memory_critical,
            now,
        ));
    } else if memory >= t.memory_warning {
        alerts.push(record(
            "MEMORY",
            AlertLevel::Warning,
            format!("Memory usage high: {:.1}%", memory),
            memory,
            t.memory_warning,
            now,
        ));
    }

    // A zero reading means the sensor is unavailable.
    let temp = snapshot.dashboard.cpu_temperature;
    if temp >= t.temperature_critical {
        alerts.push(record(
            "TEMPERATURE",
            AlertLevel::Critical,
            format!("CPU temperature critical: {:.1}°C", temp),
            temp,
            t.temperature_critical,
            now,
        ));
    } else if temp >= t.temperature_warning && temp > 0.0 {
        alerts.push(record(
            "TEMPERATURE",
            AlertLevel::Warning,
            format!("CPU temperature high: {:.1}°C", temp),
            temp,
            t.temperature_warning,
            now,
        ));
    }

    for disk in &snapshot.disks {
        let usage = disk.usage_percentage;
        if usage >= t.disk_critical {
            alerts.push(record(
                "DISK",
                AlertLevel::Critical,
                format!("Disk {} critical: {:.1}% full", disk.name, usage),
                usage,
                t.disk_critical,
                now,
            ));
        } else if usage >= t.disk_warning {
            alerts.push(record(
                "DISK",
                AlertLevel::Warning,
                format!("Disk {} almost full: {:.1}% full", disk.name, usage),
                usage,
                t.disk_warning,
                now,
            ));
        }
    }

    let count = snapshot.dashboard.running_processes;
    if count > t.process_count_warning {
        alerts.push(record(
            "PROCESSES",
            AlertLevel::Warning,
            format!("High process count: {}", count),
            count as f64,
            t.process_count_warning as f64,
            now,
        ));
    }

    alerts
}
