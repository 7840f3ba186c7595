//! Alert classification, filtering and trends.
//!
//! Everything here is a pure function over alert lists; no state is kept
//! between snapshots.

mod feed;
mod thresholds;
mod trend;

pub use feed::*;
pub use thresholds::*;
pub use trend::*;

use crate::model::{AlertLevel, AlertRecord};

use serde::Serialize;
use std::str::FromStr;

/// Per-level counts for one alert list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlertSummary {
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
    pub total: usize,
}

impl AlertSummary {
    pub fn count(&self, level: AlertLevel) -> usize {
        match level {
            AlertLevel::Critical => self.critical,
            AlertLevel::Warning => self.warning,
            AlertLevel::Info => self.info,
        }
    }
}

/// Level selection for the active alert list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertFilter {
    All,
    Level(AlertLevel),
}

impl AlertFilter {
    pub fn matches(&self, alert: &AlertRecord) -> bool {
        match self {
            AlertFilter::All => true,
            AlertFilter::Level(level) => alert.level == *level,
        }
    }
}

impl FromStr for AlertFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            return Ok(AlertFilter::All);
        }
        s.parse().map(AlertFilter::Level)
    }
}

/// An alert list grouped by level.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedAlerts {
    pub counts: AlertSummary,
    pub alerts: Vec<AlertRecord>,
}

impl ClassifiedAlerts {
    pub fn filtered(&self, filter: AlertFilter) -> Vec<AlertRecord> {
        filter_alerts(&self.alerts, filter)
    }
}

pub fn summarize(alerts: &[AlertRecord]) -> AlertSummary {
    let mut summary = AlertSummary::default();
    for alert in alerts {
        match alert.level {
            AlertLevel::Critical => summary.critical += 1,
            AlertLevel::Warning => summary.warning += 1,
            AlertLevel::Info => summary.info += 1,
        }
        summary.total += 1;
    }
    summary
}

pub fn classify(alerts: &[AlertRecord]) -> ClassifiedAlerts {
    ClassifiedAlerts {
        counts: summarize(alerts),
        alerts: alerts.to_vec(),
    }
}

pub fn filter_alerts(alerts: &[AlertRecord], filter: AlertFilter) -> Vec<AlertRecord> {
    alerts.iter().filter(|a| filter.matches(a)).cloned().collect()
}
