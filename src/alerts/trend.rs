//! Hourly alert activity and trend statistics.

use crate::model::{AlertLevel, AlertRecord};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;

/// Buckets compared on each side of the trend.
pub const TREND_WINDOW: usize = 6;
pub const DEFAULT_TREND_HOURS: usize = 24;

/// Percent change of the mean of the last six buckets against the mean of
/// the six before them, rounded to one decimal.
///
/// Each mean is taken over the buckets that actually exist in its half. A
/// zero (or missing) baseline yields `0.0` rather than a division by zero.
pub fn trend(buckets: &[f64]) -> f64 {
    let recent_start = buckets.len().saturating_sub(TREND_WINDOW);
    let previous_start = recent_start.saturating_sub(TREND_WINDOW);

    let recent = mean(&buckets[recent_start..]);
    let previous = mean(&buckets[previous_start..recent_start]);

    if previous == 0.0 {
        return 0.0;
    }
    round_to(((recent - previous) / previous) * 100.0, 1)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sum: f64 = values.iter().filter(|v| v.is_finite()).sum();
    sum / values.len() as f64
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Alert counts for one clock hour.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyBucket {
    pub hour_start: DateTime<Utc>,
    pub critical: u32,
    pub warning: u32,
    pub info: u32,
    pub total: u32,
}

impl HourlyBucket {
    fn empty(hour_start: DateTime<Utc>) -> Self {
        Self {
            hour_start,
            critical: 0,
            warning: 0,
            info: 0,
            total: 0,
        }
    }
}

/// Truncate a datetime to the start of its UTC hour.
pub fn truncate_to_hour(dt: DateTime<Utc>) -> DateTime<Utc> {
    let ts = dt.timestamp();
    let truncated = ts - ts.rem_euclid(3600);
    DateTime::from_timestamp(truncated, 0).unwrap_or(dt)
}

/// Group alerts into the last `hours` clock hours ending with the current
/// one, oldest first. Alerts outside the window are ignored.
pub fn hourly_buckets(alerts: &[AlertRecord], now: DateTime<Utc>, hours: usize) -> Vec<HourlyBucket> {
    let current = truncate_to_hour(now);
    let mut buckets: Vec<HourlyBucket> = (0..hours)
        .rev()
        .map(|i| HourlyBucket::empty(current - ChronoDuration::hours(i as i64)))
        .collect();

    let first = match buckets.first() {
        Some(b) => b.hour_start,
        None => return buckets,
    };

    for alert in alerts {
        let hour = truncate_to_hour(alert.timestamp);
        if hour < first || hour > current {
            continue;
        }
        let idx = (hour - first).num_hours() as usize;
        if let Some(bucket) = buckets.get_mut(idx) {
            match alert.level {
                AlertLevel::Critical => bucket.critical += 1,
                AlertLevel::Warning => bucket.warning += 1,
                AlertLevel::Info => bucket.info += 1,
            }
            bucket.total += 1;
        }
    }

    buckets
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendStats {
    pub trend: f64,
    pub avg_per_hour: f64,
    pub peak_hour: Option<DateTime<Utc>>,
    pub peak_count: u32,
}

pub fn trend_stats(buckets: &[HourlyBucket]) -> TrendStats {
    let totals: Vec<f64> = buckets.iter().map(|b| b.total as f64).collect();
    if totals.iter().all(|t| *t == 0.0) {
        return TrendStats {
            trend: 0.0,
            avg_per_hour: 0.0,
            peak_hour: None,
            peak_count: 0,
        };
    }

    // First bucket wins ties.
    let peak = buckets
        .iter()
        .fold(None::<&HourlyBucket>, |best, b| match best {
            Some(p) if p.total >= b.total => Some(p),
            _ => Some(b),
        });

    TrendStats {
        trend: trend(&totals),
        avg_per_hour: round_to(mean(&totals), 2),
        peak_hour: peak.map(|b| b.hour_start),
        peak_count: peak.map(|b| b.total).unwrap_or(0),
    }
}
