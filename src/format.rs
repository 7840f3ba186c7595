//! Human-readable rendering helpers shared by prompts and the HTTP surface.

use chrono::{DateTime, Utc};

const BYTE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Binary-scaled size with one decimal, e.g. `1.5 GB`. Values below one
/// KB stay whole: `512 B`.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < BYTE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, BYTE_UNITS[unit])
}

/// Load average with one decimal, or `N/A` where the platform reports a
/// negative value.
pub fn format_load(load: f64) -> String {
    if load < 0.0 || !load.is_finite() {
        "N/A".to_string()
    } else {
        format!("{:.1}", load)
    }
}

fn age_text(since: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - since).num_seconds().max(0);
    if seconds < 5 {
        return "Just now".to_string();
    }
    if seconds < 60 {
        return format!("{} seconds ago", seconds);
    }
    let minutes = seconds / 60;
    format!("{} minute{} ago", minutes, if minutes == 1 { "" } else { "s" })
}

pub fn update_age_text(last_update: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match last_update {
        Some(t) => age_text(t, now),
        None => "Never updated".to_string(),
    }
}

pub fn analysis_age_text(last_analysis: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match last_analysis {
        Some(t) => age_text(t, now),
        None => "Never analyzed".to_string(),
    }
}
