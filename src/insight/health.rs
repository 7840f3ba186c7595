use crate::model::{AlertLevel, Snapshot};

/// Local health score in `1..=10`, available with or without the AI service.
///
/// Starts at 10; CPU above 90 costs 4 (above 70 costs 2), memory above 90
/// costs 3 (above 80 costs 1), and each CRITICAL / WARNING alert costs 2 / 1.
pub fn fallback_health_score(snapshot: &Snapshot) -> u8 {
    let cpu = snapshot.dashboard.cpu_usage;
    let memory = snapshot.dashboard.memory_usage;
    let mut score: i64 = 10;

    if cpu > 90.0 {
        score -= 4;
    } else if cpu > 70.0 {
        score -= 2;
    }

    if memory > 90.0 {
        score -= 3;
    } else if memory > 80.0 {
        score -= 1;
    }

    score -= 2 * snapshot.count_alerts(AlertLevel::Critical) as i64;
    score -= snapshot.count_alerts(AlertLevel::Warning) as i64;

    score.clamp(1, 10) as u8
}
