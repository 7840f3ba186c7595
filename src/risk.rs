//! Additive per-process risk score.
//!
//! Each rule contributes independently and the sum is clamped to 100:
//!
//! | rule                         | points |
//! |------------------------------|--------|
//! | cpu > 70 %                   | +40    |
//! | cpu > 40 %                   | +20    |
//! | resident memory > 1 GiB      | +30    |
//! | more than 50 threads         | +10    |
//! | state other than `RUNNING`   | +20    |
//!
//! The two CPU rules stack, so a process above 70 % scores 60 from CPU alone.

use crate::model::{ProcessSample, Snapshot};

use serde::Serialize;

pub const HIGH_RISK_THRESHOLD: u8 = 60;

const GIB: u64 = 1 << 30;
const BATCH_MEMORY_BYTES: u64 = 500_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessRiskScore {
    pub pid: u32,
    pub score: u8,
}

pub fn score(process: &ProcessSample) -> u8 {
    let mut total: u32 = 0;
    if process.cpu_usage > 70.0 {
        total += 40;
    }
    if process.cpu_usage > 40.0 {
        total += 20;
    }
    if process.memory_usage > GIB {
        total += 30;
    }
    if process.thread_count > 50 {
        total += 10;
    }
    if !process.state.eq_ignore_ascii_case("RUNNING") {
        total += 20;
    }
    total.min(100) as u8
}

pub fn is_high_risk(score: u8) -> bool {
    score > HIGH_RISK_THRESHOLD
}

/// Whether a process is worth sending to the AI in a batch run.
pub fn qualifies_for_batch(process: &ProcessSample) -> bool {
    process.cpu_usage > 40.0 || process.memory_usage > BATCH_MEMORY_BYTES
}

pub fn score_all(snapshot: &Snapshot) -> Vec<ProcessRiskScore> {
    snapshot
        .processes
        .iter()
        .map(|p| ProcessRiskScore {
            pid: p.pid,
            score: score(p),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(cpu: f64, memory: u64, threads: u32) -> ProcessSample {
        ProcessSample {
            pid: 1,
            name: "proc".to_string(),
            cpu_usage: cpu,
            memory_usage: memory,
            thread_count: threads,
            state: "RUNNING".to_string(),
        }
    }

    #[test]
    fn test_cpu_rules_stack() {
        assert_eq!(score(&running(80.0, 0, 1)), 60);
        assert_eq!(score(&running(50.0, 0, 1)), 20);
        assert_eq!(score(&running(40.0, 0, 1)), 0);
    }

    #[test]
    fn test_memory_rule() {
        assert_eq!(score(&running(0.0, 2_000_000_000, 1)), 30);
        assert_eq!(score(&running(0.0, GIB, 1)), 0);
    }

    #[test]
    fn test_state_is_case_insensitive() {
        let mut p = running(0.0, 0, 1);
        p.state = "running".to_string();
        assert_eq!(score(&p), 0);
        p.state = "SLEEPING".to_string();
        assert_eq!(score(&p), 20);
        p.state = String::new();
        assert_eq!(score(&p), 20);
    }

    #[test]
    fn test_worst_case_clamps() {
        let mut p = running(99.0, 8 * GIB, 500);
        p.state = "ZOMBIE".to_string();
        assert_eq!(score(&p), 100);
        assert!(is_high_risk(score(&p)));
        assert!(!is_high_risk(60));
    }

    #[test]
    fn test_batch_qualification() {
        assert!(qualifies_for_batch(&running(41.0, 0, 1)));
        assert!(qualifies_for_batch(&running(0.0, 500_000_001, 1)));
        assert!(!qualifies_for_batch(&running(40.0, 500_000_000, 1)));
    }

    #[test]
    fn test_score_all_keeps_order() {
        let mut s = Snapshot::default();
        s.processes = vec![running(80.0, 0, 1), running(0.0, 0, 1)];
        s.processes[1].pid = 2;
        assert_eq!(
            score_all(&s),
            vec![
                ProcessRiskScore { pid: 1, score: 60 },
                ProcessRiskScore { pid: 2, score: 0 }
            ]
        );
    }
}
