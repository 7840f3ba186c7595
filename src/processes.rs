//! Process table search and ordering.

use crate::model::ProcessSample;
use crate::risk;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    #[serde(alias = "cpuUsage")]
    Cpu,
    #[serde(alias = "memoryUsage")]
    Memory,
    Name,
    Pid,
    #[serde(alias = "threadCount")]
    Threads,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProcessQuery {
    pub search: Option<String>,
    pub sort: SortKey,
    pub order: SortOrder,
    pub limit: Option<usize>,
}

/// A process row annotated with its local risk score.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRow {
    #[serde(flatten)]
    pub process: ProcessSample,
    pub risk_score: u8,
    pub high_risk: bool,
}

/// Case-insensitive name match, or substring match on the pid.
pub fn matches_search(process: &ProcessSample, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return true;
    }
    process.name.to_lowercase().contains(&term) || process.pid.to_string().contains(&term)
}

fn compare(a: &ProcessSample, b: &ProcessSample, key: SortKey) -> Ordering {
    match key {
        SortKey::Cpu => a.cpu_usage.total_cmp(&b.cpu_usage),
        SortKey::Memory => a.memory_usage.cmp(&b.memory_usage),
        SortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        SortKey::Pid => a.pid.cmp(&b.pid),
        SortKey::Threads => a.thread_count.cmp(&b.thread_count),
    }
}

pub fn query(processes: &[ProcessSample], q: &ProcessQuery) -> Vec<ProcessRow> {
    let mut selected: Vec<&ProcessSample> = processes
        .iter()
        .filter(|p| q.search.as_deref().map_or(true, |t| matches_search(p, t)))
        .collect();

    selected.sort_by(|a, b| {
        let ord = compare(a, b, q.sort);
        match q.order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });

    if let Some(limit) = q.limit {
        selected.truncate(limit);
    }

    selected
        .into_iter()
        .map(|p| {
            let score = risk::score(p);
            ProcessRow {
                process: p.clone(),
                risk_score: score,
                high_risk: risk::is_high_risk(score),
            }
        })
        .collect()
}
