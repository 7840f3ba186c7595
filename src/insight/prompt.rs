//! Deterministic prompt construction.

use crate::format::{format_bytes, format_load};
use crate::model::{ProcessSample, Snapshot};
use crate::risk;

use std::fmt::Write;

const MAX_NAME_LEN: usize = 30;
const TOP_PROCESSES: usize = 3;

/// Names longer than 30 characters are cut to 27 plus `...`.
pub fn truncate_name(name: &str) -> String {
    if name.chars().count() > MAX_NAME_LEN {
        let head: String = name.chars().take(MAX_NAME_LEN - 3).collect();
        format!("{}...", head)
    } else {
        name.to_string()
    }
}

fn or_unknown(s: &str) -> &str {
    if s.is_empty() {
        "Unknown"
    } else {
        s
    }
}

pub fn system_prompt(snapshot: &Snapshot) -> String {
    let d = &snapshot.dashboard;
    let mut out = String::new();

    let loads = if snapshot.cpu.load_averages.is_empty() {
        "N/A".to_string()
    } else {
        snapshot
            .cpu
            .load_averages
            .iter()
            .map(|l| format_load(*l))
            .collect::<Vec<_>>()
            .join(", ")
    };

    // Writing to a String cannot fail.
    let _ = writeln!(out, "You are an expert system administrator analyzing server metrics in real-time.");
    let _ = writeln!(out);
    let _ = writeln!(out, "CURRENT SYSTEM METRICS:");
    let _ = writeln!(out);
    let _ = writeln!(out, "1. CPU: {:.1}% usage", d.cpu_usage);
    let _ = writeln!(
        out,
        "   - Cores: {} logical, {} physical",
        snapshot.cpu.logical_cores, snapshot.cpu.physical_cores
    );
    let _ = writeln!(out, "   - Load averages: {}", loads);
    let _ = writeln!(out);
    let _ = writeln!(out, "2. MEMORY: {:.1}% used", d.memory_usage);
    let _ = writeln!(out, "   - Total: {}", format_bytes(snapshot.memory.total));
    let _ = writeln!(out, "   - Available: {}", format_bytes(snapshot.memory.available));
    let _ = writeln!(out);

    let _ = writeln!(out, "3. DISKS: {} disks", snapshot.disks.len());
    if snapshot.disks.is_empty() {
        let _ = writeln!(out, "No disk data");
    }
    for disk in &snapshot.disks {
        let _ = writeln!(out, "- {}: {:.1}% used", or_unknown(&disk.name), disk.usage_percentage);
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "4. PROCESSES: {} top processes", snapshot.processes.len());
    if snapshot.processes.is_empty() {
        let _ = writeln!(out, "No process data");
    }
    for p in snapshot.processes.iter().take(TOP_PROCESSES) {
        let _ = writeln!(
            out,
            "- {}: {:.1}% CPU",
            truncate_name(or_unknown(&p.name)),
            p.cpu_usage
        );
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "5. ALERTS: {} active alerts", snapshot.alerts.len());
    if snapshot.alerts.is_empty() {
        let _ = writeln!(out, "No active alerts");
    }
    for a in &snapshot.alerts {
        let _ = writeln!(out, "- {}: {}", or_unknown(&a.alert_type), a.message);
    }
    let _ = writeln!(out);

    let status = if d.status.is_empty() { "UNKNOWN" } else { &d.status };
    let _ = writeln!(out, "6. SYSTEM STATUS: {}", status);
    out.push_str(SYSTEM_REQUEST);
    out
}

const SYSTEM_REQUEST: &str = r#"
ANALYSIS REQUEST:
1. Provide 3-5 key insights about system health
2. Identify potential bottlenecks or issues
3. Suggest optimization recommendations
4. Predict potential problems in next 1 hour
5. Rate system health from 1-10 (10 = perfect)

Format response as JSON:
{
  "healthScore": number (1-10),
  "insights": ["insight1", "insight2", ...],
  "recommendations": ["rec1", "rec2", ...],
  "predictions": ["prediction1", "prediction2", ...],
  "bottlenecks": ["bottleneck1", "bottleneck2", ...],
  "summary": "one line summary"
}

Be concise, technical, and actionable. Focus on critical issues first.
"#;

pub fn process_prompt(process: &ProcessSample, snapshot: &Snapshot) -> String {
    let mut out = String::new();
    let state = if process.state.is_empty() { "UNKNOWN" } else { &process.state };

    let _ = writeln!(out, "You are an expert in process behaviour analysis. Predict problems for this process.");
    let _ = writeln!(out);
    let _ = writeln!(out, "PROCESS:");
    let _ = writeln!(out, "- PID: {}", process.pid);
    let _ = writeln!(out, "- Name: {}", truncate_name(or_unknown(&process.name)));
    let _ = writeln!(out, "- CPU: {:.1}%", process.cpu_usage);
    let _ = writeln!(out, "- Memory: {}", format_bytes(process.memory_usage));
    let _ = writeln!(out, "- Threads: {}", process.thread_count);
    let _ = writeln!(out, "- State: {}", state);
    let _ = writeln!(out, "- Local risk score: {}/100", risk::score(process));
    let _ = writeln!(out);
    let _ = writeln!(out, "HOST CONTEXT:");
    let _ = writeln!(out, "- CPU: {:.1}% usage", snapshot.dashboard.cpu_usage);
    let _ = writeln!(out, "- Memory: {:.1}% used", snapshot.dashboard.memory_usage);
    let _ = writeln!(out, "- Active alerts: {}", snapshot.alerts.len());
    out.push_str(PROCESS_REQUEST);
    out
}

const PROCESS_REQUEST: &str = r#"
Respond with a JSON array of predictions:
[
  {
    "type": "CPU_SPIKE | MEMORY_LEAK | THREAD_EXPLOSION | STATE_ANOMALY | RESOURCE_EXHAUSTION",
    "confidence": number (0-100),
    "message": "what is likely to happen",
    "severity": "low | medium | high",
    "predictionTimeframe": "e.g. 30 minutes",
    "suggestedAction": "what to do",
    "probabilityFactors": ["factor1", "factor2"]
  }
]
"#;
