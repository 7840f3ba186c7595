//! Turns untrusted completion text into typed records.
//!
//! Every response lands in exactly one [`Parsed`] branch and every branch
//! produces a value; nothing in here returns an error or panics on input.

use crate::model::{
    value_to_f64, InsightOutcome, InsightRecord, PredictionType, ProcessPrediction, ProcessSample,
    Severity,
};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::{Map, Value};
use std::ops::Range;
use std::sync::OnceLock;
use tracing::{debug, warn};

pub const DEFAULT_CONFIDENCE: u8 = 50;
pub const DEFAULT_TIMEFRAME: &str = "30 minutes";
pub const DEFAULT_ACTION: &str = "Monitor closely";

const EXCERPT_CHARS: usize = 200;
const CPU_KEYWORD_CONFIDENCE: u8 = 60;
const MEMORY_KEYWORD_CONFIDENCE: u8 = 55;
const NEUTRAL_CONFIDENCE: u8 = 60;

/// Which interpretation a response supports.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed<T> {
    /// JSON was located and decoded.
    Structured(T),
    /// No JSON anywhere in the text.
    KeywordFallback,
    /// JSON-looking text was located but did not decode.
    Unparseable(String),
}

fn fence_pattern() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"```[A-Za-z0-9_+-]*").unwrap())
}

/// Remove Markdown code-fence markers, keeping the fenced content.
pub fn strip_code_fences(raw: &str) -> String {
    fence_pattern().replace_all(raw, "").trim().to_string()
}

/// Byte range of the first balanced `open ... close` run, ignoring
/// delimiters inside JSON string literals.
fn balanced_span(text: &str, open: char, close: char) -> Option<Range<usize>> {
    let start = text.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c == '"' {
            in_string = true;
        } else if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some(start..start + i + c.len_utf8());
            }
        }
    }
    None
}

pub fn find_balanced(text: &str, open: char, close: char) -> Option<&str> {
    balanced_span(text, open, close).map(|r| &text[r])
}

pub fn classify_system(text: &str) -> Parsed<Map<String, Value>> {
    let Some(candidate) = find_balanced(text, '{', '}') else {
        return Parsed::KeywordFallback;
    };
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Parsed::Structured(map),
        Ok(_) => Parsed::Unparseable("not a JSON object".to_string()),
        Err(e) => Parsed::Unparseable(e.to_string()),
    }
}

/// Locates whichever of an array or an object starts first. A lone object
/// counts as a one-element array; an object wrapping a `predictions` array
/// is unwrapped.
pub fn classify_predictions(text: &str) -> Parsed<Vec<Value>> {
    let span = match (balanced_span(text, '[', ']'), balanced_span(text, '{', '}')) {
        (Some(a), Some(o)) => {
            if a.start < o.start {
                a
            } else {
                o
            }
        }
        (Some(a), None) => a,
        (None, Some(o)) => o,
        (None, None) => return Parsed::KeywordFallback,
    };

    match serde_json::from_str::<Value>(&text[span]) {
        Ok(Value::Array(items)) => Parsed::Structured(items),
        Ok(Value::Object(mut map)) => match map.remove("predictions") {
            Some(Value::Array(items)) => Parsed::Structured(items),
            Some(other) => {
                map.insert("predictions".to_string(), other);
                Parsed::Structured(vec![Value::Object(map)])
            }
            None => Parsed::Structured(vec![Value::Object(map)]),
        },
        Ok(_) => Parsed::Unparseable("not a JSON array or object".to_string()),
        Err(e) => Parsed::Unparseable(e.to_string()),
    }
}

/// A finite number, from a JSON number or numeric string.
fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        v @ Value::Number(_) => Some(value_to_f64(v)),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn text_field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn excerpt(text: &str) -> String {
    let head: String = text.chars().take(EXCERPT_CHARS).collect();
    format!("{}...", head)
}

pub fn parse_system_insight(raw: &str, fallback_score: impl FnOnce() -> u8) -> InsightRecord {
    let text = strip_code_fences(raw);
    let now = Utc::now();

    match classify_system(&text) {
        Parsed::Structured(obj) => {
            let health_score = match number(obj.get("healthScore")) {
                Some(score) => score.round().clamp(1.0, 10.0) as u8,
                None => fallback_score(),
            };
            InsightRecord {
                health_score,
                summary: text_field(&obj, &["summary"])
                    .unwrap_or("AI Analysis Complete")
                    .to_string(),
                insights: string_list(obj.get("insights")),
                recommendations: string_list(obj.get("recommendations")),
                predictions: string_list(obj.get("predictions")),
                bottlenecks: string_list(obj.get("bottlenecks")),
                timestamp: now,
                enabled: true,
                error: None,
                outcome: InsightOutcome::Structured,
            }
        }
        Parsed::KeywordFallback => {
            debug!("AI response contained no JSON, using text excerpt");
            InsightRecord {
                health_score: fallback_score(),
                summary: "AI Analysis Complete".to_string(),
                insights: vec![excerpt(&text)],
                recommendations: Vec::new(),
                predictions: Vec::new(),
                bottlenecks: Vec::new(),
                timestamp: now,
                enabled: true,
                error: None,
                outcome: InsightOutcome::KeywordFallback,
            }
        }
        Parsed::Unparseable(reason) => {
            warn!("Failed to parse AI response: {}", reason);
            InsightRecord {
                health_score: fallback_score(),
                summary: "Analysis Complete".to_string(),
                insights: vec!["AI analysis completed but format error occurred.".to_string()],
                recommendations: Vec::new(),
                predictions: Vec::new(),
                bottlenecks: Vec::new(),
                timestamp: now,
                enabled: true,
                error: Some("Failed to parse AI response".to_string()),
                outcome: InsightOutcome::Unparseable,
            }
        }
    }
}

fn prediction(
    process: &ProcessSample,
    prediction_type: PredictionType,
    confidence: u8,
    message: String,
    now: DateTime<Utc>,
) -> ProcessPrediction {
    ProcessPrediction {
        pid: process.pid,
        process_name: process.name.clone(),
        prediction_type,
        confidence,
        message,
        severity: Severity::from_confidence(confidence),
        prediction_timeframe: DEFAULT_TIMEFRAME.to_string(),
        suggested_action: DEFAULT_ACTION.to_string(),
        probability_factors: Vec::new(),
        timestamp: now,
    }
}

fn neutral(process: &ProcessSample, now: DateTime<Utc>) -> ProcessPrediction {
    prediction(
        process,
        PredictionType::AnalysisComplete,
        NEUTRAL_CONFIDENCE,
        format!("Analysis complete, no specific issues identified for {}", process.name),
        now,
    )
}

fn structured_prediction(
    value: &Value,
    process: &ProcessSample,
    now: DateTime<Utc>,
) -> Option<ProcessPrediction> {
    let obj = value.as_object()?;

    let confidence = number(obj.get("confidence"))
        .map(|c| c.round().clamp(0.0, 100.0) as u8)
        .unwrap_or(DEFAULT_CONFIDENCE);
    let prediction_type =
        PredictionType::from(text_field(obj, &["type", "predictionType"]).unwrap_or(""));
    let severity = text_field(obj, &["severity"])
        .and_then(Severity::parse)
        .unwrap_or_else(|| Severity::from_confidence(confidence));

    Some(ProcessPrediction {
        pid: process.pid,
        process_name: process.name.clone(),
        message: text_field(obj, &["message", "description"])
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} predicted for {}", prediction_type, process.name)),
        prediction_type,
        confidence,
        severity,
        prediction_timeframe: text_field(obj, &["predictionTimeframe", "timeframe"])
            .unwrap_or(DEFAULT_TIMEFRAME)
            .to_string(),
        suggested_action: text_field(obj, &["suggestedAction", "action"])
            .unwrap_or(DEFAULT_ACTION)
            .to_string(),
        probability_factors: string_list(obj.get("probabilityFactors")),
        timestamp: now,
    })
}

fn keyword_predictions(text: &str, process: &ProcessSample, now: DateTime<Utc>) -> Vec<ProcessPrediction> {
    let lower = text.to_lowercase();
    let mut out = Vec::new();

    if lower.contains("cpu") || lower.contains("spike") {
        out.push(prediction(
            process,
            PredictionType::CpuSpike,
            CPU_KEYWORD_CONFIDENCE,
            format!("Possible CPU spike for {}", process.name),
            now,
        ));
    }
    if lower.contains("memory") || lower.contains("leak") {
        out.push(prediction(
            process,
            PredictionType::MemoryLeak,
            MEMORY_KEYWORD_CONFIDENCE,
            format!("Possible memory leak in {}", process.name),
            now,
        ));
    }
    if out.is_empty() {
        out.push(neutral(process, now));
    }
    out
}

/// Always returns at least one record.
pub fn parse_process_predictions(raw: &str, process: &ProcessSample) -> Vec<ProcessPrediction> {
    let text = strip_code_fences(raw);
    let now = Utc::now();

    match classify_predictions(&text) {
        Parsed::Structured(items) => {
            let predictions: Vec<ProcessPrediction> = items
                .iter()
                .filter_map(|v| structured_prediction(v, process, now))
                .collect();
            if predictions.is_empty() {
                vec![neutral(process, now)]
            } else {
                predictions
            }
        }
        Parsed::KeywordFallback => {
            debug!("No JSON in prediction response for pid {}, scanning keywords", process.pid);
            keyword_predictions(&text, process, now)
        }
        Parsed::Unparseable(reason) => {
            warn!("Failed to parse predictions for pid {}: {}", process.pid, reason);
            vec![prediction(
                process,
                PredictionType::ParseError,
                0,
                "Failed to parse AI response".to_string(),
                now,
            )]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn java() -> ProcessSample {
        ProcessSample {
            pid: 42,
            name: "java".to_string(),
            cpu_usage: 80.0,
            memory_usage: 2_000_000_000,
            thread_count: 60,
            state: "RUNNING".to_string(),
        }
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("plain"), "plain");
    }

    #[test]
    fn test_find_balanced_is_string_aware() {
        let text = r#"Here: {"summary": "brace } and \" quote {", "n": {"x": 1}} trailing }"#;
        assert_eq!(
            find_balanced(text, '{', '}'),
            Some(r#"{"summary": "brace } and \" quote {", "n": {"x": 1}}"#)
        );
        assert_eq!(find_balanced("{ never closed", '{', '}'), None);
        assert_eq!(find_balanced("no braces", '{', '}'), None);
    }

    #[test]
    fn test_system_structured() {
        let raw = "Sure!\n```json\n{\"healthScore\": 14, \"summary\": \"Busy\", \
                   \"insights\": [\"CPU high\"], \"bottlenecks\": \"disk\"}\n```";
        let record = parse_system_insight(raw, || 3);
        assert_eq!(record.outcome, InsightOutcome::Structured);
        assert_eq!(record.health_score, 10);
        assert_eq!(record.summary, "Busy");
        assert_eq!(record.insights, vec!["CPU high"]);
        assert_eq!(record.bottlenecks, vec!["disk"]);
        assert!(record.recommendations.is_empty());
        assert!(record.error.is_none());
    }

    #[test]
    fn test_system_score_bounds_and_fallback() {
        assert_eq!(parse_system_insight(r#"{"healthScore": 0}"#, || 9).health_score, 1);
        assert_eq!(parse_system_insight(r#"{"healthScore": "7.4"}"#, || 9).health_score, 7);
        assert_eq!(parse_system_insight(r#"{"summary": "x"}"#, || 9).health_score, 9);
    }

    #[test]
    fn test_system_without_json() {
        let raw = "é".repeat(300);
        let record = parse_system_insight(&raw, || 4);
        assert_eq!(record.outcome, InsightOutcome::KeywordFallback);
        assert_eq!(record.summary, "AI Analysis Complete");
        assert_eq!(record.health_score, 4);
        assert_eq!(record.insights[0].chars().count(), 203);
        assert!(record.insights[0].ends_with("..."));
    }

    #[test]
    fn test_system_malformed_json() {
        let record = parse_system_insight("{\"healthScore\": 8,, }", || 5);
        assert_eq!(record.outcome, InsightOutcome::Unparseable);
        assert_eq!(record.error.as_deref(), Some("Failed to parse AI response"));
        assert_eq!(record.summary, "Analysis Complete");
        assert_eq!(record.health_score, 5);
    }

    #[test]
    fn test_missing_confidence_defaults() {
        let raw = r#"[{"type": "cpu spike", "message": "CPU will spike"}]"#;
        let preds = parse_process_predictions(raw, &java());
        assert_eq!(preds.len(), 1);
        let p = &preds[0];
        assert_eq!(p.confidence, 50);
        assert_eq!(p.severity, Severity::Low);
        assert_eq!(p.prediction_type, PredictionType::CpuSpike);
        assert_eq!(p.prediction_timeframe, "30 minutes");
        assert_eq!(p.suggested_action, "Monitor closely");
        assert!(p.probability_factors.is_empty());
        assert_eq!((p.pid, p.process_name.as_str()), (42, "java"));
    }

    #[test]
    fn test_confidence_clamping_and_severity() {
        let raw = r#"```json
        [{"type": "MEMORY_LEAK", "confidence": 150},
         {"type": "THREAD_EXPLOSION", "confidence": -5, "severity": "HIGH"},
         {"type": "STATE_ANOMALY", "confidence": "65", "probabilityFactors": ["zombie", 3]}]
        ```"#;
        let preds = parse_process_predictions(raw, &java());
        assert_eq!(preds.len(), 3);
        assert_eq!((preds[0].confidence, preds[0].severity), (100, Severity::High));
        assert_eq!((preds[1].confidence, preds[1].severity), (0, Severity::High));
        assert_eq!((preds[2].confidence, preds[2].severity), (65, Severity::Medium));
        assert_eq!(preds[2].probability_factors, vec!["zombie", "3"]);
    }

    #[test]
    fn test_single_object_accepted() {
        let preds = parse_process_predictions(r#"{"type": "RESOURCE_EXHAUSTION", "confidence": 80}"#, &java());
        assert_eq!(preds.len(), 1);
        assert_eq!(preds[0].prediction_type, PredictionType::ResourceExhaustion);

        let wrapped = r#"{"predictions": [{"type": "CPU_SPIKE"}, {"type": "MEMORY_LEAK"}]}"#;
        assert_eq!(parse_process_predictions(wrapped, &java()).len(), 2);
    }

    #[test]
    fn test_keyword_fallback() {
        let preds = parse_process_predictions("This looks like a memory leak to me.", &java());
        assert_eq!(preds.len(), 1);
        assert_eq!(preds[0].prediction_type, PredictionType::MemoryLeak);
        assert_eq!(preds[0].confidence, 55);

        let both = parse_process_predictions("CPU spike and memory growth", &java());
        let types: Vec<_> = both.iter().map(|p| p.prediction_type.clone()).collect();
        assert_eq!(types, vec![PredictionType::CpuSpike, PredictionType::MemoryLeak]);
        assert_eq!(both[0].confidence, 60);
    }

    #[test]
    fn test_no_keywords_is_neutral() {
        let preds = parse_process_predictions("not json at all", &java());
        assert_eq!(preds.len(), 1);
        assert_eq!(preds[0].prediction_type, PredictionType::AnalysisComplete);
        assert_eq!(preds[0].confidence, 60);
    }

    #[test]
    fn test_malformed_array_is_parse_error() {
        let preds = parse_process_predictions(r#"[{"type": }]"#, &java());
        assert_eq!(preds.len(), 1);
        assert_eq!(preds[0].prediction_type, PredictionType::ParseError);
        assert_eq!(preds[0].confidence, 0);
    }

    #[test]
    fn test_empty_array_is_neutral() {
        let preds = parse_process_predictions("[]", &java());
        assert_eq!(preds[0].prediction_type, PredictionType::AnalysisComplete);
    }

    #[test]
    fn test_arbitrary_input_never_empty() {
        for raw in ["", "```", "[[[", "]}{[", "\"", "{\"a\":\"\\\"}", "\u{0}\u{ffff}", "[1, 2]"] {
            assert!(!parse_process_predictions(raw, &java()).is_empty(), "{:?}", raw);
            let _ = parse_system_insight(raw, || 5);
        }
    }
}
