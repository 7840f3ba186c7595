//! AI-derived records: whole-system insights and per-process predictions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Which branch of the normalizer produced an [`InsightRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightOutcome {
    Structured,
    KeywordFallback,
    Unparseable,
    Disabled,
    ServiceError,
}

/// Result of one whole-system analysis cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightRecord {
    /// 1 (failing) to 10 (perfect).
    pub health_score: u8,
    pub summary: String,
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
    pub predictions: Vec<String>,
    pub bottlenecks: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub outcome: InsightOutcome,
}

impl InsightRecord {
    /// Record returned when no AI service is configured.
    pub fn disabled(health_score: u8) -> Self {
        Self {
            health_score,
            summary: "AI analysis disabled".to_string(),
            insights: vec![
                "AI analysis disabled. Configure an AI endpoint for intelligent insights."
                    .to_string(),
            ],
            recommendations: Vec::new(),
            predictions: Vec::new(),
            bottlenecks: Vec::new(),
            timestamp: Utc::now(),
            enabled: false,
            error: None,
            outcome: InsightOutcome::Disabled,
        }
    }

    /// Record returned when the AI service call itself failed.
    pub fn service_error(health_score: u8) -> Self {
        Self {
            health_score,
            summary: "Analysis unavailable".to_string(),
            insights: vec!["AI service temporarily unavailable.".to_string()],
            recommendations: Vec::new(),
            predictions: Vec::new(),
            bottlenecks: Vec::new(),
            timestamp: Utc::now(),
            enabled: true,
            error: Some("AI analysis failed".to_string()),
            outcome: InsightOutcome::ServiceError,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn from_confidence(confidence: u8) -> Self {
        if confidence > 70 {
            Severity::High
        } else if confidence > 50 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" | "moderate" => Some(Severity::Medium),
            "high" | "critical" => Some(Severity::High),
            _ => None,
        }
    }
}

/// Kind of issue a process prediction describes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PredictionType {
    CpuSpike,
    MemoryLeak,
    ThreadExplosion,
    StateAnomaly,
    ResourceExhaustion,
    AnalysisComplete,
    ParseError,
    Other(String),
}

impl PredictionType {
    pub fn as_str(&self) -> &str {
        match self {
            PredictionType::CpuSpike => "CPU_SPIKE",
            PredictionType::MemoryLeak => "MEMORY_LEAK",
            PredictionType::ThreadExplosion => "THREAD_EXPLOSION",
            PredictionType::StateAnomaly => "STATE_ANOMALY",
            PredictionType::ResourceExhaustion => "RESOURCE_EXHAUSTION",
            PredictionType::AnalysisComplete => "ANALYSIS_COMPLETE",
            PredictionType::ParseError => "PARSE_ERROR",
            PredictionType::Other(s) => s.as_str(),
        }
    }
}

impl From<&str> for PredictionType {
    fn from(raw: &str) -> Self {
        let key: String = raw
            .trim()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c.to_ascii_uppercase() })
            .collect();
        match key.as_str() {
            "CPU_SPIKE" => PredictionType::CpuSpike,
            "MEMORY_LEAK" => PredictionType::MemoryLeak,
            "THREAD_EXPLOSION" => PredictionType::ThreadExplosion,
            "STATE_ANOMALY" => PredictionType::StateAnomaly,
            "RESOURCE_EXHAUSTION" => PredictionType::ResourceExhaustion,
            "ANALYSIS_COMPLETE" => PredictionType::AnalysisComplete,
            "PARSE_ERROR" => PredictionType::ParseError,
            "" => PredictionType::Other("UNKNOWN".to_string()),
            _ => PredictionType::Other(key),
        }
    }
}

impl fmt::Display for PredictionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PredictionType {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PredictionType {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        Ok(PredictionType::from(raw.as_str()))
    }
}

/// One predicted issue for one process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPrediction {
    pub pid: u32,
    pub process_name: String,
    #[serde(rename = "type")]
    pub prediction_type: PredictionType,
    /// 0 to 100.
    pub confidence: u8,
    pub message: String,
    pub severity: Severity,
    pub prediction_timeframe: String,
    pub suggested_action: String,
    pub probability_factors: Vec<String>,
    pub timestamp: DateTime<Utc>,
}
