//! Configuration module for pulsewatch.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::insight::DEFAULT_BATCH_LIMIT;

use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,
    #[error("fetch timeout must be greater than zero")]
    ZeroFetchTimeout,
    #[error("metrics URL is empty")]
    EmptyMetricsUrl,
    #[error("AI endpoint is set but PULSEWATCH_AI_MODEL is not")]
    MissingAiModel,
}

/// How snapshots are assembled from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceMode {
    /// One `/metrics` call per poll.
    #[default]
    Unified,
    /// Per-category endpoints on their own cadences.
    Split,
}

impl FromStr for SourceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unified" => Ok(SourceMode::Unified),
            "split" => Ok(SourceMode::Split),
            other => Err(format!("unknown source mode: {}", other)),
        }
    }
}

/// AI service settings; absent when no endpoint is configured.
#[derive(Debug, Clone, PartialEq)]
pub struct AiConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// HTTP port for the JSON API (default: 8090)
    pub http_port: u16,
    /// Base URL of the metrics backend
    pub metrics_url: String,
    pub poll_interval: Duration,
    pub fetch_timeout: Duration,
    pub source_mode: SourceMode,
    pub ai: Option<AiConfig>,
    /// Processes analyzed per batch run (default: 5)
    pub batch_limit: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            http_port: 8090,
            metrics_url: "http://localhost:8080/api/monitor".to_string(),
            poll_interval: Duration::from_millis(3000),
            fetch_timeout: Duration::from_millis(5000),
            source_mode: SourceMode::Unified,
            ai: None,
            batch_limit: DEFAULT_BATCH_LIMIT,
        }
    }
}

const DEFAULT_AI_TIMEOUT_MS: u64 = 30_000;

fn parsed<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = get(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring invalid value {:?} for {}", raw, key);
            None
        }
    }
}

impl MonitorConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PULSEWATCH_HTTP_PORT`: HTTP port (default: 8090)
    /// - `PULSEWATCH_METRICS_URL`: metrics backend base URL
    /// - `PULSEWATCH_POLL_INTERVAL_MS`: poll cadence (default: 3000)
    /// - `PULSEWATCH_FETCH_TIMEOUT_MS`: per-fetch timeout (default: 5000)
    /// - `PULSEWATCH_SOURCE_MODE`: `unified` or `split`
    /// - `PULSEWATCH_AI_ENDPOINT`, `PULSEWATCH_AI_MODEL`, `PULSEWATCH_AI_API_KEY`,
    ///   `PULSEWATCH_AI_TIMEOUT_MS`: AI service; disabled without an endpoint
    /// - `PULSEWATCH_BATCH_LIMIT`: processes per batch analysis (default: 5)
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`MonitorConfig::load`] with an arbitrary variable source.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(port) = parsed(&get, "PULSEWATCH_HTTP_PORT") {
            cfg.http_port = port;
        }

        if let Some(url) = get("PULSEWATCH_METRICS_URL") {
            cfg.metrics_url = url.trim().to_string();
        }

        if let Some(ms) = parsed::<u64>(&get, "PULSEWATCH_POLL_INTERVAL_MS") {
            cfg.poll_interval = Duration::from_millis(ms);
        }

        if let Some(ms) = parsed::<u64>(&get, "PULSEWATCH_FETCH_TIMEOUT_MS") {
            cfg.fetch_timeout = Duration::from_millis(ms);
        }

        if let Some(mode) = parsed(&get, "PULSEWATCH_SOURCE_MODE") {
            cfg.source_mode = mode;
        }

        if let Some(limit) = parsed(&get, "PULSEWATCH_BATCH_LIMIT") {
            cfg.batch_limit = limit;
        }

        if let Some(endpoint) = get("PULSEWATCH_AI_ENDPOINT").filter(|e| !e.trim().is_empty()) {
            let timeout_ms =
                parsed(&get, "PULSEWATCH_AI_TIMEOUT_MS").unwrap_or(DEFAULT_AI_TIMEOUT_MS);
            cfg.ai = Some(AiConfig {
                endpoint: endpoint.trim().to_string(),
                model: get("PULSEWATCH_AI_MODEL").unwrap_or_default(),
                api_key: get("PULSEWATCH_AI_API_KEY").filter(|k| !k.is_empty()),
                timeout: Duration::from_millis(timeout_ms),
            });
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.fetch_timeout.is_zero() {
            return Err(ConfigError::ZeroFetchTimeout);
        }
        if self.metrics_url.is_empty() {
            return Err(ConfigError::EmptyMetricsUrl);
        }
        if let Some(ai) = &self.ai {
            if ai.model.trim().is_empty() {
                return Err(ConfigError::MissingAiModel);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let cfg = MonitorConfig::default();
        assert_eq!(cfg.http_port, 8090);
        assert_eq!(cfg.poll_interval, Duration::from_secs(3));
        assert_eq!(cfg.source_mode, SourceMode::Unified);
        assert!(cfg.ai.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let cfg = MonitorConfig::from_lookup(lookup(&[
            ("PULSEWATCH_HTTP_PORT", "9000"),
            ("PULSEWATCH_POLL_INTERVAL_MS", "1000"),
            ("PULSEWATCH_SOURCE_MODE", "Split"),
            ("PULSEWATCH_AI_ENDPOINT", "http://llm:8000/v1/chat/completions"),
            ("PULSEWATCH_AI_MODEL", "qwen"),
            ("PULSEWATCH_BATCH_LIMIT", "3"),
        ]));
        assert_eq!(cfg.http_port, 9000);
        assert_eq!(cfg.poll_interval, Duration::from_secs(1));
        assert_eq!(cfg.source_mode, SourceMode::Split);
        assert_eq!(cfg.batch_limit, 3);

        let ai = cfg.ai.as_ref().unwrap();
        assert_eq!(ai.model, "qwen");
        assert_eq!(ai.timeout, Duration::from_secs(30));
        assert!(ai.api_key.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_invalid_values_are_ignored() {
        let cfg = MonitorConfig::from_lookup(lookup(&[
            ("PULSEWATCH_HTTP_PORT", "not-a-port"),
            ("PULSEWATCH_SOURCE_MODE", "sideways"),
            ("PULSEWATCH_AI_ENDPOINT", "  "),
        ]));
        assert_eq!(cfg.http_port, 8090);
        assert_eq!(cfg.source_mode, SourceMode::Unified);
        assert!(cfg.ai.is_none());
    }

    #[test]
    fn test_validate() {
        let cfg = MonitorConfig::from_lookup(lookup(&[("PULSEWATCH_POLL_INTERVAL_MS", "0")]));
        assert!(matches!(cfg.validate(), Err(ConfigError::ZeroPollInterval)));

        let cfg = MonitorConfig::from_lookup(lookup(&[("PULSEWATCH_AI_ENDPOINT", "http://llm")]));
        assert!(matches!(cfg.validate(), Err(ConfigError::MissingAiModel)));
    }
}
