//! Metrics sources.
//!
//! A source knows how to fetch one [`Snapshot`] from the monitoring backend.
//! The scheduler only sees the [`SampleSource`] trait, so tests drive it with
//! stubs and production uses the HTTP implementations below.

mod http;
mod split;

pub use http::*;
pub use split::*;

use crate::model::Snapshot;

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Source error types.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("no response from metrics backend: {0}")]
    Transport(String),
    #[error("metrics backend returned HTTP {0}")]
    Http(u16),
    #[error("failed to decode metrics response: {0}")]
    Decode(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SourceError {
    /// Collapse the error into the class the scheduler reports.
    pub fn kind(&self) -> FailureKind {
        match self {
            SourceError::Transport(_) | SourceError::Config(_) => FailureKind::NoResponse,
            SourceError::Http(status) => FailureKind::HttpError { status: *status },
            SourceError::Decode(_) => FailureKind::ParseError,
        }
    }
}

/// Failure classes distinguished in logs and poll events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    NoResponse,
    HttpError { status: u16 },
    ParseError,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::NoResponse => f.write_str("no response"),
            FailureKind::HttpError { status } => write!(f, "HTTP error {}", status),
            FailureKind::ParseError => f.write_str("parse error"),
        }
    }
}

/// Fetches one metrics snapshot.
#[async_trait]
pub trait SampleSource: Send + Sync {
    async fn fetch(&self) -> Result<Snapshot, SourceError>;

    /// Short label used in log lines.
    fn describe(&self) -> String {
        "metrics source".to_string()
    }
}

/// Individually fetchable sections of the backend API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Dashboard,
    Cpu,
    Memory,
    Disks,
    Networks,
    Processes,
    Alerts,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Dashboard,
        Category::Cpu,
        Category::Memory,
        Category::Disks,
        Category::Networks,
        Category::Processes,
        Category::Alerts,
    ];

    /// Path segment below the backend base URL.
    pub fn path(&self) -> &'static str {
        match self {
            Category::Dashboard => "dashboard",
            Category::Cpu => "cpu",
            Category::Memory => "memory",
            Category::Disks => "disks",
            Category::Networks => "networks",
            Category::Processes => "processes",
            Category::Alerts => "alerts",
        }
    }

    /// Refresh cadence when fetched on its own.
    pub fn default_cadence(&self) -> Duration {
        match self {
            Category::Disks => Duration::from_secs(5),
            _ => Duration::from_secs(3),
        }
    }

    /// Move this category's section from a partial response into `target`.
    pub fn merge_into(&self, partial: Snapshot, target: &mut Snapshot) {
        match self {
            Category::Dashboard => target.dashboard = partial.dashboard,
            Category::Cpu => target.cpu = partial.cpu,
            Category::Memory => target.memory = partial.memory,
            Category::Disks => target.disks = partial.disks,
            Category::Networks => target.networks = partial.networks,
            Category::Processes => target.processes = partial.processes,
            Category::Alerts => target.alerts = partial.alerts,
        }
    }
}
