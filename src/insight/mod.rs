//! AI-assisted analysis: prompt building, completion calls, and
//! normalization of whatever text comes back.

pub mod client;
pub mod coordinator;
mod health;
pub mod normalizer;
pub mod prompt;

pub use client::{ChatClient, CompletionError, TextCompletion};
pub use coordinator::{
    AnalysisError, BatchFailure, BatchReport, InsightCoordinator, DEFAULT_BATCH_LIMIT,
    PREDICTION_HISTORY_CAPACITY,
};
pub use health::fallback_health_score;
pub use normalizer::{parse_process_predictions, parse_system_insight, Parsed};
