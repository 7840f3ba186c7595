//! Pulsewatch - host metrics monitoring with AI-assisted analysis.
//!
//! Polls a metrics backend, keeps bounded history per series, classifies
//! alerts, scores process risk and serves everything over a JSON API.

pub mod alerts;
pub mod config;
pub mod format;
pub mod history;
pub mod insight;
pub mod model;
pub mod monitor;
pub mod processes;
pub mod risk;
pub mod scheduler;
pub mod source;
pub mod web;
