//! Assemble snapshots from the per-category endpoints.
//!
//! Used when the unified `/metrics` endpoint is unavailable. Each category
//! has its own cadence; sections that are not due yet are served from the
//! previous fetch.

use super::{Category, HttpSampleSource, SampleSource, SourceError};
use crate::model::Snapshot;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Default)]
struct SplitState {
    merged: Snapshot,
    fetched_at: HashMap<Category, Instant>,
}

pub struct SplitSource {
    http: HttpSampleSource,
    cadences: Vec<(Category, Duration)>,
    state: Mutex<SplitState>,
}

impl SplitSource {
    pub fn new(http: HttpSampleSource) -> Self {
        let cadences = Category::ALL
            .iter()
            .map(|c| (*c, c.default_cadence()))
            .collect();
        Self::with_cadences(http, cadences)
    }

    pub fn with_cadences(http: HttpSampleSource, cadences: Vec<(Category, Duration)>) -> Self {
        Self {
            http,
            cadences,
            state: Mutex::new(SplitState::default()),
        }
    }
}

/// Categories whose cadence has elapsed since their last successful fetch.
///
/// A category counts as due within a tenth of its cadence of the deadline,
/// so a poller ticking at exactly the cadence never skips a round because
/// of scheduling jitter.
pub fn due_categories(
    cadences: &[(Category, Duration)],
    fetched_at: &HashMap<Category, Instant>,
    now: Instant,
) -> Vec<Category> {
    cadences
        .iter()
        .filter(|(category, cadence)| match fetched_at.get(category) {
            Some(last) => now.saturating_duration_since(*last) + *cadence / 10 >= *cadence,
            None => true,
        })
        .map(|(category, _)| *category)
        .collect()
}

/// Categories on the shortest cadence. Refetched when nothing else is due
/// so that every poll reaches the backend.
fn fastest_categories(cadences: &[(Category, Duration)]) -> Vec<Category> {
    let Some(fastest) = cadences.iter().map(|(_, cadence)| *cadence).min() else {
        return Vec::new();
    };
    cadences
        .iter()
        .filter(|(_, cadence)| *cadence == fastest)
        .map(|(category, _)| *category)
        .collect()
}

#[async_trait]
impl SampleSource for SplitSource {
    async fn fetch(&self) -> Result<Snapshot, SourceError> {
        // Cadences run from when the requests were issued, not when they finished.
        let started = Instant::now();
        let mut due = {
            let state = self.state.lock().unwrap();
            due_categories(&self.cadences, &state.fetched_at, started)
        };
        if due.is_empty() {
            due = fastest_categories(&self.cadences);
        }

        let mut fetched = Vec::with_capacity(due.len());
        for category in due {
            let partial = self.http.fetch_category(category).await?;
            fetched.push((category, partial));
        }

        let mut state = self.state.lock().unwrap();
        for (category, partial) in fetched {
            category.merge_into(partial, &mut state.merged);
            state.fetched_at.insert(category, started);
        }
        Ok(state.merged.clone())
    }

    fn describe(&self) -> String {
        format!("{}/{{category}}", self.http.base_url())
    }
}
