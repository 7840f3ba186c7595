//! On-demand AI analysis with per-process in-flight tracking.

use super::client::{CompletionError, TextCompletion};
use super::health::fallback_health_score;
use super::normalizer::{parse_process_predictions, parse_system_insight};
use super::prompt::{process_prompt, system_prompt};
use crate::model::{InsightRecord, ProcessPrediction, ProcessSample, Snapshot};
use crate::risk;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

pub const PREDICTION_HISTORY_CAPACITY: usize = 100;
pub const DEFAULT_BATCH_LIMIT: usize = 5;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("process {0} is already being analyzed")]
    AlreadyAnalyzing(u32),
    #[error("a system analysis is already running")]
    SystemBusy,
    #[error("AI analysis is disabled")]
    Disabled,
    #[error("AI call timed out after {0:?}")]
    Timeout(Duration),
    #[error("AI service error: {0}")]
    Service(#[from] CompletionError),
    #[error("no metrics snapshot received yet")]
    NoSnapshot,
    #[error("process {0} is not in the current snapshot")]
    UnknownProcess(u32),
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub pid: u32,
    pub error: String,
}

/// Outcome of one batch run, pids in snapshot order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub completed: Vec<u32>,
    pub skipped: Vec<u32>,
    pub failed: Vec<BatchFailure>,
}

#[derive(Default)]
struct State {
    analyzing: BTreeSet<u32>,
    system_running: bool,
    predictions: HashMap<u32, Vec<ProcessPrediction>>,
    history: VecDeque<ProcessPrediction>,
    latest: Option<InsightRecord>,
    last_analysis: Option<DateTime<Utc>>,
}

/// Marks work as running until dropped, so a cancelled call never leaves a
/// pid stuck in the analyzing set.
struct Busy<'a> {
    state: &'a Mutex<State>,
    pid: Option<u32>,
}

impl Drop for Busy<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap();
        match self.pid {
            Some(pid) => {
                state.analyzing.remove(&pid);
            }
            None => state.system_running = false,
        }
    }
}

pub struct InsightCoordinator {
    ai: Option<Arc<dyn TextCompletion>>,
    timeout: Option<Duration>,
    state: Mutex<State>,
}

impl InsightCoordinator {
    /// `ai: None` runs in disabled mode: system analysis yields the local
    /// fallback score and process analysis is refused.
    pub fn new(ai: Option<Arc<dyn TextCompletion>>, timeout: Option<Duration>) -> Self {
        Self {
            ai,
            timeout,
            state: Mutex::new(State::default()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.ai.is_some()
    }

    async fn call(&self, ai: &dyn TextCompletion, prompt: &str) -> Result<String, AnalysisError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, ai.complete(prompt))
                .await
                .map_err(|_| AnalysisError::Timeout(limit))?
                .map_err(AnalysisError::from),
            None => ai.complete(prompt).await.map_err(AnalysisError::from),
        }
    }

    /// Whole-host analysis. While one is running, further calls return the
    /// most recent record instead of starting another.
    pub async fn analyze_system(&self, snapshot: &Snapshot) -> Result<InsightRecord, AnalysisError> {
        let fallback = fallback_health_score(snapshot);

        let Some(ai) = self.ai.clone() else {
            let record = InsightRecord::disabled(fallback);
            self.store_insight(record.clone());
            return Ok(record);
        };

        let busy = {
            let mut state = self.state.lock().unwrap();
            if state.system_running {
                return state.latest.clone().ok_or(AnalysisError::SystemBusy);
            }
            state.system_running = true;
            Busy {
                state: &self.state,
                pid: None,
            }
        };

        info!("Starting system analysis");
        let prompt = system_prompt(snapshot);
        let record = match self.call(ai.as_ref(), &prompt).await {
            Ok(text) => parse_system_insight(&text, || fallback),
            Err(e) => {
                warn!("System analysis failed: {}", e);
                InsightRecord::service_error(fallback)
            }
        };

        self.store_insight(record.clone());
        drop(busy);
        Ok(record)
    }

    fn store_insight(&self, record: InsightRecord) {
        let mut state = self.state.lock().unwrap();
        state.last_analysis = Some(record.timestamp);
        state.latest = Some(record);
    }

    pub async fn analyze_process(
        &self,
        process: &ProcessSample,
        snapshot: &Snapshot,
    ) -> Result<Vec<ProcessPrediction>, AnalysisError> {
        let ai = self.ai.clone().ok_or(AnalysisError::Disabled)?;
        let pid = process.pid;

        let busy = {
            let mut state = self.state.lock().unwrap();
            if !state.analyzing.insert(pid) {
                return Err(AnalysisError::AlreadyAnalyzing(pid));
            }
            Busy {
                state: &self.state,
                pid: Some(pid),
            }
        };

        info!(
            "Analyzing process {} ({}), local risk {}",
            pid,
            process.name,
            risk::score(process)
        );
        let prompt = process_prompt(process, snapshot);
        let result = self.call(ai.as_ref(), &prompt).await;

        let outcome = match result {
            Ok(text) => {
                let predictions = parse_process_predictions(&text, process);
                let mut state = self.state.lock().unwrap();
                for p in &predictions {
                    if state.history.len() == PREDICTION_HISTORY_CAPACITY {
                        state.history.pop_front();
                    }
                    state.history.push_back(p.clone());
                }
                state.predictions.insert(pid, predictions.clone());
                Ok(predictions)
            }
            Err(e) => {
                warn!("Prediction for process {} failed: {}", pid, e);
                Err(e)
            }
        };

        drop(busy);
        outcome
    }

    /// Analyze up to `limit` batch-eligible processes one after another.
    pub async fn analyze_all_high_risk(
        &self,
        snapshot: &Snapshot,
        limit: usize,
    ) -> Result<BatchReport, AnalysisError> {
        if !self.is_enabled() {
            return Err(AnalysisError::Disabled);
        }

        let candidates: Vec<&ProcessSample> = snapshot
            .processes
            .iter()
            .filter(|p| risk::qualifies_for_batch(p))
            .take(limit)
            .collect();
        info!("Batch analysis of {} processes", candidates.len());

        let mut report = BatchReport::default();
        for process in candidates {
            match self.analyze_process(process, snapshot).await {
                Ok(_) => report.completed.push(process.pid),
                Err(AnalysisError::AlreadyAnalyzing(pid)) => report.skipped.push(pid),
                Err(e) => report.failed.push(BatchFailure {
                    pid: process.pid,
                    error: e.to_string(),
                }),
            }
        }
        Ok(report)
    }

    pub fn analyzing(&self) -> BTreeSet<u32> {
        self.state.lock().unwrap().analyzing.clone()
    }

    pub fn is_analyzing(&self, pid: u32) -> bool {
        self.state.lock().unwrap().analyzing.contains(&pid)
    }

    pub fn system_analysis_running(&self) -> bool {
        self.state.lock().unwrap().system_running
    }

    pub fn predictions_for(&self, pid: u32) -> Option<Vec<ProcessPrediction>> {
        self.state.lock().unwrap().predictions.get(&pid).cloned()
    }

    pub fn predictions(&self) -> HashMap<u32, Vec<ProcessPrediction>> {
        self.state.lock().unwrap().predictions.clone()
    }

    /// Oldest first.
    pub fn history(&self) -> Vec<ProcessPrediction> {
        self.state.lock().unwrap().history.iter().cloned().collect()
    }

    pub fn latest_insight(&self) -> Option<InsightRecord> {
        self.state.lock().unwrap().latest.clone()
    }

    pub fn last_analysis(&self) -> Option<DateTime<Utc>> {
        self.state.lock().unwrap().last_analysis
    }

    pub fn clear_insight(&self) {
        self.state.lock().unwrap().latest = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InsightOutcome, PredictionType};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replies with canned text after a delay, tracking concurrency.
    struct StubCompletion {
        reply: Result<String, u16>,
        delay: Duration,
        calls: AtomicUsize,
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    impl StubCompletion {
        fn new(reply: Result<&str, u16>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.map(str::to_string),
                delay,
                calls: AtomicUsize::new(0),
                active: AtomicUsize::new(0),
                max_active: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TextCompletion for StubCompletion {
        async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.reply.clone().map_err(CompletionError::Status)
        }
    }

    fn process(pid: u32, cpu: f64) -> ProcessSample {
        ProcessSample {
            pid,
            name: format!("proc-{}", pid),
            cpu_usage: cpu,
            memory_usage: 0,
            thread_count: 1,
            state: "RUNNING".to_string(),
        }
    }

    fn coordinator(stub: &Arc<StubCompletion>, timeout: Option<Duration>) -> InsightCoordinator {
        InsightCoordinator::new(Some(stub.clone() as Arc<dyn TextCompletion>), timeout)
    }

    const SPIKE: &str = r#"[{"type": "CPU_SPIKE", "confidence": 80, "message": "spike"}]"#;

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_pid_is_rejected() {
        let stub = StubCompletion::new(Ok(SPIKE), Duration::from_secs(2));
        let c = coordinator(&stub, None);
        let p = process(42, 80.0);
        let snapshot = Snapshot::default();

        let (first, second) = tokio::join!(c.analyze_process(&p, &snapshot), async {
            let r = c.analyze_process(&p, &snapshot).await;
            assert!(c.is_analyzing(42));
            r
        });

        assert!(matches!(second, Err(AnalysisError::AlreadyAnalyzing(42))));
        let first = first.unwrap();
        assert_eq!(first[0].prediction_type, PredictionType::CpuSpike);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
        assert!(c.analyzing().is_empty());
        assert_eq!(c.predictions_for(42).unwrap().len(), 1);
        assert_eq!(c.history().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_clears_pid_and_stores_nothing() {
        let stub = StubCompletion::new(Err(503), Duration::from_millis(10));
        let c = coordinator(&stub, None);

        let err = c.analyze_process(&process(7, 50.0), &Snapshot::default()).await;
        assert!(matches!(err, Err(AnalysisError::Service(CompletionError::Status(503)))));
        assert!(!c.is_analyzing(7));
        assert!(c.predictions_for(7).is_none());
        assert!(c.history().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_a_failure() {
        let stub = StubCompletion::new(Ok(SPIKE), Duration::from_secs(60));
        let c = coordinator(&stub, Some(Duration::from_secs(1)));

        let err = c.analyze_process(&process(9, 50.0), &Snapshot::default()).await;
        assert!(matches!(err, Err(AnalysisError::Timeout(_))));
        assert!(c.analyzing().is_empty());
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let many: Vec<String> = (0..30)
            .map(|i| format!(r#"{{"type": "CPU_SPIKE", "message": "m{}"}}"#, i))
            .collect();
        let reply = format!("[{}]", many.join(","));
        let stub = StubCompletion::new(Ok(reply.as_str()), Duration::ZERO);
        let c = coordinator(&stub, None);

        for pid in 1..=4 {
            c.analyze_process(&process(pid, 50.0), &Snapshot::default())
                .await
                .unwrap();
        }

        let history = c.history();
        assert_eq!(history.len(), PREDICTION_HISTORY_CAPACITY);
        // 120 produced, the first 20 evicted
        assert_eq!(history[0].pid, 1);
        assert_eq!(history[0].message, "m20");
        assert_eq!(history.last().unwrap().pid, 4);
        assert_eq!(c.predictions().len(), 4);
    }

    #[tokio::test]
    async fn test_disabled_mode() {
        let c = InsightCoordinator::new(None, None);
        let mut s = Snapshot::default();
        s.dashboard.cpu_usage = 95.0;

        let record = c.analyze_system(&s).await.unwrap();
        assert!(!record.enabled);
        assert_eq!(record.outcome, InsightOutcome::Disabled);
        assert_eq!(record.health_score, 6);
        assert!(c.latest_insight().is_some());

        let err = c.analyze_process(&process(1, 1.0), &s).await;
        assert!(matches!(err, Err(AnalysisError::Disabled)));
        assert!(matches!(
            c.analyze_all_high_risk(&s, DEFAULT_BATCH_LIMIT).await,
            Err(AnalysisError::Disabled)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_system_analysis() {
        let stub = StubCompletion::new(
            Ok(r#"{"healthScore": 8, "summary": "ok", "predictions": ["calm"]}"#),
            Duration::from_secs(1),
        );
        let c = coordinator(&stub, None);
        let s = Snapshot::default();

        let (first, second) = tokio::join!(c.analyze_system(&s), c.analyze_system(&s));
        assert!(matches!(second, Err(AnalysisError::SystemBusy)));
        let first = first.unwrap();
        assert_eq!(first.health_score, 8);
        assert!(!c.system_analysis_running());
        assert_eq!(c.latest_insight(), Some(first.clone()));
        assert!(c.last_analysis().is_some());

        c.clear_insight();
        assert!(c.latest_insight().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_system_analysis_returns_latest() {
        let stub = StubCompletion::new(
            Ok(r#"{"healthScore": 7, "summary": "steady"}"#),
            Duration::from_secs(1),
        );
        let c = coordinator(&stub, None);
        let s = Snapshot::default();

        let earlier = c.analyze_system(&s).await.unwrap();
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);

        let (running, second) = tokio::join!(c.analyze_system(&s), c.analyze_system(&s));
        assert_eq!(second.unwrap(), earlier);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
        assert_eq!(running.unwrap().health_score, 7);
        assert!(!c.system_analysis_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_system_service_error() {
        let stub = StubCompletion::new(Err(500), Duration::ZERO);
        let c = coordinator(&stub, None);
        let record = c.analyze_system(&Snapshot::default()).await.unwrap();
        assert!(record.enabled);
        assert_eq!(record.error.as_deref(), Some("AI analysis failed"));
        assert_eq!(record.health_score, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_is_sequential_and_limited() {
        let stub = StubCompletion::new(Ok(SPIKE), Duration::from_millis(100));
        let c = coordinator(&stub, None);

        let mut s = Snapshot::default();
        s.processes = vec![
            process(1, 90.0),
            process(2, 5.0),
            process(3, 45.0),
            process(4, 60.0),
        ];
        s.processes[1].memory_usage = 600_000_000;

        let report = c.analyze_all_high_risk(&s, 3).await.unwrap();
        assert_eq!(report.completed, vec![1, 2, 3]);
        assert!(report.failed.is_empty());
        assert_eq!(stub.max_active.load(Ordering::SeqCst), 1);
        assert!(c.predictions_for(4).is_none());
    }
}
