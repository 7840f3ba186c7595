//! The service object tying polling, history, alerts and analysis together.

use crate::alerts::{
    self, build_feed, derive_alerts, filter_feed, hourly_buckets, overall_status, trend_stats,
    AlertFilter, AlertSummary, FeedFilter, FeedItem, HealthStatus, HourlyBucket, Thresholds,
    TrendStats, DEFAULT_TREND_HOURS,
};
use crate::config::MonitorConfig;
use crate::format::{analysis_age_text, update_age_text};
use crate::history::{HistorySet, Sample, SeriesKey};
use crate::insight::{AnalysisError, BatchReport, InsightCoordinator, TextCompletion};
use crate::model::{AlertRecord, InsightRecord, ProcessPrediction, Snapshot};
use crate::processes::{self, ProcessQuery, ProcessRow};
use crate::scheduler::{PollEvent, PollStatus, PollingScheduler};
use crate::source::SampleSource;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, RwLock, Weak};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStatus {
    #[serde(flatten)]
    pub poll: PollStatus,
    pub last_update_text: String,
    pub health: Option<HealthStatus>,
    pub ai_enabled: bool,
    pub system_analysis_running: bool,
    pub analyzing: BTreeSet<u32>,
    pub last_analysis_text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesView {
    pub series: String,
    pub capacity: usize,
    pub average: f64,
    pub peak: f64,
    pub samples: Vec<Sample>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertsView {
    pub counts: AlertSummary,
    pub alerts: Vec<AlertRecord>,
    /// Threshold crossings computed locally from the latest snapshot.
    pub derived: Vec<AlertRecord>,
    pub feed: Vec<FeedItem>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendView {
    pub buckets: Vec<HourlyBucket>,
    #[serde(flatten)]
    pub stats: TrendStats,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionsView {
    pub by_pid: HashMap<u32, Vec<ProcessPrediction>>,
    pub history: Vec<ProcessPrediction>,
    pub analyzing: BTreeSet<u32>,
}

#[derive(Default)]
struct Latest {
    snapshot: Option<Arc<Snapshot>>,
    history: HistorySet,
}

pub struct Monitor {
    config: MonitorConfig,
    thresholds: Thresholds,
    scheduler: PollingScheduler,
    coordinator: InsightCoordinator,
    latest: RwLock<Latest>,
    ingest_task: Mutex<Option<JoinHandle<()>>>,
}

impl Monitor {
    pub fn new(
        config: MonitorConfig,
        source: Arc<dyn SampleSource>,
        ai: Option<Arc<dyn TextCompletion>>,
    ) -> Arc<Self> {
        let ai_timeout = config.ai.as_ref().map(|a| a.timeout);
        Arc::new(Self {
            scheduler: PollingScheduler::new(source, config.poll_interval),
            coordinator: InsightCoordinator::new(ai, ai_timeout),
            thresholds: Thresholds::default(),
            latest: RwLock::new(Latest::default()),
            ingest_task: Mutex::new(None),
            config,
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Start polling and the task that folds snapshots into history.
    pub fn start(self: &Arc<Self>) {
        {
            let mut task = self.ingest_task.lock().unwrap();
            if task.is_none() {
                let rx = self.scheduler.subscribe();
                *task = Some(tokio::spawn(run_ingest(Arc::downgrade(self), rx)));
            }
        }
        self.scheduler.start();
    }

    pub fn stop(&self) {
        self.scheduler.stop();
        if let Some(task) = self.ingest_task.lock().unwrap().take() {
            task.abort();
        }
    }

    /// Accept one snapshot: it becomes the latest and feeds every series.
    pub fn ingest(&self, snapshot: Arc<Snapshot>) {
        let mut latest = self.latest.write().unwrap();
        latest.history.record(&snapshot, Utc::now());
        latest.snapshot = Some(snapshot);
    }

    pub fn refresh(&self) -> bool {
        self.scheduler.refresh_now()
    }

    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.latest.read().unwrap().snapshot.clone()
    }

    fn require_snapshot(&self) -> Result<Arc<Snapshot>, AnalysisError> {
        self.snapshot().ok_or(AnalysisError::NoSnapshot)
    }

    pub fn status(&self) -> MonitorStatus {
        let now = Utc::now();
        let poll = self.scheduler.status();
        let health = self.snapshot().map(|s| {
            overall_status(s.dashboard.cpu_usage, s.dashboard.memory_usage, &self.thresholds)
        });
        MonitorStatus {
            last_update_text: update_age_text(poll.last_update, now),
            poll,
            health,
            ai_enabled: self.coordinator.is_enabled(),
            system_analysis_running: self.coordinator.system_analysis_running(),
            analyzing: self.coordinator.analyzing(),
            last_analysis_text: analysis_age_text(self.coordinator.last_analysis(), now),
        }
    }

    pub fn history(&self, key: SeriesKey) -> SeriesView {
        let latest = self.latest.read().unwrap();
        let (capacity, average, peak) = match latest.history.get(key) {
            Some(buf) => (buf.capacity(), buf.average(), buf.peak()),
            None => (key.default_capacity(), 0.0, 0.0),
        };
        SeriesView {
            series: key.to_string(),
            capacity,
            average,
            peak,
            samples: latest.history.snapshot(key),
        }
    }

    pub fn series(&self) -> Vec<SeriesKey> {
        self.latest.read().unwrap().history.keys()
    }

    pub fn alerts(&self, filter: AlertFilter, feed_filter: FeedFilter) -> AlertsView {
        let snapshot = self.snapshot().unwrap_or_default();
        let classified = alerts::classify(&snapshot.alerts);
        let insight = self.coordinator.latest_insight();
        let feed = build_feed(&snapshot.alerts, insight.as_ref());

        AlertsView {
            counts: classified.counts,
            alerts: classified.filtered(filter),
            derived: derive_alerts(&snapshot, &self.thresholds, Utc::now()),
            feed: filter_feed(&feed, feed_filter),
        }
    }

    pub fn alert_trend(&self, now: DateTime<Utc>) -> TrendView {
        let snapshot = self.snapshot().unwrap_or_default();
        let buckets = hourly_buckets(&snapshot.alerts, now, DEFAULT_TREND_HOURS);
        TrendView {
            stats: trend_stats(&buckets),
            buckets,
        }
    }

    pub fn processes(&self, query: &ProcessQuery) -> Vec<ProcessRow> {
        match self.snapshot() {
            Some(s) => processes::query(&s.processes, query),
            None => Vec::new(),
        }
    }

    pub fn insight(&self) -> Option<InsightRecord> {
        self.coordinator.latest_insight()
    }

    pub fn clear_insight(&self) {
        self.coordinator.clear_insight();
    }

    pub async fn analyze_system(&self) -> Result<InsightRecord, AnalysisError> {
        let snapshot = self.require_snapshot()?;
        self.coordinator.analyze_system(&snapshot).await
    }

    pub async fn analyze_process(&self, pid: u32) -> Result<Vec<ProcessPrediction>, AnalysisError> {
        let snapshot = self.require_snapshot()?;
        let process = snapshot
            .process(pid)
            .cloned()
            .ok_or(AnalysisError::UnknownProcess(pid))?;
        self.coordinator.analyze_process(&process, &snapshot).await
    }

    pub async fn analyze_high_risk(&self) -> Result<BatchReport, AnalysisError> {
        let snapshot = self.require_snapshot()?;
        self.coordinator
            .analyze_all_high_risk(&snapshot, self.config.batch_limit)
            .await
    }

    pub fn predictions(&self) -> PredictionsView {
        PredictionsView {
            by_pid: self.coordinator.predictions(),
            history: self.coordinator.history(),
            analyzing: self.coordinator.analyzing(),
        }
    }
}

async fn run_ingest(monitor: Weak<Monitor>, mut rx: tokio::sync::broadcast::Receiver<PollEvent>) {
    info!("Monitor: ingest task started");
    loop {
        match rx.recv().await {
            Ok(PollEvent::Snapshot(snapshot)) => {
                let Some(monitor) = monitor.upgrade() else {
                    break;
                };
                debug!("Monitor: ingesting snapshot #{}", snapshot.sequence);
                monitor.ingest(snapshot);
            }
            Ok(PollEvent::Failed(kind)) => {
                debug!("Monitor: poll failed ({}), keeping last snapshot", kind);
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!("Monitor: ingest lagged, {} snapshots skipped", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
    info!("Monitor: ingest task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AlertLevel, ProcessSample};
    use crate::source::SourceError;
    use async_trait::async_trait;
    use std::time::Duration;

    struct FixedSource(Snapshot);

    #[async_trait]
    impl SampleSource for FixedSource {
        async fn fetch(&self) -> Result<Snapshot, SourceError> {
            Ok(self.0.clone())
        }
    }

    fn busy_snapshot() -> Snapshot {
        let mut s = Snapshot::default();
        s.dashboard.cpu_usage = 95.0;
        s.dashboard.memory_usage = 50.0;
        s.cpu.per_core_usage = vec![0.9, 0.1];
        s.processes.push(ProcessSample {
            pid: 42,
            name: "java".to_string(),
            cpu_usage: 80.0,
            memory_usage: 2_000_000_000,
            thread_count: 60,
            state: "RUNNING".to_string(),
        });
        s.alerts.push(AlertRecord {
            alert_type: "CPU".to_string(),
            level: AlertLevel::Critical,
            message: "CPU usage critical: 95.0%".to_string(),
            ..Default::default()
        });
        s
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_feeds_history() {
        let source = Arc::new(FixedSource(busy_snapshot()));
        let monitor = Monitor::new(MonitorConfig::default(), source, None);
        monitor.start();

        tokio::time::sleep(Duration::from_millis(6500)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        let status = monitor.status();
        assert!(status.poll.connected);
        assert_eq!(status.poll.poll_count, 3);
        assert_eq!(status.health, Some(HealthStatus::Critical));

        let cpu = monitor.history(SeriesKey::Cpu);
        assert_eq!(cpu.samples.len(), 3);
        assert_eq!(cpu.peak, 95.0);
        assert_eq!(monitor.history(SeriesKey::Core(0)).samples[0].value, 90.0);
        assert_eq!(monitor.snapshot().unwrap().sequence, 3);

        monitor.stop();
        assert!(!monitor.status().poll.running);
    }

    #[tokio::test]
    async fn test_views_over_ingested_snapshot() {
        let monitor = Monitor::new(
            MonitorConfig::default(),
            Arc::new(FixedSource(Snapshot::default())),
            None,
        );
        assert!(matches!(
            monitor.analyze_system().await,
            Err(AnalysisError::NoSnapshot)
        ));

        monitor.ingest(Arc::new(busy_snapshot()));

        let view = monitor.alerts(AlertFilter::All, FeedFilter::All);
        assert_eq!(view.counts.critical, 1);
        assert_eq!(view.derived.len(), 1);
        assert_eq!(view.feed.len(), 1);

        let rows = monitor.processes(&ProcessQuery::default());
        assert_eq!(rows[0].risk_score, 100);
        assert!(rows[0].high_risk);

        let record = monitor.analyze_system().await.unwrap();
        assert!(!record.enabled);
        // cpu 95 costs 4, one critical alert costs 2
        assert_eq!(record.health_score, 4);
        assert_eq!(monitor.insight(), Some(record));

        assert!(matches!(
            monitor.analyze_process(7).await,
            Err(AnalysisError::UnknownProcess(7))
        ));
        assert!(matches!(
            monitor.analyze_process(42).await,
            Err(AnalysisError::Disabled)
        ));
        assert_eq!(monitor.alert_trend(Utc::now()).stats.peak_count, 1);
    }
}
