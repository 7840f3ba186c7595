//! Scheduler module for polling the metrics source.

use crate::model::Snapshot;
use crate::source::{FailureKind, SampleSource};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

const EVENT_CHANNEL_DEPTH: usize = 64;

/// What subscribers receive after each fetch.
#[derive(Debug, Clone)]
pub enum PollEvent {
    Snapshot(Arc<Snapshot>),
    Failed(FailureKind),
}

/// Connectivity state owned by the scheduler.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollStatus {
    pub connected: bool,
    pub running: bool,
    pub last_update: Option<DateTime<Utc>>,
    pub poll_count: u64,
    pub last_failure: Option<FailureKind>,
}

struct Shared {
    source: Arc<dyn SampleSource>,
    status: Mutex<PollStatus>,
    in_flight: AtomicBool,
    /// Bumped on every start and stop; a fetch only publishes if the
    /// generation it started under is still current.
    generation: AtomicU64,
    events: broadcast::Sender<PollEvent>,
}

/// Holds the single in-flight slot until dropped.
struct InFlight(Arc<Shared>);

impl InFlight {
    fn try_begin(shared: &Arc<Shared>) -> Option<Self> {
        shared
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(shared.clone()))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.store(false, Ordering::Release);
    }
}

/// Drives a [`SampleSource`] on a fixed interval.
///
/// Failures never stop the loop and never change the interval. At most one
/// fetch is in flight; ticks and [`refresh_now`](Self::refresh_now) share
/// the same guard.
pub struct PollingScheduler {
    shared: Arc<Shared>,
    interval: Duration,
    stop: Mutex<Option<broadcast::Sender<()>>>,
}

impl PollingScheduler {
    pub fn new(source: Arc<dyn SampleSource>, interval: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_DEPTH);
        Self {
            shared: Arc::new(Shared {
                source,
                status: Mutex::new(PollStatus::default()),
                in_flight: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                events,
            }),
            interval,
            stop: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PollEvent> {
        self.shared.events.subscribe()
    }

    pub fn status(&self) -> PollStatus {
        self.shared.status.lock().unwrap().clone()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_fetching(&self) -> bool {
        self.shared.in_flight.load(Ordering::Acquire)
    }

    /// Start the fetch-then-wait loop. Calling it while running is a no-op.
    pub fn start(&self) {
        let mut stop = self.stop.lock().unwrap();
        if stop.is_some() {
            return;
        }

        let (stop_tx, stop_rx) = broadcast::channel(1);
        *stop = Some(stop_tx);
        drop(stop);

        let generation = self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.shared.status.lock().unwrap().running = true;

        tracing::info!(
            "Scheduler: polling {} every {:?}",
            self.shared.source.describe(),
            self.interval
        );

        tokio::spawn(run_poll_loop(
            self.shared.clone(),
            self.interval,
            generation,
            stop_rx,
        ));
    }

    /// Cancel the timer. An in-flight fetch is not aborted, but its result is
    /// discarded.
    pub fn stop(&self) {
        let stop = self.stop.lock().unwrap().take();
        if let Some(stop_tx) = stop {
            self.shared.generation.fetch_add(1, Ordering::AcqRel);
            self.shared.status.lock().unwrap().running = false;
            let _ = stop_tx.send(());
            tracing::info!("Scheduler: stopped");
        }
    }

    /// Trigger an out-of-band fetch.
    ///
    /// Returns `false` without doing anything when the scheduler is stopped
    /// or a fetch is already in flight.
    pub fn refresh_now(&self) -> bool {
        if self.stop.lock().unwrap().is_none() {
            return false;
        }
        let guard = match InFlight::try_begin(&self.shared) {
            Some(g) => g,
            None => {
                tracing::debug!("Scheduler: refresh ignored, fetch already in flight");
                return false;
            }
        };

        let generation = self.shared.generation.load(Ordering::Acquire);
        tracing::info!("Scheduler: manual refresh requested");
        tokio::spawn(run_fetch(guard, generation));
        true
    }
}

impl Drop for PollingScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_poll_loop(
    shared: Arc<Shared>,
    period: Duration,
    generation: u64,
    mut stop_rx: broadcast::Receiver<()>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stop_rx.recv() => {
                break;
            }
            _ = interval.tick() => {
                match InFlight::try_begin(&shared) {
                    Some(guard) => run_fetch(guard, generation).await,
                    None => {
                        tracing::debug!("Scheduler: skipping tick, fetch already in flight");
                    }
                }
            }
        }
    }
}

/// Perform one fetch and publish its outcome. The guard is released only
/// after publishing so completion order always matches issue order.
async fn run_fetch(guard: InFlight, generation: u64) {
    let shared = guard.0.clone();
    let result = shared.source.fetch().await;

    if shared.generation.load(Ordering::Acquire) != generation {
        tracing::debug!("Scheduler: discarding result that arrived after stop");
        return;
    }

    match result {
        Ok(mut snapshot) => {
            {
                let mut status = shared.status.lock().unwrap();
                status.connected = true;
                status.last_update = Some(Utc::now());
                status.poll_count += 1;
                snapshot.sequence = status.poll_count;
            }
            tracing::debug!("Scheduler: poll #{} succeeded", snapshot.sequence);
            let _ = shared.events.send(PollEvent::Snapshot(Arc::new(snapshot)));
        }
        Err(e) => {
            let kind = e.kind();
            match kind {
                FailureKind::NoResponse => {
                    tracing::warn!("Scheduler: no response from metrics backend: {}", e)
                }
                FailureKind::HttpError { status } => {
                    tracing::warn!("Scheduler: metrics backend returned HTTP {}", status)
                }
                FailureKind::ParseError => {
                    tracing::warn!("Scheduler: could not parse metrics response: {}", e)
                }
            }
            {
                let mut status = shared.status.lock().unwrap();
                status.connected = false;
                status.last_failure = Some(kind);
            }
            let _ = shared.events.send(PollEvent::Failed(kind));
        }
    }

    drop(guard);
}
