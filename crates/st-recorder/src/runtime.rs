//! The live recorder loop.
//!
//! One task on a current-thread runtime interleaves the tick timer, the
//! autosave timer and incoming signals. Flushes run on the blocking pool
//! against a snapshot of the pending deltas, so storage latency never delays a
//! tick. At most one flush is in flight; a flush requested meanwhile runs
//! right after it completes.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::Instrument;
use uuid::Uuid;

use st_core::{ContentIdentityProvider, FlushReason, RecorderConfig, TimedSignal};
use st_store::{KvStore, Storage, StoreError};

use crate::scheduler::{FlushReport, FlushStatus, PersistenceScheduler, write_batch};
use crate::session::RecorderSession;

/// Storage shared between the loop and its blocking flushes.
pub type SharedStorage<K> = Arc<Mutex<Storage<K>>>;

/// Source of wall-clock time for ticks.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// How a live run ended.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub signals: usize,
    pub ticks: usize,
    pub flushes: usize,
    pub total_time: f64,
    pub effective_time: f64,
    pub unflushed_time: f64,
    pub fail_stopped: bool,
}

/// A live recorder.
pub struct Recorder<K, P, C> {
    storage: SharedStorage<K>,
    session: RecorderSession<P>,
    scheduler: PersistenceScheduler,
    clock: C,
    tick_interval: std::time::Duration,
    flush_interval: std::time::Duration,
    instance: Uuid,
    summary: RunSummary,
}

impl<K, P, C> Recorder<K, P, C>
where
    K: KvStore + Send + 'static,
    P: ContentIdentityProvider,
    C: Clock,
{
    pub fn new(storage: SharedStorage<K>, config: &RecorderConfig, identity: P, clock: C) -> Self {
        let started_at = clock.now();
        Self {
            storage,
            session: RecorderSession::new(config, identity, started_at),
            scheduler: PersistenceScheduler::new(),
            clock,
            tick_interval: config.tick_interval(),
            flush_interval: config.flush_interval(),
            instance: Uuid::new_v4(),
            summary: RunSummary::default(),
        }
    }

    /// Identifies this recorder in logs.
    pub const fn instance(&self) -> Uuid {
        self.instance
    }

    /// Records until the signal channel closes or an unload arrives, then
    /// flushes what is left.
    pub async fn run(self, signals: mpsc::Receiver<TimedSignal>) -> RunSummary {
        let span = tracing::info_span!("recorder", instance = %self.instance);
        self.run_loop(signals).instrument(span).await
    }

    async fn run_loop(mut self, mut signals: mpsc::Receiver<TimedSignal>) -> RunSummary {
        tracing::info!("recorder started");
        let mut tick = tokio::time::interval(self.tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let first_autosave = Instant::now()
            .checked_add(self.flush_interval)
            .unwrap_or_else(Instant::now);
        let mut autosave = tokio::time::interval_at(first_autosave, self.flush_interval);
        autosave.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut in_flight: Option<JoinHandle<FlushReport>> = None;
        let mut requested: Option<FlushReason> = None;

        while self.scheduler.is_active() {
            tokio::select! {
                _ = tick.tick() => {
                    self.session.tick(self.clock.now());
                    self.summary.ticks += 1;
                }
                _ = autosave.tick() => {
                    requested.get_or_insert(FlushReason::Interval);
                }
                received = signals.recv() => {
                    let Some(signal) = received else {
                        tracing::debug!("signal channel closed");
                        break;
                    };
                    self.summary.signals += 1;
                    if let Some(reason) = self.session.handle(&signal) {
                        if reason == FlushReason::Unload {
                            break;
                        }
                        requested = Some(reason);
                    }
                }
                joined = wait_for(&mut in_flight), if in_flight.is_some() => {
                    in_flight = None;
                    self.finish_flush(joined);
                }
            }

            if in_flight.is_none() {
                if let Some(reason) = requested.take() {
                    in_flight = self.start_flush(reason);
                }
            }
        }

        // Teardown: timers are dropped with this frame; wait out the flush
        // already running, then write whatever is left.
        if let Some(handle) = in_flight.take() {
            self.finish_flush(handle.await);
        }
        if let Some(handle) = self.start_flush(FlushReason::Unload) {
            self.finish_flush(handle.await);
        }

        let (total, effective, _) = self.session.totals();
        self.summary.total_time = total;
        self.summary.effective_time = effective;
        self.summary.unflushed_time = self.session.pending().total_time();
        self.summary.fail_stopped = !self.scheduler.is_active();
        tracing::info!(
            started_at = %self.session.started_at(),
            degraded = self.session.is_degraded(),
            ticks = self.summary.ticks,
            flushes = self.summary.flushes,
            total_secs = total,
            effective_secs = effective,
            "recorder stopped"
        );
        self.summary
    }

    /// Moves the pending deltas into a blocking flush task.
    fn start_flush(&mut self, reason: FlushReason) -> Option<JoinHandle<FlushReport>> {
        if !self.scheduler.is_active() || self.session.pending().is_empty() {
            return None;
        }
        let batch = self.session.take_pending();
        let storage = Arc::clone(&self.storage);
        Some(tokio::task::spawn_blocking(move || {
            let Ok(storage) = storage.lock() else {
                return FlushReport::failed(
                    reason,
                    batch,
                    StoreError::Unavailable("storage lock poisoned".to_string()),
                );
            };
            write_batch(&*storage, batch, reason)
        }))
    }

    fn finish_flush(&mut self, joined: Result<FlushReport, JoinError>) {
        let report = match joined {
            Ok(report) => report,
            Err(err) => {
                // The batch went down with the task.
                tracing::error!(error = %err, "flush task failed");
                return;
            }
        };
        let mut pending = self.session.take_pending();
        let status = self.scheduler.complete(report, &mut pending);
        self.session.restore(pending);
        if matches!(status, FlushStatus::Written { .. }) {
            self.summary.flushes += 1;
        }
    }
}

async fn wait_for(handle: &mut Option<JoinHandle<FlushReport>>) -> Result<FlushReport, JoinError> {
    match handle {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}
