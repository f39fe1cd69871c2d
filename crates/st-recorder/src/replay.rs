//! Deterministic replay of recorded signals.
//!
//! Instead of a wall clock, ticks are synthesized at the configured tick
//! interval between the first and last signal. Autosaves fire on the same
//! synthetic clock. Replaying the same input against an empty store always
//! produces the same records.

use chrono::{DateTime, Utc};
use serde::Serialize;

use st_core::{ContentIdentityProvider, FlushReason, RecorderConfig, TickOutcome, TimedSignal};
use st_store::{KvStore, Storage};

use crate::scheduler::{FlushStatus, PersistenceScheduler};
use crate::session::RecorderSession;

/// Summary of one replay.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub signals: usize,
    pub ticks: usize,
    pub anomalies: usize,
    pub flushes: usize,
    pub total_time: f64,
    pub effective_time: f64,
    pub longest_continuous_session: f64,
    /// Seconds that could not be persisted.
    pub unflushed_time: f64,
    pub fail_stopped: bool,
}

/// Replays `signals` into `storage`.
///
/// Signals are ordered by timestamp first; equal timestamps keep input order.
/// A tick due at the same instant as a signal runs before it.
pub fn replay<K, P>(
    storage: &Storage<K>,
    config: &RecorderConfig,
    identity: P,
    signals: impl IntoIterator<Item = TimedSignal>,
) -> ReplayReport
where
    K: KvStore,
    P: ContentIdentityProvider,
{
    let mut signals: Vec<TimedSignal> = signals.into_iter().collect();
    signals.sort_by_key(|s| s.at);
    let Some(start) = signals.first().map(|s| s.at) else {
        return ReplayReport::default();
    };

    let mut driver = Driver {
        storage,
        session: RecorderSession::new(config, identity, start),
        scheduler: PersistenceScheduler::new(),
        report: ReplayReport::default(),
        tick_period: config.tick_period(),
        flush_period: config.flush_period(),
        next_tick: start,
        next_flush: later(start, config.flush_period()),
    };

    for signal in &signals {
        driver.advance_to(signal.at);
        driver.report.signals += 1;
        if let Some(reason) = driver.session.handle(signal) {
            driver.flush(reason);
        }
    }
    driver.flush(FlushReason::Unload);
    driver.finish()
}

fn later(at: DateTime<Utc>, by: chrono::Duration) -> DateTime<Utc> {
    at.checked_add_signed(by).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

struct Driver<'s, K, P> {
    storage: &'s Storage<K>,
    session: RecorderSession<P>,
    scheduler: PersistenceScheduler,
    report: ReplayReport,
    tick_period: chrono::Duration,
    flush_period: chrono::Duration,
    next_tick: DateTime<Utc>,
    next_flush: DateTime<Utc>,
}

impl<K: KvStore, P: ContentIdentityProvider> Driver<'_, K, P> {
    /// Runs every tick and autosave due at or before `until`.
    fn advance_to(&mut self, until: DateTime<Utc>) {
        while self.next_tick <= until && self.scheduler.is_active() {
            let at = self.next_tick;
            self.report.ticks += 1;
            if matches!(self.session.tick(at), TickOutcome::Anomaly { .. }) {
                self.report.anomalies += 1;
            }
            if at >= self.next_flush {
                self.flush(FlushReason::Interval);
                self.next_flush = later(at, self.flush_period);
            }
            self.next_tick = later(at, self.tick_period);
        }
    }

    fn flush(&mut self, reason: FlushReason) {
        let mut pending = self.session.take_pending();
        let status = self.scheduler.flush_now(self.storage, &mut pending, reason);
        self.session.restore(pending);
        if matches!(status, FlushStatus::Written { .. }) {
            self.report.flushes += 1;
        }
    }

    fn finish(mut self) -> ReplayReport {
        let (total, effective, longest) = self.session.totals();
        self.report.total_time = total;
        self.report.effective_time = effective;
        self.report.longest_continuous_session = longest;
        self.report.unflushed_time = self.session.pending().total_time();
        self.report.fail_stopped = !self.scheduler.is_active();
        tracing::info!(
            signals = self.report.signals,
            ticks = self.report.ticks,
            flushes = self.report.flushes,
            total_secs = total,
            effective_secs = effective,
            "replay finished"
        );
        self.report
    }
}
