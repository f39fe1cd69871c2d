//! Flushing pending deltas to storage.
//!
//! A flush is a batch of per-day deltas. For each day the shard record is
//! read, the delta added and the shard written back; only after that write
//! succeeds are the video index and the summaries updated. Those two are
//! best-effort: their failures are logged and not retried, since retrying would
//! also re-add the day delta.
//!
//! The first failed day write stops the batch. That day and every later one
//! go back to the session, so nothing is counted twice and at most one flush
//! interval is lost on a crash.

use st_core::{FlushReason, PendingDeltas};
use st_store::{KvStore, Storage, StoreError};

/// Outcome of writing one batch.
#[derive(Debug)]
pub struct FlushReport {
    pub reason: FlushReason,
    pub days_written: usize,
    /// Wall-clock seconds persisted by this batch.
    pub seconds_written: f64,
    /// Deltas that were not written and must be retried.
    pub retained: PendingDeltas,
    /// The error that stopped the batch, if any.
    pub failure: Option<StoreError>,
}

impl FlushReport {
    /// A batch that could not be attempted at all.
    pub fn failed(reason: FlushReason, batch: PendingDeltas, error: StoreError) -> Self {
        Self {
            reason,
            days_written: 0,
            seconds_written: 0.0,
            retained: batch,
            failure: Some(error),
        }
    }
}

/// Writes a batch of deltas, day by day in date order.
pub fn write_batch<K: KvStore>(
    storage: &Storage<K>,
    batch: PendingDeltas,
    reason: FlushReason,
) -> FlushReport {
    let mut report = FlushReport {
        reason,
        days_written: 0,
        seconds_written: 0.0,
        retained: PendingDeltas::default(),
        failure: None,
    };

    for (date, delta) in batch {
        if delta.is_empty() {
            continue;
        }
        if report.failure.is_some() {
            report.retained.restore(date, delta);
            continue;
        }

        let save = match storage.shards().save_day(date, |record| record.apply(&delta)) {
            Ok(save) => save,
            Err(err) => {
                report.retained.restore(date, delta);
                report.failure = Some(err);
                continue;
            }
        };
        report.days_written += 1;
        report.seconds_written += delta.total_time;

        let videos = delta
            .videos
            .iter()
            .map(|(id, video)| (id, video.title.as_deref()));
        if let Err(err) = storage.videos().update_many(date, videos) {
            tracing::warn!(%date, error = %err, "failed to update video index");
        }
        if let Err(err) = storage.summaries().update(date, &delta, save.became_active()) {
            tracing::warn!(%date, error = %err, "failed to update summaries");
        }
    }

    report
}

/// What a completed flush means for the recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushStatus {
    /// Nothing was pending.
    Idle,
    Written { days: usize },
    /// Storage refused the write; the deltas are kept for the next attempt.
    Retrying,
    /// Storage is gone for good; no further flushes will be attempted.
    FailStopped,
}

/// Tracks flush health across a recorder's lifetime.
#[derive(Debug, Default)]
pub struct PersistenceScheduler {
    stopped: bool,
    consecutive_failures: u32,
    flushes: usize,
}

impl PersistenceScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether flushes may still be attempted.
    pub const fn is_active(&self) -> bool {
        !self.stopped
    }

    /// Successful flushes so far.
    pub const fn flushes(&self) -> usize {
        self.flushes
    }

    /// Folds a finished flush back into the recorder state.
    ///
    /// Retained deltas are merged into `pending`, on top of anything that
    /// accumulated while the flush was running.
    pub fn complete(&mut self, report: FlushReport, pending: &mut PendingDeltas) -> FlushStatus {
        pending.merge(report.retained);

        let Some(err) = report.failure else {
            self.consecutive_failures = 0;
            if report.days_written == 0 {
                return FlushStatus::Idle;
            }
            self.flushes += 1;
            tracing::debug!(
                reason = report.reason.as_str(),
                days = report.days_written,
                seconds = report.seconds_written,
                "flushed study time"
            );
            return FlushStatus::Written {
                days: report.days_written,
            };
        };

        if err.is_fatal() {
            if !self.stopped {
                self.stopped = true;
                tracing::error!(
                    error = %err,
                    unflushed_seconds = pending.total_time(),
                    "storage is unavailable, recording stopped"
                );
            }
            return FlushStatus::FailStopped;
        }

        self.consecutive_failures += 1;
        tracing::warn!(
            reason = report.reason.as_str(),
            error = %err,
            attempt = self.consecutive_failures,
            "flush failed, keeping deltas for the next attempt"
        );
        FlushStatus::Retrying
    }

    /// Takes everything pending, writes it and folds the outcome back in.
    ///
    /// Does nothing once fail-stopped.
    pub fn flush_now<K: KvStore>(
        &mut self,
        storage: &Storage<K>,
        pending: &mut PendingDeltas,
        reason: FlushReason,
    ) -> FlushStatus {
        if self.stopped {
            return FlushStatus::FailStopped;
        }
        if pending.is_empty() {
            return FlushStatus::Idle;
        }
        let report = write_batch(storage, pending.take(), reason);
        self.complete(report, pending)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use chrono::{NaiveDate, TimeZone, Utc};
    use st_core::ContentId;
    use st_store::MemoryKv;

    use super::*;

    /// Fails the next `failures` writes with the given error.
    struct FailingKv {
        inner: MemoryKv,
        failures: AtomicU32,
        fatal: bool,
    }

    impl FailingKv {
        fn new(failures: u32, fatal: bool) -> Self {
            Self {
                inner: MemoryKv::default(),
                failures: AtomicU32::new(failures),
                fatal,
            }
        }
    }

    impl KvStore for FailingKv {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(if self.fatal {
                    StoreError::Unavailable("extension context invalidated".to_string())
                } else {
                    StoreError::Transient("quota exceeded".to_string())
                });
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StoreError> {
            self.inner.remove(key)
        }

        fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
            self.inner.keys_with_prefix(prefix)
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn pending(days: &[(u32, f64)]) -> PendingDeltas {
        let mut pending = PendingDeltas::default();
        for &(d, seconds) in days {
            let day = pending.day_mut(date(d));
            day.total_time += seconds;
            day.effective_time += seconds;
            day.credit_video(
                &ContentId::new("BV1").unwrap(),
                Some("Optics"),
                seconds,
                Utc.with_ymd_and_hms(2025, 1, d, 9, 0, 0).unwrap(),
            );
        }
        pending
    }

    fn stored_total<K: KvStore>(storage: &Storage<K>, d: u32) -> f64 {
        storage
            .shards()
            .get_day(date(d))
            .unwrap()
            .map_or(0.0, |r| r.total_time)
    }

    #[test]
    fn flush_writes_day_index_and_summaries() {
        let storage = Storage::in_memory();
        let mut scheduler = PersistenceScheduler::new();
        let mut queue = pending(&[(6, 30.0), (7, 15.0)]);

        let status = scheduler.flush_now(&storage, &mut queue, FlushReason::Interval);
        assert_eq!(status, FlushStatus::Written { days: 2 });
        assert!(queue.is_empty());
        assert!((stored_total(&storage, 6) - 30.0).abs() < f64::EPSILON);
        assert_eq!(
            storage
                .videos()
                .get_video_dates(&ContentId::new("BV1").unwrap())
                .unwrap(),
            vec![date(6), date(7)]
        );
        let global = storage.summaries().get_global().unwrap();
        assert_eq!(global.total_days_active, 2);
    }

    #[test]
    fn repeated_flushes_add_deltas_not_totals() {
        let storage = Storage::in_memory();
        let mut scheduler = PersistenceScheduler::new();
        let mut queue = pending(&[(6, 30.0)]);
        scheduler.flush_now(&storage, &mut queue, FlushReason::Interval);
        queue = pending(&[(6, 30.0)]);
        scheduler.flush_now(&storage, &mut queue, FlushReason::Pause);

        assert!((stored_total(&storage, 6) - 60.0).abs() < f64::EPSILON);
        let month = storage.summaries().get_month(2025, 1).unwrap();
        assert_eq!(month.days_with_activity, 1);
        assert!((month.total_time - 60.0).abs() < f64::EPSILON);
        assert_eq!(scheduler.flushes(), 2);
    }

    #[test]
    fn day_counts_once_when_counters_flush_before_time() {
        let storage = Storage::in_memory();
        let mut scheduler = PersistenceScheduler::new();
        let mut queue = PendingDeltas::default();
        queue.day_mut(date(6)).tab_switch_count += 1;
        scheduler.flush_now(&storage, &mut queue, FlushReason::Pause);

        let month = storage.summaries().get_month(2025, 1).unwrap();
        assert_eq!(month.days_with_activity, 0);

        queue = pending(&[(6, 20.0)]);
        scheduler.flush_now(&storage, &mut queue, FlushReason::Interval);
        queue = pending(&[(6, 5.0)]);
        scheduler.flush_now(&storage, &mut queue, FlushReason::Interval);

        let month = storage.summaries().get_month(2025, 1).unwrap();
        assert_eq!(month.days_with_activity, 1);
        let global = storage.summaries().get_global().unwrap();
        assert_eq!(global.total_days_active, 1);
        assert!((global.total_all_time - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_queue_is_idle() {
        let storage = Storage::in_memory();
        let mut scheduler = PersistenceScheduler::new();
        let mut queue = PendingDeltas::default();
        let _ = queue.day_mut(date(6));
        assert_eq!(
            scheduler.flush_now(&storage, &mut queue, FlushReason::Unload),
            FlushStatus::Idle
        );
        assert!(storage.kv().is_empty());
    }

    #[test]
    fn transient_failure_keeps_deltas_for_retry() {
        let storage = Storage::new(FailingKv::new(1, false));
        let mut scheduler = PersistenceScheduler::new();
        let mut queue = pending(&[(6, 30.0), (7, 10.0)]);

        let status = scheduler.flush_now(&storage, &mut queue, FlushReason::Interval);
        assert_eq!(status, FlushStatus::Retrying);
        assert!(scheduler.is_active());
        assert!((queue.total_time() - 40.0).abs() < f64::EPSILON);
        assert!(stored_total(&storage, 7).abs() < f64::EPSILON);

        // More time accrues before the retry.
        queue.merge(pending(&[(7, 5.0)]));
        let status = scheduler.flush_now(&storage, &mut queue, FlushReason::Interval);
        assert_eq!(status, FlushStatus::Written { days: 2 });
        assert!((stored_total(&storage, 6) - 30.0).abs() < f64::EPSILON);
        assert!((stored_total(&storage, 7) - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn retained_batch_merges_with_deltas_accrued_in_flight() {
        let storage = Storage::new(FailingKv::new(1, false));
        let mut scheduler = PersistenceScheduler::new();
        let mut queue = pending(&[(6, 30.0)]);

        let batch = queue.take();
        queue.merge(pending(&[(6, 2.0)]));
        let report = write_batch(&storage, batch, FlushReason::Interval);
        assert_eq!(scheduler.complete(report, &mut queue), FlushStatus::Retrying);
        assert!((queue.total_time() - 32.0).abs() < f64::EPSILON);
    }

    #[test]
    fn fatal_failure_stops_all_writes() {
        let storage = Storage::new(FailingKv::new(1, true));
        let mut scheduler = PersistenceScheduler::new();
        let mut queue = pending(&[(6, 30.0)]);

        assert_eq!(
            scheduler.flush_now(&storage, &mut queue, FlushReason::Interval),
            FlushStatus::FailStopped
        );
        assert!(!scheduler.is_active());

        // The store would accept writes now, but the scheduler no longer tries.
        assert_eq!(
            scheduler.flush_now(&storage, &mut queue, FlushReason::Unload),
            FlushStatus::FailStopped
        );
        assert!(stored_total(&storage, 6).abs() < f64::EPSILON);
    }

    #[test]
    fn index_failure_does_not_retain_the_day() {
        // The day write succeeds, the index write fails.
        struct IndexFails(MemoryKv);
        impl KvStore for IndexFails {
            fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
                self.0.get(key)
            }
            fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
                if key == st_store::VIDEO_INDEX_KEY {
                    return Err(StoreError::Transient("quota exceeded".to_string()));
                }
                self.0.set(key, value)
            }
            fn remove(&self, key: &str) -> Result<(), StoreError> {
                self.0.remove(key)
            }
            fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
                self.0.keys_with_prefix(prefix)
            }
        }

        let storage = Storage::new(IndexFails(MemoryKv::default()));
        let mut scheduler = PersistenceScheduler::new();
        let mut queue = pending(&[(6, 30.0)]);
        assert_eq!(
            scheduler.flush_now(&storage, &mut queue, FlushReason::Interval),
            FlushStatus::Written { days: 1 }
        );
        assert!(queue.is_empty());
        assert!((storage.summaries().get_global().unwrap().total_all_time - 30.0).abs() < f64::EPSILON);
    }
}
