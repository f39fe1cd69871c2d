//! Retention sweep for old day records.
//!
//! Only day records are purged. The video index and the summaries keep
//! counting time whose day records are gone.

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::{KvStore, Storage, StoreError};

/// How long day records are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub keep_days: u32,
}

/// What a sweep removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    /// Records dated before this were removed.
    pub cutoff: Option<NaiveDate>,
    pub days_removed: usize,
    pub shards_removed: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self { keep_days: 365 }
    }
}

impl RetentionPolicy {
    pub const fn new(keep_days: u32) -> Self {
        Self { keep_days }
    }

    /// Oldest date kept when sweeping on `today`.
    pub fn cutoff(self, today: NaiveDate) -> NaiveDate {
        today
            .checked_sub_signed(Duration::days(i64::from(self.keep_days)))
            .unwrap_or(NaiveDate::MIN)
    }

    /// Removes day records older than the cutoff.
    ///
    /// Only weeks starting before the cutoff are read. A week left empty is
    /// deleted; the week straddling the cutoff is rewritten without the
    /// expired days.
    pub fn sweep<K: KvStore>(
        self,
        storage: &Storage<K>,
        today: NaiveDate,
    ) -> Result<SweepReport, StoreError> {
        let cutoff = self.cutoff(today);
        let shards = storage.shards();
        let mut report = SweepReport {
            cutoff: Some(cutoff),
            ..SweepReport::default()
        };

        for week in shards.weeks()? {
            let Some(monday) = week.monday() else {
                continue;
            };
            if monday >= cutoff {
                break;
            }
            let key = week.key();
            let mut shard = shards.get_week(&key)?;
            let before = shard.len();
            shard.retain(|date, _| *date >= cutoff);
            let removed = before - shard.len();
            if removed == 0 {
                continue;
            }
            if shard.is_empty() {
                shards.remove_week(&key)?;
                report.shards_removed += 1;
            } else {
                shards.put_week(&key, &shard)?;
            }
            report.days_removed += removed;
        }

        tracing::info!(
            %cutoff,
            days_removed = report.days_removed,
            shards_removed = report.shards_removed,
            "retention sweep finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use st_core::DayDelta;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(storage: &Storage<crate::MemoryKv>, day: NaiveDate) {
        let delta = DayDelta {
            total_time: 60.0,
            ..DayDelta::default()
        };
        storage.shards().save_day(day, |r| r.apply(&delta)).unwrap();
        storage.summaries().update(day, &delta, true).unwrap();
    }

    #[test]
    fn sweep_drops_old_weeks_and_trims_the_boundary_week() {
        let storage = Storage::in_memory();
        // 2025-01-08 is a Wednesday; the cutoff lands mid-week.
        for day in [
            date(2024, 12, 20),
            date(2025, 1, 6),
            date(2025, 1, 7),
            date(2025, 1, 9),
            date(2025, 2, 1),
        ] {
            record(&storage, day);
        }

        let report = RetentionPolicy::new(30)
            .sweep(&storage, date(2025, 2, 7))
            .unwrap();
        assert_eq!(report.cutoff, Some(date(2025, 1, 8)));
        assert_eq!(report.days_removed, 3);
        assert_eq!(report.shards_removed, 1);

        let remaining: Vec<_> = storage
            .shards()
            .all_days()
            .unwrap()
            .into_iter()
            .map(|r| r.date)
            .collect();
        assert_eq!(remaining, vec![date(2025, 1, 9), date(2025, 2, 1)]);

        // Rollups are not reversed.
        let global = storage.summaries().get_global().unwrap();
        assert!((global.total_all_time - 300.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sweep_on_empty_store_is_a_no_op() {
        let storage = Storage::in_memory();
        let report = RetentionPolicy::default()
            .sweep(&storage, date(2025, 1, 1))
            .unwrap();
        assert_eq!(report.days_removed, 0);
        assert_eq!(report.shards_removed, 0);
    }
}
