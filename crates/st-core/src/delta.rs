//! Unflushed activity deltas.
//!
//! A recorder never writes its running totals. It keeps what happened since the
//! last successful flush, keyed by calendar day, and the store adds that delta to
//! whatever is already persisted. Merging is additive, so a failed flush can hand
//! its batch back and have it folded into whatever accumulated meanwhile.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};

use crate::types::ContentId;

/// Activity for one calendar day that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DayDelta {
    pub total_time: f64,
    pub effective_time: f64,
    pub pause_count: u32,
    pub exit_fullscreen_count: u32,
    pub tab_switch_count: u32,
    /// Longest continuous session seen; merged with `max`, not summed.
    pub longest_continuous_session: f64,
    pub videos: BTreeMap<ContentId, VideoDelta>,
}

/// Per-video part of a [`DayDelta`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VideoDelta {
    pub title: Option<String>,
    pub duration: f64,
    pub first_start: Option<DateTime<Utc>>,
}

impl DayDelta {
    /// Whether flushing this delta would change nothing.
    pub fn is_empty(&self) -> bool {
        self.total_time == 0.0
            && self.effective_time == 0.0
            && self.pause_count == 0
            && self.exit_fullscreen_count == 0
            && self.tab_switch_count == 0
            && self.longest_continuous_session == 0.0
            && self.videos.is_empty()
    }

    /// Folds `other` into `self`.
    pub fn merge(&mut self, other: Self) {
        self.total_time += other.total_time;
        self.effective_time += other.effective_time;
        self.pause_count = self.pause_count.saturating_add(other.pause_count);
        self.exit_fullscreen_count = self
            .exit_fullscreen_count
            .saturating_add(other.exit_fullscreen_count);
        self.tab_switch_count = self.tab_switch_count.saturating_add(other.tab_switch_count);
        self.longest_continuous_session = self
            .longest_continuous_session
            .max(other.longest_continuous_session);
        for (id, video) in other.videos {
            self.videos.entry(id).or_default().merge(video);
        }
    }

    /// Credits `seconds` to a video, recording its title and first start.
    pub fn credit_video(
        &mut self,
        id: &ContentId,
        title: Option<&str>,
        seconds: f64,
        started_at: DateTime<Utc>,
    ) {
        let video = self.videos.entry(id.clone()).or_default();
        video.duration += seconds;
        if video.title.is_none() {
            video.title = title.filter(|t| !t.trim().is_empty()).map(str::to_string);
        }
        if video.first_start.is_none_or(|first| started_at < first) {
            video.first_start = Some(started_at);
        }
    }
}

impl VideoDelta {
    fn merge(&mut self, other: Self) {
        self.duration += other.duration;
        if self.title.is_none() {
            self.title = other.title;
        }
        self.first_start = match (self.first_start, other.first_start) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
    }
}

/// Unflushed deltas for every day touched since the last successful flush.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PendingDeltas {
    days: BTreeMap<NaiveDate, DayDelta>,
}

impl PendingDeltas {
    /// Mutable delta for `date`, created on first use.
    pub fn day_mut(&mut self, date: NaiveDate) -> &mut DayDelta {
        self.days.entry(date).or_default()
    }

    /// Delta for `date`, if any.
    pub fn day(&self, date: NaiveDate) -> Option<&DayDelta> {
        self.days.get(&date)
    }

    /// Whether there is nothing worth flushing.
    pub fn is_empty(&self) -> bool {
        self.days.values().all(DayDelta::is_empty)
    }

    /// Moves all pending deltas out, leaving this set empty.
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    /// Folds another set of deltas into this one.
    pub fn merge(&mut self, other: Self) {
        for (date, delta) in other.days {
            self.day_mut(date).merge(delta);
        }
    }

    /// Adds one day's delta back, e.g. after a failed write.
    pub fn restore(&mut self, date: NaiveDate, delta: DayDelta) {
        self.day_mut(date).merge(delta);
    }

    /// Iterates days in ascending date order.
    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDate, &DayDelta)> {
        self.days.iter()
    }

    /// Sum of unflushed wall-clock seconds across days.
    pub fn total_time(&self) -> f64 {
        self.days.values().map(|d| d.total_time).sum()
    }
}

impl IntoIterator for PendingDeltas {
    type Item = (NaiveDate, DayDelta);
    type IntoIter = std::collections::btree_map::IntoIter<NaiveDate, DayDelta>;

    fn into_iter(self) -> Self::IntoIter {
        self.days.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    #[test]
    fn merge_sums_times_and_maxes_longest() {
        let mut a = DayDelta {
            total_time: 10.0,
            effective_time: 5.0,
            pause_count: 1,
            longest_continuous_session: 40.0,
            ..DayDelta::default()
        };
        a.merge(DayDelta {
            total_time: 15.0,
            effective_time: 15.0,
            tab_switch_count: 2,
            longest_continuous_session: 15.0,
            ..DayDelta::default()
        });
        assert!((a.total_time - 25.0).abs() < f64::EPSILON);
        assert!((a.effective_time - 20.0).abs() < f64::EPSILON);
        assert_eq!(a.pause_count, 1);
        assert_eq!(a.tab_switch_count, 2);
        assert!((a.longest_continuous_session - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn credit_video_keeps_earliest_start_and_first_title() {
        let id = ContentId::new("BV1").unwrap();
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 1).unwrap();
        let mut delta = DayDelta::default();
        delta.credit_video(&id, Some(""), 1.0, t1);
        delta.credit_video(&id, Some("Algebra"), 1.5, t0);
        delta.credit_video(&id, Some("Other"), 1.5, t1);

        let video = &delta.videos[&id];
        assert!((video.duration - 4.0).abs() < f64::EPSILON);
        assert_eq!(video.title.as_deref(), Some("Algebra"));
        assert_eq!(video.first_start, Some(t0));
    }

    #[test]
    fn take_then_merge_restores_failed_batch() {
        let mut pending = PendingDeltas::default();
        pending.day_mut(date(1)).total_time = 30.0;
        let batch = pending.take();
        assert!(pending.is_empty());

        // Ticks keep landing while the batch is out.
        pending.day_mut(date(1)).total_time += 1.0;
        pending.day_mut(date(2)).total_time += 2.0;

        pending.merge(batch);
        assert!((pending.day(date(1)).unwrap().total_time - 31.0).abs() < f64::EPSILON);
        assert!((pending.total_time() - 33.0).abs() < f64::EPSILON);
    }

    #[test]
    fn untouched_days_are_empty() {
        let mut pending = PendingDeltas::default();
        let _ = pending.day_mut(date(3));
        assert!(pending.is_empty());
    }
}
