//! Persisted record types.
//!
//! Day records use compact field names on disk (`t,e,p,x,s,l,v{ti,d,st}`). The
//! long camelCase names are accepted as aliases so records written by older
//! versions still load.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::delta::DayDelta;
use crate::types::ContentId;

/// Per-calendar-day aggregate of study activity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DayRecord {
    /// The day this record covers. Not stored: it is the key in the week shard.
    #[serde(skip)]
    pub date: NaiveDate,

    /// Wall-clock seconds with the recorder running.
    #[serde(rename = "t", alias = "totalTime", default)]
    pub total_time: f64,

    /// Attention-weighted seconds, scaled by playback rate.
    #[serde(rename = "e", alias = "effectiveTime", default)]
    pub effective_time: f64,

    #[serde(rename = "p", alias = "pauseCount", default)]
    pub pause_count: u32,

    #[serde(rename = "x", alias = "exitFullscreenCount", default)]
    pub exit_fullscreen_count: u32,

    #[serde(rename = "s", alias = "tabSwitchCount", default)]
    pub tab_switch_count: u32,

    /// Longest uninterrupted effective stretch, in wall-clock seconds.
    #[serde(rename = "l", alias = "longestContinuousSession", default)]
    pub longest_continuous_session: f64,

    #[serde(rename = "v", alias = "videos", default)]
    pub videos: BTreeMap<ContentId, VideoDayEntry>,
}

/// One video's activity within a day.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VideoDayEntry {
    #[serde(rename = "ti", alias = "title", default)]
    pub title: String,

    /// Rate-scaled effective seconds credited to this video.
    #[serde(rename = "d", alias = "duration", alias = "durationSeconds", default)]
    pub duration: f64,

    /// When this video was first watched on this day.
    #[serde(
        rename = "st",
        alias = "firstStartTime",
        alias = "startTime",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub first_start: Option<DateTime<Utc>>,
}

impl DayRecord {
    /// Creates an empty record for `date`.
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            ..Self::default()
        }
    }

    /// Adds a flushed delta to this record.
    ///
    /// Times and counters are summed; the longest session is a maximum; video
    /// titles are first-seen-wins and never replaced by a blank one; the first
    /// start time keeps the earliest instant seen.
    pub fn apply(&mut self, delta: &DayDelta) {
        self.total_time += delta.total_time;
        self.effective_time += delta.effective_time;
        self.pause_count = self.pause_count.saturating_add(delta.pause_count);
        self.exit_fullscreen_count = self
            .exit_fullscreen_count
            .saturating_add(delta.exit_fullscreen_count);
        self.tab_switch_count = self.tab_switch_count.saturating_add(delta.tab_switch_count);
        self.longest_continuous_session = self
            .longest_continuous_session
            .max(delta.longest_continuous_session);

        for (id, video) in &delta.videos {
            let entry = self.videos.entry(id.clone()).or_default();
            entry.duration += video.duration;
            if entry.title.trim().is_empty() {
                if let Some(title) = video.title.as_deref().filter(|t| !t.trim().is_empty()) {
                    entry.title = title.to_string();
                }
            }
            entry.first_start = match (entry.first_start, video.first_start) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
        }
    }

    /// Whether the record carries no activity at all.
    pub fn is_empty(&self) -> bool {
        self.total_time == 0.0
            && self.effective_time == 0.0
            && self.pause_count == 0
            && self.exit_fullscreen_count == 0
            && self.tab_switch_count == 0
            && self.videos.is_empty()
    }
}

/// Reverse index entry: which dates a video was studied on.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "IndexEntryRepr")]
pub struct VideoIndexEntry {
    pub title: String,
    pub dates: BTreeSet<NaiveDate>,
}

/// Every stored shape a video index entry has had.
///
/// Early versions stored a bare array of date strings; current ones store an
/// object with the cached title. Unparseable dates are dropped.
#[derive(Deserialize)]
#[serde(untagged)]
enum IndexEntryRepr {
    Legacy(Vec<String>),
    Entry {
        #[serde(default)]
        title: String,
        #[serde(default)]
        dates: Vec<String>,
    },
}

impl From<IndexEntryRepr> for VideoIndexEntry {
    fn from(repr: IndexEntryRepr) -> Self {
        let (title, dates) = match repr {
            IndexEntryRepr::Entry { title, dates } => (title, dates),
            IndexEntryRepr::Legacy(dates) => (String::new(), dates),
        };
        let dates = dates
            .iter()
            .filter_map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .collect();
        Self { title, dates }
    }
}

/// Monthly rollup.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonthlySummary {
    pub total_time: f64,
    pub effective_time: f64,
    pub days_with_activity: u32,
    pub distinct_video_count: u32,
    /// Video ids seen this month; `distinct_video_count` is its size.
    pub video_ids: BTreeSet<ContentId>,
}

impl MonthlySummary {
    /// Folds one flushed delta into the month.
    ///
    /// `first_flush_of_day` must be true only for the flush that first gave
    /// the day recorded time, so a day is counted once no matter how often
    /// it flushes.
    pub fn absorb(&mut self, delta: &DayDelta, first_flush_of_day: bool) {
        self.total_time += delta.total_time;
        self.effective_time += delta.effective_time;
        if first_flush_of_day {
            self.days_with_activity += 1;
        }
        self.video_ids.extend(delta.videos.keys().cloned());
        self.distinct_video_count = u32::try_from(self.video_ids.len()).unwrap_or(u32::MAX);
    }
}

/// All-time rollup.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalSummary {
    pub total_all_time: f64,
    pub total_effective_time: f64,
    pub total_days_active: u32,
    pub first_active_date: Option<NaiveDate>,
    pub last_active_date: Option<NaiveDate>,
    pub focus_quality_ratio: f64,
}

impl GlobalSummary {
    /// Folds one flushed delta for `date` into the global rollup.
    pub fn absorb(&mut self, date: NaiveDate, delta: &DayDelta, first_flush_of_day: bool) {
        self.total_all_time += delta.total_time;
        self.total_effective_time += delta.effective_time;
        if first_flush_of_day {
            self.total_days_active += 1;
        }
        self.first_active_date = Some(self.first_active_date.map_or(date, |d| d.min(date)));
        self.last_active_date = Some(self.last_active_date.map_or(date, |d| d.max(date)));
        self.focus_quality_ratio = if self.total_all_time > 0.0 {
            self.total_effective_time / self.total_all_time
        } else {
            0.0
        };
    }
}
