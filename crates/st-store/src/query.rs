//! Read API for reports.
//!
//! Everything here is derived from the week shards, the video index and the
//! summaries. Empty stores produce zero-filled results, never errors.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;

use st_core::{ContentId, DayRecord, IsoWeek, LocalZone};

use crate::{KvStore, StoreError, VideoIndex, WeekShard, WeekShardStore};

/// How many videos [`StatsReport::top_videos`] lists.
pub const TOP_VIDEO_LIMIT: usize = 10;

/// Reporting window, always ending today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsPeriod {
    /// The last 7 days.
    Week,
    /// The last 30 days.
    Month,
    /// The last 365 days.
    Year,
    /// Since the first recorded day.
    All,
}

impl StatsPeriod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
            Self::All => "all",
        }
    }

    const fn days(self) -> Option<i64> {
        match self {
            Self::Week => Some(7),
            Self::Month => Some(30),
            Self::Year => Some(365),
            Self::All => None,
        }
    }
}

impl fmt::Display for StatsPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown period `{0}`, expected one of: week, month, year, all")]
pub struct UnknownPeriod(String);

impl FromStr for StatsPeriod {
    type Err = UnknownPeriod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            "all" => Ok(Self::All),
            _ => Err(UnknownPeriod(s.to_string())),
        }
    }
}

/// One day in [`StatsReport::daily_data`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub total_time: f64,
    pub effective_time: f64,
}

/// A video's aggregated study time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoTotal {
    pub id: ContentId,
    pub title: String,
    pub duration: f64,
}

/// Aggregates over a [`StatsPeriod`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    pub period: StatsPeriod,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub total_time: f64,
    pub effective_time: f64,
    pub focus_quality_ratio: f64,
    pub active_days: usize,
    pub pause_count: u32,
    pub exit_fullscreen_count: u32,
    pub tab_switch_count: u32,
    pub longest_continuous_session: f64,
    /// Exactly one entry per date in `[start, end]`, ascending.
    pub daily_data: Vec<DailyPoint>,
    pub top_videos: Vec<VideoTotal>,
}

/// One video studied on one day.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub date: NaiveDate,
    pub id: ContentId,
    pub title: String,
    pub duration: f64,
    pub start_time: Option<DateTime<Utc>>,
}

/// Sessions that started within one hour of the day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HourBucket {
    pub hour: u32,
    pub sessions: u32,
    pub duration: f64,
}

/// Everything recorded for one day.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyDetail {
    pub date: NaiveDate,
    pub total_time: f64,
    pub effective_time: f64,
    pub pause_count: u32,
    pub exit_fullscreen_count: u32,
    pub tab_switch_count: u32,
    pub longest_continuous_session: f64,
    /// By duration, longest first.
    pub videos: Vec<VideoTotal>,
    /// 24 buckets, hour 0 first.
    pub hours: Vec<HourBucket>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VideoDateDuration {
    pub date: NaiveDate,
    /// Zero when the day's record has been swept.
    pub duration: f64,
}

/// A video's history across days.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetail {
    pub id: ContentId,
    pub title: String,
    pub total_duration: f64,
    pub dates: Vec<VideoDateDuration>,
}

/// Read-only queries over a store.
#[derive(Debug, Clone, Copy)]
pub struct QueryFacade<'a, K> {
    kv: &'a K,
    zone: LocalZone,
}

impl<'a, K: KvStore> QueryFacade<'a, K> {
    /// Hours of day are computed in `zone`.
    pub const fn new(kv: &'a K, zone: LocalZone) -> Self {
        Self { kv, zone }
    }

    const fn shards(&self) -> WeekShardStore<'a, K> {
        WeekShardStore::new(self.kv)
    }

    /// Aggregates the day records of `period`, ending on `today`.
    pub fn get_stats(&self, period: StatsPeriod, today: NaiveDate) -> Result<StatsReport, StoreError> {
        let start = match period.days() {
            Some(days) => today
                .checked_sub_signed(Duration::days(days - 1))
                .unwrap_or(today),
            None => self
                .shards()
                .first_day()?
                .map_or(today, |first| first.min(today)),
        };
        let days = self.shards().days_in_range(start, today)?;

        let mut report = StatsReport {
            period,
            start,
            end: today,
            total_time: 0.0,
            effective_time: 0.0,
            focus_quality_ratio: 0.0,
            active_days: 0,
            pause_count: 0,
            exit_fullscreen_count: 0,
            tab_switch_count: 0,
            longest_continuous_session: 0.0,
            daily_data: Vec::new(),
            top_videos: Vec::new(),
        };

        let by_date: HashMap<NaiveDate, &DayRecord> = days.iter().map(|r| (r.date, r)).collect();
        report.daily_data = start
            .iter_days()
            .take_while(|date| *date <= today)
            .map(|date| {
                by_date.get(&date).map_or(
                    DailyPoint {
                        date,
                        total_time: 0.0,
                        effective_time: 0.0,
                    },
                    |record| DailyPoint {
                        date,
                        total_time: record.total_time,
                        effective_time: record.effective_time,
                    },
                )
            })
            .collect();

        for record in &days {
            report.total_time += record.total_time;
            report.effective_time += record.effective_time;
            report.pause_count = report.pause_count.saturating_add(record.pause_count);
            report.exit_fullscreen_count = report
                .exit_fullscreen_count
                .saturating_add(record.exit_fullscreen_count);
            report.tab_switch_count = report.tab_switch_count.saturating_add(record.tab_switch_count);
            report.longest_continuous_session = report
                .longest_continuous_session
                .max(record.longest_continuous_session);
            if !record.is_empty() {
                report.active_days += 1;
            }
        }
        if report.total_time > 0.0 {
            report.focus_quality_ratio = report.effective_time / report.total_time;
        }
        report.top_videos = top_videos(&days, TOP_VIDEO_LIMIT);

        tracing::debug!(%period, %start, end = %today, days = days.len(), "computed stats");
        Ok(report)
    }

    /// Per-day video entries, newest first, skipping `offset` and returning at
    /// most `limit`.
    pub fn get_history(&self, limit: usize, offset: usize) -> Result<Vec<HistoryEntry>, StoreError> {
        let index = VideoIndex::new(self.kv).all()?;
        let mut entries: Vec<HistoryEntry> = self
            .shards()
            .all_days()?
            .into_iter()
            .flat_map(|record| {
                let date = record.date;
                record.videos.into_iter().map(move |(id, video)| HistoryEntry {
                    date,
                    id,
                    title: video.title,
                    duration: video.duration,
                    start_time: video.first_start,
                })
            })
            .collect();

        for entry in &mut entries {
            if entry.title.trim().is_empty() {
                if let Some(cached) = index.get(&entry.id) {
                    entry.title.clone_from(&cached.title);
                }
            }
        }

        // Newest day first; within a day, latest start first and unknown starts last.
        entries.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then_with(|| b.start_time.cmp(&a.start_time))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(entries.into_iter().skip(offset).take(limit).collect())
    }

    /// Detail for one day, with session starts bucketed by hour.
    ///
    /// A day with no record yields an all-zero detail.
    pub fn get_daily_detailed_stats(&self, date: NaiveDate) -> Result<DailyDetail, StoreError> {
        let record = self
            .shards()
            .get_day(date)?
            .unwrap_or_else(|| DayRecord::new(date));

        let mut hours: Vec<HourBucket> = (0..24)
            .map(|hour| HourBucket {
                hour,
                sessions: 0,
                duration: 0.0,
            })
            .collect();
        for video in record.videos.values() {
            let Some(start) = video.first_start else {
                continue;
            };
            if let Some(bucket) = hours.get_mut(self.zone.hour_of(start) as usize) {
                bucket.sessions += 1;
                bucket.duration += video.duration;
            }
        }

        Ok(DailyDetail {
            date,
            total_time: record.total_time,
            effective_time: record.effective_time,
            pause_count: record.pause_count,
            exit_fullscreen_count: record.exit_fullscreen_count,
            tab_switch_count: record.tab_switch_count,
            longest_continuous_session: record.longest_continuous_session,
            videos: top_videos(std::slice::from_ref(&record), usize::MAX),
            hours,
        })
    }

    /// A video's dates and per-date durations, or `None` if it was never indexed.
    pub fn get_video_detail(&self, id: &ContentId) -> Result<Option<VideoDetail>, StoreError> {
        let Some(entry) = VideoIndex::new(self.kv).get_entry(id)? else {
            return Ok(None);
        };

        let shards = self.shards();
        let mut weeks: BTreeMap<IsoWeek, WeekShard> = BTreeMap::new();
        let mut title = entry.title;
        let mut dates = Vec::with_capacity(entry.dates.len());
        for date in entry.dates {
            let week = IsoWeek::of(date);
            let shard = match weeks.entry(week) {
                Entry::Occupied(loaded) => loaded.into_mut(),
                Entry::Vacant(slot) => slot.insert(shards.get_week(&week.key())?),
            };
            let video = shard.get(&date).and_then(|record| record.videos.get(id));
            if title.trim().is_empty() {
                if let Some(video) = video {
                    title.clone_from(&video.title);
                }
            }
            dates.push(VideoDateDuration {
                date,
                duration: video.map_or(0.0, |v| v.duration),
            });
        }

        Ok(Some(VideoDetail {
            id: id.clone(),
            title,
            total_duration: dates.iter().map(|d| d.duration).sum(),
            dates,
        }))
    }
}

/// Ranks videos by total duration, longest first.
///
/// Ties keep first-seen order: days ascending, and within a day by first start
/// time, then id.
fn top_videos(days: &[DayRecord], limit: usize) -> Vec<VideoTotal> {
    let mut totals: Vec<VideoTotal> = Vec::new();
    let mut positions: HashMap<&ContentId, usize> = HashMap::new();

    for record in days {
        let mut videos: Vec<_> = record.videos.iter().collect();
        videos.sort_by(|(a_id, a), (b_id, b)| {
            match (a.first_start, b.first_start) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }
            .then_with(|| a_id.cmp(b_id))
        });
        for (id, video) in videos {
            if let Some(&pos) = positions.get(id) {
                let total = &mut totals[pos];
                total.duration += video.duration;
                if total.title.trim().is_empty() {
                    total.title.clone_from(&video.title);
                }
            } else {
                positions.insert(id, totals.len());
                totals.push(VideoTotal {
                    id: id.clone(),
                    title: video.title.clone(),
                    duration: video.duration,
                });
            }
        }
    }

    totals.sort_by(|a, b| b.duration.total_cmp(&a.duration));
    totals.truncate(limit);
    totals
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, TimeZone};
    use st_core::{DayDelta, VideoDelta};

    use super::*;
    use crate::{MemoryKv, Storage};

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    fn at(m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, m, d, h, min, 0).unwrap()
    }

    fn id(s: &str) -> ContentId {
        ContentId::new(s).unwrap()
    }

    /// Flushes a delta through all three writers, like a recorder would.
    fn flush(storage: &Storage<MemoryKv>, day: NaiveDate, delta: &DayDelta) {
        let save = storage.shards().save_day(day, |r| r.apply(delta)).unwrap();
        storage
            .videos()
            .update_many(
                day,
                delta.videos.iter().map(|(id, v)| (id, v.title.as_deref())),
            )
            .unwrap();
        storage
            .summaries()
            .update(day, delta, save.became_active())
            .unwrap();
    }

    fn watched(videos: &[(&str, &str, f64, DateTime<Utc>)]) -> DayDelta {
        let total: f64 = videos.iter().map(|v| v.2).sum();
        DayDelta {
            total_time: total,
            effective_time: total,
            videos: videos
                .iter()
                .map(|(vid, title, duration, start)| {
                    (
                        id(vid),
                        VideoDelta {
                            title: Some((*title).to_string()),
                            duration: *duration,
                            first_start: Some(*start),
                        },
                    )
                })
                .collect(),
            ..DayDelta::default()
        }
    }

    #[test]
    fn week_stats_zero_fill_inactive_days() {
        let storage = Storage::in_memory();
        for d in [10, 11, 13, 16] {
            flush(&storage, date(1, d), &watched(&[("BV1", "Algebra", 60.0, at(1, d, 9, 0))]));
        }
        let report = storage
            .query(LocalZone::utc())
            .get_stats(StatsPeriod::Week, date(1, 16))
            .unwrap();

        assert_eq!(report.start, date(1, 10));
        let dates: Vec<_> = report.daily_data.iter().map(|p| p.date).collect();
        assert_eq!(dates, date(1, 10).iter_days().take(7).collect::<Vec<_>>());
        let zero_days = report
            .daily_data
            .iter()
            .filter(|p| p.total_time == 0.0)
            .count();
        assert_eq!(zero_days, 3);
        assert_eq!(report.active_days, 4);
        assert!((report.total_time - 240.0).abs() < f64::EPSILON);
        assert!((report.focus_quality_ratio - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_store_yields_zeroed_report() {
        let storage = Storage::in_memory();
        let query = storage.query(LocalZone::utc());
        let report = query.get_stats(StatsPeriod::All, date(3, 1)).unwrap();
        assert_eq!(report.start, date(3, 1));
        assert_eq!(report.daily_data.len(), 1);
        assert!(report.top_videos.is_empty());
        assert!(report.focus_quality_ratio.abs() < f64::EPSILON);
        assert!(query.get_history(10, 0).unwrap().is_empty());
    }

    #[test]
    fn all_period_starts_at_first_active_day() {
        let storage = Storage::in_memory();
        flush(&storage, date(1, 3), &watched(&[("BV1", "A", 10.0, at(1, 3, 9, 0))]));
        let report = storage
            .query(LocalZone::utc())
            .get_stats(StatsPeriod::All, date(1, 12))
            .unwrap();
        assert_eq!(report.start, date(1, 3));
        assert_eq!(report.daily_data.len(), 10);
    }

    #[test]
    fn all_period_includes_days_whose_summary_write_was_lost() {
        let storage = Storage::in_memory();
        let early = watched(&[("BV1", "A", 100.0, at(1, 3, 9, 0))]);
        storage.shards().save_day(date(1, 3), |r| r.apply(&early)).unwrap();
        flush(&storage, date(1, 10), &watched(&[("BV2", "B", 100.0, at(1, 10, 9, 0))]));

        let report = storage
            .query(LocalZone::utc())
            .get_stats(StatsPeriod::All, date(1, 12))
            .unwrap();
        assert_eq!(report.start, date(1, 3));
        assert!((report.total_time - 200.0).abs() < 1e-9);
        assert_eq!(report.active_days, 2);
    }

    #[test]
    fn all_period_ignores_a_corrupt_global_summary() {
        let storage = Storage::in_memory();
        flush(&storage, date(1, 6), &watched(&[("BV1", "A", 60.0, at(1, 6, 9, 0))]));
        storage.kv().set(crate::GLOBAL_SUMMARY_KEY, "{1:").unwrap();

        let report = storage
            .query(LocalZone::utc())
            .get_stats(StatsPeriod::All, date(1, 8))
            .unwrap();
        assert_eq!(report.start, date(1, 6));
        assert!((report.total_time - 60.0).abs() < 1e-9);
    }

    #[test]
    fn top_videos_rank_by_duration_and_keep_first_seen_order_on_ties() {
        let storage = Storage::in_memory();
        flush(
            &storage,
            date(1, 6),
            &watched(&[
                ("BVb", "Second", 50.0, at(1, 6, 10, 0)),
                ("BVa", "First", 50.0, at(1, 6, 9, 0)),
            ]),
        );
        flush(
            &storage,
            date(1, 7),
            &watched(&[
                ("BVc", "Third", 100.0, at(1, 7, 8, 0)),
                ("BVd", "Late tie", 100.0, at(1, 7, 9, 0)),
            ]),
        );
        let report = storage
            .query(LocalZone::utc())
            .get_stats(StatsPeriod::Week, date(1, 7))
            .unwrap();
        let order: Vec<_> = report.top_videos.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(order, vec!["BVc", "BVd", "BVa", "BVb"]);
    }

    #[test]
    fn top_videos_are_capped() {
        let storage = Storage::in_memory();
        let names: Vec<String> = (0..12).map(|i| format!("BV{i:02}")).collect();
        let videos: Vec<_> = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), "t", 10.0 + i as f64, at(1, 6, 9, 0)))
            .collect();
        flush(&storage, date(1, 6), &watched(&videos));
        let report = storage
            .query(LocalZone::utc())
            .get_stats(StatsPeriod::Month, date(1, 6))
            .unwrap();
        assert_eq!(report.top_videos.len(), TOP_VIDEO_LIMIT);
        assert_eq!(report.top_videos[0].id.as_str(), "BV11");
    }

    #[test]
    fn history_is_newest_first_and_paginated() {
        let storage = Storage::in_memory();
        flush(&storage, date(1, 6), &watched(&[("BV1", "Mon", 10.0, at(1, 6, 9, 0))]));
        flush(
            &storage,
            date(1, 8),
            &watched(&[
                ("BV2", "Wed morning", 20.0, at(1, 8, 8, 0)),
                ("BV3", "Wed evening", 30.0, at(1, 8, 20, 0)),
            ]),
        );
        let query = storage.query(LocalZone::utc());

        let all = query.get_history(10, 0).unwrap();
        let ids: Vec<_> = all.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["BV3", "BV2", "BV1"]);

        let page = query.get_history(1, 1).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].title, "Wed morning");
        assert!(query.get_history(5, 3).unwrap().is_empty());
    }

    #[test]
    fn history_backfills_blank_titles_from_index() {
        let storage = Storage::in_memory();
        flush(&storage, date(1, 6), &watched(&[("BV1", "", 10.0, at(1, 6, 9, 0))]));
        storage
            .videos()
            .update_video_index(&id("BV1"), date(1, 6), Some("Cached"))
            .unwrap();
        let history = storage.query(LocalZone::utc()).get_history(10, 0).unwrap();
        assert_eq!(history[0].title, "Cached");
    }

    #[test]
    fn daily_detail_buckets_starts_by_local_hour() {
        let storage = Storage::in_memory();
        flush(
            &storage,
            date(1, 6),
            &watched(&[
                ("BV1", "a", 60.0, at(1, 6, 1, 30)),
                ("BV2", "b", 30.0, at(1, 6, 1, 59)),
                ("BV3", "c", 90.0, at(1, 6, 14, 0)),
            ]),
        );
        let plus_two = LocalZone::Fixed(FixedOffset::east_opt(2 * 3600).unwrap());
        let detail = storage
            .query(plus_two)
            .get_daily_detailed_stats(date(1, 6))
            .unwrap();

        assert_eq!(detail.hours.len(), 24);
        assert_eq!(detail.hours[3].sessions, 2);
        assert!((detail.hours[3].duration - 90.0).abs() < f64::EPSILON);
        assert_eq!(detail.hours[16].sessions, 1);
        assert_eq!(detail.hours.iter().map(|h| h.sessions).sum::<u32>(), 3);
        assert_eq!(detail.videos[0].id.as_str(), "BV3");
    }

    #[test]
    fn daily_detail_of_missing_day_is_zero() {
        let storage = Storage::in_memory();
        let detail = storage
            .query(LocalZone::utc())
            .get_daily_detailed_stats(date(1, 6))
            .unwrap();
        assert!(detail.total_time.abs() < f64::EPSILON);
        assert!(detail.hours.iter().all(|h| h.sessions == 0));
    }

    #[test]
    fn video_detail_lists_dates_with_durations() {
        let storage = Storage::in_memory();
        flush(&storage, date(1, 5), &watched(&[("BV1", "Optics", 40.0, at(1, 5, 9, 0))]));
        flush(&storage, date(1, 6), &watched(&[("BV1", "Optics", 20.0, at(1, 6, 9, 0))]));
        flush(&storage, date(1, 6), &watched(&[("BV1", "Optics", 5.0, at(1, 6, 10, 0))]));

        let query = storage.query(LocalZone::utc());
        let detail = query.get_video_detail(&id("BV1")).unwrap().unwrap();
        assert_eq!(detail.title, "Optics");
        assert_eq!(
            detail.dates.iter().map(|d| d.date).collect::<Vec<_>>(),
            vec![date(1, 5), date(1, 6)]
        );
        assert!((detail.dates[1].duration - 25.0).abs() < f64::EPSILON);
        assert!((detail.total_duration - 65.0).abs() < f64::EPSILON);
        assert!(query.get_video_detail(&id("BV404")).unwrap().is_none());
    }

    #[test]
    fn period_parses_case_insensitively() {
        assert_eq!("Week".parse::<StatsPeriod>().unwrap(), StatsPeriod::Week);
        assert_eq!(" all ".parse::<StatsPeriod>().unwrap(), StatsPeriod::All);
        let err = "fortnight".parse::<StatsPeriod>().unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"unknown period `fortnight`, expected one of: week, month, year, all");
    }
}
