//! Stats command: aggregates over a reporting period.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use st_core::LocalZone;
use st_store::{KvStore, StatsPeriod, StatsReport, Storage};

use super::util::{format_duration, percent, progress_bar, write_json};

/// Daily rows are listed in full up to this many days; longer periods only
/// list active days.
const FULL_DAILY_LISTING: usize = 31;

pub fn run<W: Write, K: KvStore>(
    writer: &mut W,
    storage: &Storage<K>,
    zone: LocalZone,
    period: StatsPeriod,
    today: NaiveDate,
    json: bool,
) -> Result<()> {
    let report = storage
        .query(zone)
        .get_stats(period, today)
        .context("failed to compute stats")?;
    if json {
        write_json(writer, &report)
    } else {
        write_stats(writer, &report)
    }
}

pub fn write_stats<W: Write>(w: &mut W, report: &StatsReport) -> Result<()> {
    writeln!(
        w,
        "STUDY STATS: {} ({} to {})",
        report.period, report.start, report.end
    )?;
    writeln!(w)?;

    if report.total_time <= 0.0 {
        writeln!(w, "No study time recorded in this period.")?;
        return Ok(());
    }

    writeln!(w, "Total time       {}", format_duration(report.total_time))?;
    writeln!(
        w,
        "Effective time   {} ({} focused)",
        format_duration(report.effective_time),
        percent(report.focus_quality_ratio)
    )?;
    writeln!(
        w,
        "Active days      {} of {}",
        report.active_days,
        report.daily_data.len()
    )?;
    writeln!(
        w,
        "Longest session  {}",
        format_duration(report.longest_continuous_session)
    )?;
    writeln!(
        w,
        "Pauses {}, fullscreen exits {}, tab switches {}",
        report.pause_count, report.exit_fullscreen_count, report.tab_switch_count
    )?;

    writeln!(w)?;
    writeln!(w, "DAILY")?;
    writeln!(w, "─────")?;
    let max_day = report
        .daily_data
        .iter()
        .map(|p| p.effective_time)
        .fold(0.0, f64::max);
    let show_all = report.daily_data.len() <= FULL_DAILY_LISTING;
    for point in &report.daily_data {
        if !show_all && point.total_time <= 0.0 {
            continue;
        }
        writeln!(
            w,
            "{} {}  {}  {}",
            point.date,
            point.date.format("%a"),
            progress_bar(point.effective_time, max_day),
            format_duration(point.effective_time)
        )?;
    }

    if !report.top_videos.is_empty() {
        writeln!(w)?;
        writeln!(w, "TOP VIDEOS")?;
        writeln!(w, "──────────")?;
        for (rank, video) in report.top_videos.iter().enumerate() {
            let title = if video.title.trim().is_empty() {
                "(untitled)"
            } else {
                video.title.as_str()
            };
            writeln!(
                w,
                "{:>2}. {}  {}  [{}]",
                rank + 1,
                title,
                format_duration(video.duration),
                video.id
            )?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;
    use crate::commands::testing::week_of_study;

    fn render(period: StatsPeriod, today: &str, json: bool) -> String {
        let storage = week_of_study();
        let mut output = Vec::new();
        run(
            &mut output,
            &storage,
            LocalZone::utc(),
            period,
            today.parse().unwrap(),
            json,
        )
        .unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_week_stats_text() {
        assert_snapshot!(render(StatsPeriod::Week, "2025-01-16", false), @r"
STUDY STATS: week (2025-01-10 to 2025-01-16)

Total time       1h 40m
Effective time   1h 25m (85% focused)
Active days      2 of 7
Longest session  0m
Pauses 0, fullscreen exits 0, tab switches 0

DAILY
─────
2025-01-10 Fri  ░░░░░░░░░░  0m
2025-01-11 Sat  ░░░░░░░░░░  0m
2025-01-12 Sun  ░░░░░░░░░░  0m
2025-01-13 Mon  ██████████  50m
2025-01-14 Tue  ░░░░░░░░░░  0m
2025-01-15 Wed  ███████░░░  35m
2025-01-16 Thu  ░░░░░░░░░░  0m

TOP VIDEOS
──────────
 1. Linear Algebra  1h 0m  [BV1]
 2. Thermodynamics  25m  [BV2]
");
    }

    #[test]
    fn test_empty_period_text() {
        assert_snapshot!(render(StatsPeriod::Week, "2025-03-01", false), @r"
STUDY STATS: week (2025-02-23 to 2025-03-01)

No study time recorded in this period.
");
    }

    #[test]
    fn test_year_listing_skips_idle_days() {
        let output = render(StatsPeriod::Year, "2025-01-16", false);
        let daily_rows = output
            .lines()
            .filter(|line| line.starts_with("2025-") || line.starts_with("2024-"))
            .count();
        assert_eq!(daily_rows, 2);
    }

    #[test]
    fn test_stats_json_is_zero_filled() {
        let output = render(StatsPeriod::Week, "2025-01-16", true);
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["period"], "week");
        assert_eq!(value["dailyData"].as_array().unwrap().len(), 7);
        assert_eq!(value["dailyData"][0]["date"], "2025-01-10");
        assert_eq!(value["topVideos"][0]["id"], "BV1");
        assert_eq!(value["activeDays"], 2);
    }
}
