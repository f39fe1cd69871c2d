//! Day command: one day in detail.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use st_core::LocalZone;
use st_store::{DailyDetail, KvStore, Storage};

use super::util::{format_duration, percent, progress_bar, write_json};

pub fn run<W: Write, K: KvStore>(
    writer: &mut W,
    storage: &Storage<K>,
    zone: LocalZone,
    date: NaiveDate,
    json: bool,
) -> Result<()> {
    let detail = storage
        .query(zone)
        .get_daily_detailed_stats(date)
        .with_context(|| format!("failed to load {date}"))?;
    if json {
        write_json(writer, &detail)
    } else {
        write_day(writer, &detail)
    }
}

fn write_day<W: Write>(w: &mut W, detail: &DailyDetail) -> Result<()> {
    writeln!(w, "DAY: {} ({})", detail.date, detail.date.format("%A"))?;
    writeln!(w)?;

    if detail.total_time <= 0.0 && detail.videos.is_empty() {
        writeln!(w, "No study time recorded on this day.")?;
        return Ok(());
    }

    let ratio = if detail.total_time > 0.0 {
        detail.effective_time / detail.total_time
    } else {
        0.0
    };
    writeln!(w, "Total time       {}", format_duration(detail.total_time))?;
    writeln!(
        w,
        "Effective time   {} ({} focused)",
        format_duration(detail.effective_time),
        percent(ratio)
    )?;
    writeln!(
        w,
        "Longest session  {}",
        format_duration(detail.longest_continuous_session)
    )?;
    writeln!(
        w,
        "Pauses {}, fullscreen exits {}, tab switches {}",
        detail.pause_count, detail.exit_fullscreen_count, detail.tab_switch_count
    )?;

    let busiest = detail
        .hours
        .iter()
        .map(|bucket| bucket.duration)
        .fold(0.0, f64::max);
    if detail.hours.iter().any(|bucket| bucket.sessions > 0) {
        writeln!(w)?;
        writeln!(w, "BY HOUR")?;
        writeln!(w, "───────")?;
        for bucket in detail.hours.iter().filter(|bucket| bucket.sessions > 0) {
            let noun = if bucket.sessions == 1 {
                "session"
            } else {
                "sessions"
            };
            writeln!(
                w,
                "{:02}:00  {}  {} {}, {}",
                bucket.hour,
                progress_bar(bucket.duration, busiest),
                bucket.sessions,
                noun,
                format_duration(bucket.duration)
            )?;
        }
    }

    if !detail.videos.is_empty() {
        writeln!(w)?;
        writeln!(w, "VIDEOS")?;
        writeln!(w, "──────")?;
        for video in &detail.videos {
            let title = if video.title.trim().is_empty() {
                "(untitled)"
            } else {
                video.title.as_str()
            };
            writeln!(
                w,
                "{:>7}  {} [{}]",
                format_duration(video.duration),
                title,
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
    use crate::commands::testing::{Study, seed, week_of_study};

    fn render(storage: &Storage<st_store::MemoryKv>, zone: LocalZone, date: &str) -> String {
        let mut output = Vec::new();
        run(&mut output, storage, zone, date.parse().unwrap(), false).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_day_with_two_videos() {
        assert_snapshot!(render(&week_of_study(), LocalZone::utc(), "2025-01-15"), @r"
DAY: 2025-01-15 (Wednesday)

Total time       40m
Effective time   35m (88% focused)
Longest session  0m
Pauses 0, fullscreen exits 0, tab switches 0

BY HOUR
───────
20:00  ██████████  1 session, 25m
21:00  ████░░░░░░  1 session, 10m

VIDEOS
──────
    25m  Thermodynamics [BV2]
    10m  Linear Algebra [BV1]
");
    }

    #[test]
    fn test_hours_follow_the_configured_zone() {
        let storage = st_store::Storage::in_memory();
        seed(
            &storage,
            &[Study {
                date: "2025-01-20",
                start: "23:30",
                id: "BV9",
                title: "",
                total: 120.0,
                effective: 120.0,
            }],
        );
        let zone = LocalZone::from_offset_minutes(Some(-300));
        let output = render(&storage, zone, "2025-01-20");
        assert!(output.contains("18:00  ██████████  1 session, 2m"));
        assert!(output.contains("2m  (untitled) [BV9]"));
    }

    #[test]
    fn test_missing_day() {
        assert_snapshot!(render(&week_of_study(), LocalZone::utc(), "2025-01-14"), @r"
DAY: 2025-01-14 (Tuesday)

No study time recorded on this day.
");
    }
}
