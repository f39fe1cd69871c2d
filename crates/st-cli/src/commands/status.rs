//! Status command for showing storage contents and all-time totals.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use st_store::{KvStore, Storage};

use super::util::{format_duration, percent};

pub fn run<W: Write, K: KvStore>(
    writer: &mut W,
    storage: &Storage<K>,
    database_path: &Path,
) -> Result<()> {
    let weeks = storage.shards().weeks().context("failed to list week shards")?;
    let videos = storage.videos().all().context("failed to read video index")?;
    let global = storage
        .summaries()
        .get_global()
        .context("failed to read summary")?;

    writeln!(writer, "Study tracker status")?;
    writeln!(writer, "Database: {}", database_path.display())?;
    writeln!(writer, "Week shards: {}", weeks.len())?;
    writeln!(writer, "Videos indexed: {}", videos.len())?;

    if global.total_all_time <= 0.0 {
        writeln!(writer, "No study time recorded.")?;
        return Ok(());
    }

    writeln!(
        writer,
        "All time: {} total, {} effective ({} focused)",
        format_duration(global.total_all_time),
        format_duration(global.total_effective_time),
        percent(global.focus_quality_ratio)
    )?;
    match (global.first_active_date, global.last_active_date) {
        (Some(first), Some(last)) => writeln!(
            writer,
            "Active days: {} ({first} to {last})",
            global.total_days_active
        )?,
        _ => writeln!(writer, "Active days: {}", global.total_days_active)?,
    }

    Ok(())
}
