//! History command: recent study sessions, newest first.

use std::io::Write;

use anyhow::{Context, Result};

use st_core::LocalZone;
use st_store::{HistoryEntry, KvStore, Storage};

use super::util::{format_duration, write_json};

pub fn run<W: Write, K: KvStore>(
    writer: &mut W,
    storage: &Storage<K>,
    zone: LocalZone,
    limit: usize,
    offset: usize,
    json: bool,
) -> Result<()> {
    let entries = storage
        .query(zone)
        .get_history(limit, offset)
        .context("failed to load history")?;
    if json {
        return write_json(writer, &entries);
    }

    writeln!(writer, "RECENT SESSIONS")?;
    writeln!(writer, "───────────────")?;
    if entries.is_empty() {
        writeln!(writer, "No study sessions recorded.")?;
        return Ok(());
    }

    for entry in &entries {
        write_entry(writer, entry, zone)?;
    }

    if limit > 0 && entries.len() == limit {
        writeln!(writer)?;
        writeln!(writer, "More with --offset {}", offset + limit)?;
    }
    Ok(())
}

fn write_entry<W: Write>(w: &mut W, entry: &HistoryEntry, zone: LocalZone) -> Result<()> {
    let start = entry.start_time.map_or_else(
        || "--:--".to_string(),
        |at| zone.naive_local(at).format("%H:%M").to_string(),
    );
    let title = if entry.title.trim().is_empty() {
        "(untitled)"
    } else {
        entry.title.as_str()
    };
    writeln!(
        w,
        "{} {}  {:>7}  {} [{}]",
        entry.date,
        start,
        format_duration(entry.duration),
        title,
        entry.id
    )?;
    Ok(())
}
