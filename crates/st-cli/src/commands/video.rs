//! Video command: every day one video was studied.

use std::io::Write;

use anyhow::{Context, Result};

use st_core::{ContentId, LocalZone};
use st_store::{KvStore, Storage, VideoDetail};

use super::util::{format_duration, write_json};

pub fn run<W: Write, K: KvStore>(
    writer: &mut W,
    storage: &Storage<K>,
    zone: LocalZone,
    id: &str,
    json: bool,
) -> Result<()> {
    let id = ContentId::new(id).context("invalid content id")?;
    let detail = storage
        .query(zone)
        .get_video_detail(&id)
        .with_context(|| format!("failed to load video {id}"))?;

    if json {
        return write_json(writer, &detail);
    }
    match detail {
        Some(detail) => write_video(writer, &detail),
        None => {
            writeln!(writer, "No study time recorded for {id}.")?;
            Ok(())
        }
    }
}

fn write_video<W: Write>(w: &mut W, detail: &VideoDetail) -> Result<()> {
    let title = if detail.title.trim().is_empty() {
        "(untitled)"
    } else {
        detail.title.as_str()
    };
    writeln!(w, "VIDEO: {} [{}]", title, detail.id)?;
    writeln!(
        w,
        "Total {} over {} {}",
        format_duration(detail.total_duration),
        detail.dates.len(),
        if detail.dates.len() == 1 { "day" } else { "days" }
    )?;
    writeln!(w)?;
    for entry in &detail.dates {
        if entry.duration > 0.0 {
            writeln!(
                w,
                "{} {}  {}",
                entry.date,
                entry.date.format("%a"),
                format_duration(entry.duration)
            )?;
        } else {
            writeln!(w, "{} {}  (swept)", entry.date, entry.date.format("%a"))?;
        }
    }
    Ok(())
}
