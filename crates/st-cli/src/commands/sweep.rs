//! Sweep command: purge day records outside the retention window.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use st_store::{KvStore, RetentionPolicy, Storage};

pub fn run<W: Write, K: KvStore>(
    writer: &mut W,
    storage: &Storage<K>,
    policy: RetentionPolicy,
    today: NaiveDate,
) -> Result<()> {
    let report = policy
        .sweep(storage, today)
        .context("failed to sweep old day records")?;
    tracing::info!(
        days = report.days_removed,
        shards = report.shards_removed,
        "sweep finished"
    );

    let cutoff = policy.cutoff(today);
    if report.days_removed == 0 {
        writeln!(writer, "Nothing recorded before {cutoff}.")?;
        return Ok(());
    }
    writeln!(
        writer,
        "Removed {} day record(s) before {cutoff} ({} week shard(s) deleted).",
        report.days_removed, report.shards_removed
    )?;
    writeln!(writer, "Totals in the summaries are unchanged.")?;
    Ok(())
}
