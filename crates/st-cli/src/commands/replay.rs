//! Replay command: feed a file of timestamped signals through the recorder.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};

use st_core::{ContentIdentityProvider, RecorderConfig, TimedSignal};
use st_recorder::ReplayReport;
use st_store::{KvStore, Storage};

use super::util::{format_duration, write_json};

/// Parses one JSON signal per line. Blank lines and `#` comments are skipped.
pub fn parse_signal_lines(input: &str) -> Result<Vec<TimedSignal>> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            serde_json::from_str(line.trim())
                .with_context(|| format!("invalid signal on line {}", index + 1))
        })
        .collect()
}

pub fn run<W: Write, K: KvStore, P: ContentIdentityProvider>(
    writer: &mut W,
    storage: &Storage<K>,
    config: &RecorderConfig,
    identity: P,
    file: &Path,
    json: bool,
) -> Result<()> {
    let input = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let signals = parse_signal_lines(&input)?;
    tracing::debug!(signals = signals.len(), "replaying signals");

    let report = st_recorder::replay(storage, config, identity, signals);
    if json {
        write_json(writer, &report)?;
    } else {
        write_report(writer, &report)?;
    }

    if report.fail_stopped {
        bail!(
            "storage failed during replay; {} not persisted",
            format_duration(report.unflushed_time)
        );
    }
    Ok(())
}

fn write_report<W: Write>(w: &mut W, report: &ReplayReport) -> Result<()> {
    writeln!(
        w,
        "Replayed {} signal(s) over {} tick(s).",
        report.signals, report.ticks
    )?;
    writeln!(w, "Total time       {}", format_duration(report.total_time))?;
    writeln!(w, "Effective time   {}", format_duration(report.effective_time))?;
    writeln!(
        w,
        "Longest session  {}",
        format_duration(report.longest_continuous_session)
    )?;
    writeln!(w, "Flushes          {}", report.flushes)?;
    if report.anomalies > 0 {
        writeln!(w, "Skipped {} implausible tick gap(s).", report.anomalies)?;
    }
    if report.unflushed_time > 0.0 {
        writeln!(
            w,
            "Not persisted    {}",
            format_duration(report.unflushed_time)
        )?;
    }
    Ok(())
}
