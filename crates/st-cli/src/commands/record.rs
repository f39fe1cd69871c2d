//! Record command: live recording from signals piped on stdin.

use std::io::Write;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use st_core::{ContentIdentityProvider, RecorderConfig, Signal, TimedSignal};
use st_recorder::{Recorder, RunSummary, SystemClock};
use st_store::{KvStore, Storage};

use super::util::format_duration;

/// Signals buffered between the stdin reader and the recorder.
const SIGNAL_BUFFER: usize = 64;

pub fn run<W, K, P>(
    writer: &mut W,
    storage: Storage<K>,
    config: &RecorderConfig,
    identity: P,
) -> Result<()>
where
    W: Write,
    K: KvStore + Send + 'static,
    P: ContentIdentityProvider,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let recorder = Recorder::new(Arc::new(Mutex::new(storage)), config, identity, SystemClock);
    tracing::info!(instance = %recorder.instance(), "recording from stdin");
    let (tx, rx) = mpsc::channel(SIGNAL_BUFFER);

    let summary = runtime.block_on(async move {
        let reader = tokio::spawn(forward_signals(BufReader::new(tokio::io::stdin()), tx));
        let summary = recorder.run(rx).await;
        reader.abort();
        summary
    });
    // Stdin reads block a pool thread that may never return.
    runtime.shutdown_background();

    write_summary(writer, &summary)?;
    if summary.fail_stopped {
        bail!(
            "storage failed while recording; {} not persisted",
            format_duration(summary.unflushed_time)
        );
    }
    Ok(())
}

/// Stamps each JSON line with the current time and forwards it.
///
/// Invalid lines are logged and skipped. Returns how many signals were sent.
async fn forward_signals<R>(reader: R, tx: mpsc::Sender<TimedSignal>) -> usize
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut forwarded = 0;
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(error = %err, "failed to read signal input");
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let signal: Signal = match serde_json::from_str(line) {
            Ok(signal) => signal,
            Err(err) => {
                tracing::warn!(error = %err, "skipping invalid signal");
                continue;
            }
        };
        let timed = TimedSignal {
            at: Utc::now(),
            signal,
        };
        if tx.send(timed).await.is_err() {
            tracing::debug!("recorder stopped accepting signals");
            break;
        }
        forwarded += 1;
    }
    forwarded
}

fn write_summary<W: Write>(w: &mut W, summary: &RunSummary) -> Result<()> {
    writeln!(
        w,
        "Recorded {} signal(s) over {} tick(s).",
        summary.signals, summary.ticks
    )?;
    writeln!(w, "Total time       {}", format_duration(summary.total_time))?;
    writeln!(w, "Effective time   {}", format_duration(summary.effective_time))?;
    writeln!(w, "Flushes          {}", summary.flushes)?;
    Ok(())
}
