//! Command-line argument definitions.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use st_store::StatsPeriod;

/// Study-time tracker.
///
/// Records attention-weighted video study time from liveness signals and
/// reports on it.
#[derive(Debug, Parser)]
#[command(name = "st", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Record live: read one JSON signal per line from stdin.
    ///
    /// Signals are stamped on arrival, e.g. `{"type":"play"}`. Recording
    /// stops at end of input or on an `unload` signal.
    Record,

    /// Replay a file of timestamped JSON signal lines.
    ///
    /// Ticks are synthesized between signals, so the result does not depend
    /// on how fast the file is read.
    Replay {
        /// File with one `{"at": ..., "type": ...}` object per line.
        file: PathBuf,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show aggregated study statistics.
    Stats {
        /// Reporting window: week, month, year or all.
        #[arg(short, long, default_value = "week")]
        period: StatsPeriod,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List recent study sessions, newest first.
    History {
        /// Maximum number of sessions to show.
        #[arg(short, long, default_value_t = 20)]
        limit: usize,

        /// Number of sessions to skip.
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show one day in detail, with an hourly breakdown.
    Day {
        /// Date as YYYY-MM-DD (default: today).
        date: Option<NaiveDate>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show every day a video was studied.
    Video {
        /// Content ID, e.g. BV1xx411c7mD.
        id: String,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show storage status and all-time totals.
    Status,

    /// Delete day records older than the retention window.
    Sweep {
        /// Days to keep (default: `retention_days` from config).
        #[arg(long)]
        keep_days: Option<u32>,
    },
}
