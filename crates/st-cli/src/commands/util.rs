//! Shared formatting helpers for CLI commands.

use std::io::Write;

use anyhow::Result;
use serde::Serialize;

/// Formats seconds as hours and minutes (e.g., "2h 30m" or "45m").
///
/// Partial minutes are floored. Negative and non-finite values format as "0m".
pub fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "0m".to_string();
    }
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "seconds is finite and non-negative; saturating at u64::MAX is fine"
    )]
    let total_minutes = (seconds / 60.0).floor() as u64;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if hours >= 1 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Renders a 10-cell bar for `value` relative to `max`.
pub fn progress_bar(value: f64, max: f64) -> String {
    if max <= 0.0 || value <= 0.0 {
        return "░".repeat(10);
    }

    let ratio = value / max;
    let filled = if ratio < 0.05 {
        1 // Minimum 1 for visibility
    } else {
        #[expect(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "clamped to 0..=10"
        )]
        let cells = (ratio * 10.0).round().clamp(0.0, 10.0) as usize;
        cells
    };

    format!("{}{}", "█".repeat(filled), "░".repeat(10 - filled))
}

/// Formats a ratio in `[0, 1]` as a whole percentage.
pub fn percent(ratio: f64) -> String {
    if !ratio.is_finite() {
        return "0%".to_string();
    }
    format!("{:.0}%", ratio * 100.0)
}

/// Writes `value` as pretty JSON followed by a newline.
pub fn write_json<W: Write, T: Serialize>(writer: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, value)?;
    writeln!(writer)?;
    Ok(())
}
