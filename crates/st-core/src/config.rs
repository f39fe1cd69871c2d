//! Recorder tuning knobs.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::zone::LocalZone;

/// Timing configuration for a recorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// How often the accumulator ticks. Default: 1000.
    pub tick_interval_ms: u64,

    /// Autosave period. Default: 30.
    pub flush_interval_secs: u64,

    /// Time without user activity after which study time stops counting.
    /// Default: 60.
    pub idle_threshold_secs: u64,

    /// Largest tick gap still treated as real elapsed time. Default: 60.
    pub max_plausible_gap_secs: u64,

    /// How long to wait for a media element before falling back to
    /// visibility-only tracking. Default: 10.
    pub media_wait_secs: u64,

    /// Fixed UTC offset for day boundaries; the system zone when unset.
    pub utc_offset_minutes: Option<i32>,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
            flush_interval_secs: 30,
            idle_threshold_secs: 60,
            max_plausible_gap_secs: 60,
            media_wait_secs: 10,
            utc_offset_minutes: None,
        }
    }
}

impl RecorderConfig {
    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn flush_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.flush_interval_secs.max(1))
    }

    /// [`Self::tick_interval`] as a chrono duration, for synthetic clocks.
    pub fn tick_period(&self) -> Duration {
        i64::try_from(self.tick_interval_ms.max(1))
            .ok()
            .and_then(Duration::try_milliseconds)
            .unwrap_or(Duration::MAX)
    }

    pub fn flush_period(&self) -> Duration {
        seconds(self.flush_interval_secs.max(1))
    }

    pub fn idle_threshold(&self) -> Duration {
        seconds(self.idle_threshold_secs)
    }

    pub fn max_plausible_gap(&self) -> Duration {
        seconds(self.max_plausible_gap_secs)
    }

    pub fn media_wait(&self) -> Duration {
        seconds(self.media_wait_secs)
    }

    pub fn zone(&self) -> LocalZone {
        LocalZone::from_offset_minutes(self.utc_offset_minutes)
    }
}

fn seconds(value: u64) -> Duration {
    i64::try_from(value)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}
