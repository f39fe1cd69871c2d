//! Tick integration.
//!
//! The recorder ticks roughly once a second. Each tick credits the wall-clock
//! time since the previous tick, so timer jitter never accumulates as drift.
//! Gaps that cannot come from a running timer (the machine slept, the clock
//! jumped backwards) are discarded rather than credited.

use chrono::{DateTime, Duration, Utc};

use crate::types::PlaybackRate;

/// Time credited by one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickCredit {
    /// Previous tick instant; the credited interval is `[since, now)`.
    pub since: DateTime<Utc>,
    /// Wall-clock seconds.
    pub elapsed: f64,
    /// Rate-scaled seconds; zero unless the tick was effective.
    pub effective: f64,
    /// Length of the current uninterrupted effective run, after this tick.
    pub continuous: f64,
}

/// Result of a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// First tick after start; nothing to credit yet.
    Primed,
    /// Elapsed time was implausible and was dropped.
    Anomaly { elapsed_ms: i64 },
    Counted(TickCredit),
}

/// Integrates ticks into session totals.
#[derive(Debug, Clone)]
pub struct TimeAccumulator {
    max_gap: Duration,
    last_tick: Option<DateTime<Utc>>,
    total: f64,
    effective: f64,
    continuous: f64,
    longest: f64,
}

impl TimeAccumulator {
    pub const fn new(max_gap: Duration) -> Self {
        Self {
            max_gap,
            last_tick: None,
            total: 0.0,
            effective: 0.0,
            continuous: 0.0,
            longest: 0.0,
        }
    }

    /// Integrates the time since the previous tick.
    pub fn tick(&mut self, now: DateTime<Utc>, effective: bool, rate: PlaybackRate) -> TickOutcome {
        let Some(last) = self.last_tick.replace(now) else {
            return TickOutcome::Primed;
        };

        let gap = now - last;
        if gap <= Duration::zero() || gap > self.max_gap {
            tracing::debug!(
                elapsed_ms = gap.num_milliseconds(),
                "discarding implausible tick gap"
            );
            return TickOutcome::Anomaly {
                elapsed_ms: gap.num_milliseconds(),
            };
        }

        let elapsed = gap.num_milliseconds() as f64 / 1000.0;
        self.total += elapsed;
        let credited = if effective {
            self.continuous += elapsed;
            elapsed * rate.value()
        } else {
            self.continuous = 0.0;
            0.0
        };
        self.effective += credited;
        self.longest = self.longest.max(self.continuous);

        TickOutcome::Counted(TickCredit {
            since: last,
            elapsed,
            effective: credited,
            continuous: self.continuous,
        })
    }

    pub const fn last_tick(&self) -> Option<DateTime<Utc>> {
        self.last_tick
    }

    /// Wall-clock seconds credited this session.
    pub const fn total(&self) -> f64 {
        self.total
    }

    /// Effective seconds credited this session.
    pub const fn effective(&self) -> f64 {
        self.effective
    }

    /// Longest continuous effective run this session.
    pub const fn longest(&self) -> f64 {
        self.longest
    }
}
