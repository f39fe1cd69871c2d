//! Core domain logic for study-time tracking.
//!
//! This crate contains the fundamental types and logic for:
//! - Signal fusion: deciding whether the current second is effective study time
//! - Accumulation: integrating ticks into total and effective time
//! - Records: the persisted day, index and summary shapes
//! - Week keys: the ISO-8601 week each day record is sharded under

mod accumulator;
pub mod config;
pub mod delta;
pub mod identity;
pub mod record;
pub mod signal;
pub mod types;
pub mod week;
pub mod zone;

pub use accumulator::{TickCredit, TickOutcome, TimeAccumulator};
pub use config::RecorderConfig;
pub use delta::{DayDelta, PendingDeltas, VideoDelta};
pub use identity::{ContentIdentity, ContentIdentityProvider, PatternIdentity};
pub use record::{DayRecord, GlobalSummary, MonthlySummary, VideoDayEntry, VideoIndexEntry};
pub use signal::{
    Applied, FlushReason, Signal, SignalCollector, SignalSnapshot, TimedSignal, Transition,
};
pub use types::{ContentId, PlaybackRate, ValidationError};
pub use week::{IsoWeek, week_key};
pub use zone::LocalZone;
