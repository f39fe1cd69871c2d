//! Study-time recorder.
//!
//! Turns a stream of liveness [`Signal`](st_core::Signal)s into persisted day
//! records.
//!
//! - [`RecorderSession`] owns the in-memory state of one recorder: signal
//!   fusion, tick integration and the deltas not yet flushed.
//! - [`PersistenceScheduler`] decides what a flush outcome means: deltas are
//!   kept for a retry after a transient failure, and a fatal one stops all
//!   further writes.
//! - [`replay`] drives a session from timestamped signals with synthetic ticks.
//! - [`Recorder`] is the live loop on a tokio runtime.

mod replay;
mod runtime;
mod scheduler;
mod session;

pub use replay::{ReplayReport, replay};
pub use runtime::{Clock, Recorder, RunSummary, SharedStorage, SystemClock};
pub use scheduler::{FlushReport, FlushStatus, PersistenceScheduler, write_batch};
pub use session::RecorderSession;
