//! CLI subcommand implementations.

pub mod day;
pub mod history;
pub mod record;
pub mod replay;
pub mod stats;
pub mod status;
pub mod sweep;
pub mod util;
pub mod video;
