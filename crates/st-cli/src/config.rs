//! Configuration loading and management.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use st_core::identity::DEFAULT_CONTENT_PATTERNS;
use st_core::{LocalZone, PatternIdentity, RecorderConfig, ValidationError};
use st_store::RetentionPolicy;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,

    /// Days of day records kept by `st sweep`.
    pub retention_days: u32,

    /// Regexes mapping a page location to a content id. Each must have a
    /// named `id` group.
    pub content_patterns: Vec<String>,

    /// Recorder timing.
    #[serde(default)]
    pub recorder: RecorderConfig,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("st.db"),
            retention_days: RetentionPolicy::default().keep_days,
            content_patterns: DEFAULT_CONTENT_PATTERNS
                .iter()
                .map(|p| (*p).to_string())
                .collect(),
            recorder: RecorderConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    ///
    /// Later sources win: defaults, `~/.config/st/config.toml`, the given
    /// file, then `ST_*` environment variables (`ST_RECORDER__IDLE_THRESHOLD_SECS`
    /// sets `recorder.idle_threshold_secs`).
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (ST_*)
        figment = figment.merge(Env::prefixed("ST_").split("__"));

        figment.extract()
    }

    /// Time zone that decides which day study time belongs to.
    pub fn zone(&self) -> LocalZone {
        self.recorder.zone()
    }

    /// Content identity from the configured patterns.
    pub fn identity(&self) -> Result<PatternIdentity, ValidationError> {
        PatternIdentity::new(&self.content_patterns)
    }

    pub const fn retention(&self) -> RetentionPolicy {
        RetentionPolicy::new(self.retention_days)
    }
}

/// Returns the platform-specific config directory for st.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("st"))
}

/// Returns the platform-specific data directory for st.
///
/// On Linux: `~/.local/share/st`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("st"))
}
