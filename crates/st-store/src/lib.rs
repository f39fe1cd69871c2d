//! Storage layer for study-time tracking.
//!
//! Everything is persisted through a flat key-value interface ([`KvStore`]) with
//! JSON values. On top of it sit:
//! - [`WeekShardStore`]: day records, one key per ISO week
//! - [`VideoIndex`]: content id → dates studied
//! - [`SummaryAggregator`]: monthly and all-time rollups
//! - [`QueryFacade`]: the read API used for reports
//!
//! # Consistency
//!
//! There are no multi-key transactions. A flush writes the day record, the video
//! index and the summaries as independent operations, and a failure part way
//! through is not rolled back. Each write is a read-modify-write of one key, so
//! two writers touching the same key at the same moment can lose one update.
//!
//! # Key layout
//!
//! | Key                     | Value                                   |
//! |-------------------------|-----------------------------------------|
//! | `study_{year}_W{week}`  | `{date: DayRecord}`                     |
//! | `index_videos`          | `{contentId: {title, dates}}`           |
//! | `summary_{year}_{mm}`   | `MonthlySummary`                        |
//! | `summary_all`           | `GlobalSummary`                         |

mod index;
mod memory;
mod query;
mod retention;
mod shard;
mod sqlite;
mod summary;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use st_core::LocalZone;

pub use index::{VIDEO_INDEX_KEY, VideoIndex, VideoIndexMap};
pub use memory::MemoryKv;
pub use query::{
    DailyDetail, DailyPoint, HistoryEntry, HourBucket, QueryFacade, StatsPeriod, StatsReport,
    UnknownPeriod, VideoDateDuration, VideoDetail, VideoTotal,
};
pub use retention::{RetentionPolicy, SweepReport};
pub use shard::{DaySave, WeekShard, WeekShardStore};
pub use sqlite::SqliteKv;
pub use summary::{GLOBAL_SUMMARY_KEY, SummaryAggregator, month_key};

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored value could not be decoded.
    #[error("invalid stored value for {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    /// A value could not be encoded for storage.
    #[error("failed to encode value for {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    /// The backing store is gone for good (e.g. its host context was invalidated).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    /// The backing store refused this operation but may accept a retry.
    #[error("storage temporarily unavailable: {0}")]
    Transient(String),
}

impl StoreError {
    /// Whether retrying can never succeed.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Unavailable(_) => true,
            Self::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::CannotOpen
                    | rusqlite::ErrorCode::NotADatabase
                    | rusqlite::ErrorCode::DatabaseCorrupt
                    | rusqlite::ErrorCode::PermissionDenied
                    | rusqlite::ErrorCode::ReadOnly
            ),
            _ => false,
        }
    }
}

/// A flat string key-value store.
///
/// Implementations only need single-key atomicity.
pub trait KvStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// All keys starting with `prefix`, in ascending order.
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

impl<K: KvStore + ?Sized> KvStore for &K {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        (**self).keys_with_prefix(prefix)
    }
}

/// Reads and decodes a JSON value.
pub fn get_json<T: DeserializeOwned>(
    kv: &(impl KvStore + ?Sized),
    key: &str,
) -> Result<Option<T>, StoreError> {
    kv.get(key)?
        .map(|raw| {
            serde_json::from_str(&raw).map_err(|source| StoreError::Decode {
                key: key.to_string(),
                source,
            })
        })
        .transpose()
}

/// Encodes and writes a JSON value.
pub fn set_json<T: Serialize + ?Sized>(
    kv: &(impl KvStore + ?Sized),
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(value).map_err(|source| StoreError::Encode {
        key: key.to_string(),
        source,
    })?;
    kv.set(key, &raw)
}

/// Entry point bundling a key-value backend with the typed views over it.
#[derive(Debug)]
pub struct Storage<K> {
    kv: K,
}

impl<K: KvStore> Storage<K> {
    pub const fn new(kv: K) -> Self {
        Self { kv }
    }

    pub const fn kv(&self) -> &K {
        &self.kv
    }

    pub const fn shards(&self) -> WeekShardStore<'_, K> {
        WeekShardStore::new(&self.kv)
    }

    pub const fn videos(&self) -> VideoIndex<'_, K> {
        VideoIndex::new(&self.kv)
    }

    pub const fn summaries(&self) -> SummaryAggregator<'_, K> {
        SummaryAggregator::new(&self.kv)
    }

    /// Read API, with dates and hours interpreted in `zone`.
    pub const fn query(&self, zone: LocalZone) -> QueryFacade<'_, K> {
        QueryFacade::new(&self.kv, zone)
    }
}

impl Storage<SqliteKv> {
    /// Opens a SQLite-backed store at the given path, creating it if necessary.
    pub fn open(path: &std::path::Path) -> Result<Self, StoreError> {
        Ok(Self::new(SqliteKv::open(path)?))
    }
}

impl Storage<MemoryKv> {
    /// An empty in-memory store.
    pub fn in_memory() -> Self {
        Self::new(MemoryKv::default())
    }
}
