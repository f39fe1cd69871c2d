//! Day records sharded by ISO week.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};

use st_core::week::SHARD_PREFIX;
use st_core::{DayRecord, IsoWeek};

use crate::{KvStore, StoreError, get_json, set_json};

/// The day records of one ISO week, by date.
pub type WeekShard = BTreeMap<NaiveDate, DayRecord>;

/// Result of [`WeekShardStore::save_day`].
#[derive(Debug, Clone, PartialEq)]
pub struct DaySave {
    /// The record before the patch; `None` if this save created it.
    pub previous: Option<DayRecord>,
    /// The record as written.
    pub record: DayRecord,
}

impl DaySave {
    /// Whether this save gave the day its first recorded time.
    ///
    /// A record created by a counters-only flush does not count as active
    /// until a later flush adds time to it.
    pub fn became_active(&self) -> bool {
        let before = self.previous.as_ref().map_or(0.0, |p| p.total_time);
        before <= 0.0 && self.record.total_time > 0.0
    }
}

/// Typed view over the `study_{year}_W{week}` keys.
///
/// Each save is a read-modify-write of a whole shard. Two writers saving
/// different days of the same week at the same moment can lose one update.
#[derive(Debug, Clone, Copy)]
pub struct WeekShardStore<'a, K> {
    kv: &'a K,
}

impl<'a, K: KvStore> WeekShardStore<'a, K> {
    pub const fn new(kv: &'a K) -> Self {
        Self { kv }
    }

    /// Loads a shard by key. A missing shard is empty.
    ///
    /// Entries whose key is not a date are dropped.
    pub fn get_week(&self, key: &str) -> Result<WeekShard, StoreError> {
        let stored: BTreeMap<String, DayRecord> = get_json(self.kv, key)?.unwrap_or_default();
        let mut shard = WeekShard::new();
        for (raw_date, mut record) in stored {
            let Ok(date) = NaiveDate::parse_from_str(&raw_date, "%Y-%m-%d") else {
                tracing::warn!(key, date = %raw_date, "dropping shard entry with invalid date");
                continue;
            };
            record.date = date;
            shard.insert(date, record);
        }
        Ok(shard)
    }

    /// Writes a whole shard, or removes the key if the shard is empty.
    pub fn put_week(&self, key: &str, shard: &WeekShard) -> Result<(), StoreError> {
        if shard.is_empty() {
            return self.kv.remove(key);
        }
        let stored: BTreeMap<String, &DayRecord> = shard
            .iter()
            .map(|(date, record)| (date.format("%Y-%m-%d").to_string(), record))
            .collect();
        set_json(self.kv, key, &stored)
    }

    pub fn remove_week(&self, key: &str) -> Result<(), StoreError> {
        self.kv.remove(key)
    }

    /// The record for `date`, if one was ever saved.
    pub fn get_day(&self, date: NaiveDate) -> Result<Option<DayRecord>, StoreError> {
        let key = IsoWeek::of(date).key();
        Ok(self.get_week(&key)?.remove(&date))
    }

    /// Applies `patch` to the day's record, creating a default one first if
    /// needed, and writes the owning shard back.
    pub fn save_day(
        &self,
        date: NaiveDate,
        patch: impl FnOnce(&mut DayRecord),
    ) -> Result<DaySave, StoreError> {
        let key = IsoWeek::of(date).key();
        let mut shard = self.get_week(&key)?;
        let previous = shard.get(&date).cloned();
        let mut record = previous.clone().unwrap_or_else(|| DayRecord::new(date));
        patch(&mut record);
        record.date = date;
        shard.insert(date, record.clone());
        self.put_week(&key, &shard)?;
        tracing::debug!(%date, key, created = previous.is_none(), "saved day record");
        Ok(DaySave { previous, record })
    }

    /// Stored records with dates in `[start, end]`, ascending.
    pub fn days_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DayRecord>, StoreError> {
        let mut days = Vec::new();
        let mut cursor = start;
        while cursor <= end {
            let week = IsoWeek::of(cursor);
            let shard = self.get_week(&week.key())?;
            days.extend(
                shard
                    .into_iter()
                    .filter(|(date, _)| (start..=end).contains(date))
                    .map(|(_, record)| record),
            );
            let Some(next) = week.monday().and_then(|m| m.checked_add_signed(Duration::days(7)))
            else {
                break;
            };
            cursor = next;
        }
        Ok(days)
    }

    /// Every stored week, ascending. Keys that are not week keys are skipped.
    pub fn weeks(&self) -> Result<Vec<IsoWeek>, StoreError> {
        let mut weeks: Vec<IsoWeek> = self
            .kv
            .keys_with_prefix(SHARD_PREFIX)?
            .iter()
            .filter_map(|key| key.parse().ok())
            .collect();
        weeks.sort_unstable();
        Ok(weeks)
    }

    /// Date of the oldest stored record, if any.
    pub fn first_day(&self) -> Result<Option<NaiveDate>, StoreError> {
        for week in self.weeks()? {
            if let Some(first) = self.get_week(&week.key())?.into_keys().next() {
                return Ok(Some(first));
            }
        }
        Ok(None)
    }

    /// Every stored record, ascending by date.
    pub fn all_days(&self) -> Result<Vec<DayRecord>, StoreError> {
        let mut days = Vec::new();
        for week in self.weeks()? {
            days.extend(self.get_week(&week.key())?.into_values());
        }
        Ok(days)
    }
}
