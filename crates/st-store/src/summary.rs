//! Monthly and all-time rollups, maintained on every flush.

use chrono::{Datelike, NaiveDate};

use st_core::{DayDelta, GlobalSummary, MonthlySummary};

use crate::{KvStore, StoreError, get_json, set_json};

/// Storage key of the all-time summary.
pub const GLOBAL_SUMMARY_KEY: &str = "summary_all";

/// Storage key of a month's summary, e.g. `summary_2025_01`.
pub fn month_key(year: i32, month: u32) -> String {
    format!("summary_{year}_{month:02}")
}

/// Typed view over the summary keys.
#[derive(Debug, Clone, Copy)]
pub struct SummaryAggregator<'a, K> {
    kv: &'a K,
}

impl<'a, K: KvStore> SummaryAggregator<'a, K> {
    pub const fn new(kv: &'a K) -> Self {
        Self { kv }
    }

    /// Adds one flushed delta to the month and global summaries.
    ///
    /// The two writes are independent: a failed month write does not stop the
    /// global one. The first error is returned.
    pub fn update(
        &self,
        date: NaiveDate,
        delta: &DayDelta,
        first_flush_of_day: bool,
    ) -> Result<(), StoreError> {
        let month = self.update_month(date, delta, first_flush_of_day);
        let global = self.update_global(date, delta, first_flush_of_day);
        month.and(global)
    }

    /// Summary for a month; zeroed if nothing was recorded.
    pub fn get_month(&self, year: i32, month: u32) -> Result<MonthlySummary, StoreError> {
        Ok(get_json(self.kv, &month_key(year, month))?.unwrap_or_default())
    }

    /// All-time summary; zeroed if nothing was recorded.
    pub fn get_global(&self) -> Result<GlobalSummary, StoreError> {
        Ok(get_json(self.kv, GLOBAL_SUMMARY_KEY)?.unwrap_or_default())
    }

    fn update_month(
        &self,
        date: NaiveDate,
        delta: &DayDelta,
        first_flush_of_day: bool,
    ) -> Result<(), StoreError> {
        let key = month_key(date.year(), date.month());
        let mut summary: MonthlySummary = get_json(self.kv, &key)?.unwrap_or_default();
        summary.absorb(delta, first_flush_of_day);
        set_json(self.kv, &key, &summary)
    }

    fn update_global(
        &self,
        date: NaiveDate,
        delta: &DayDelta,
        first_flush_of_day: bool,
    ) -> Result<(), StoreError> {
        let mut summary = self.get_global()?;
        summary.absorb(date, delta, first_flush_of_day);
        set_json(self.kv, GLOBAL_SUMMARY_KEY, &summary)
    }
}
