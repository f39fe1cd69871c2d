//! ISO-8601 week keys.
//!
//! Day records are grouped into one stored shard per ISO week. The shard key is
//! part of the on-disk format: changing how a date maps to a key orphans every
//! shard written before the change.
//!
//! # Derivation
//!
//! ISO weeks start on Monday, and week 1 is the week containing the year's first
//! Thursday. So the week a date belongs to is decided by that week's Thursday:
//! shift the date to the Thursday of its Monday-based week; the Thursday's
//! calendar year is the ISO year, and its zero-based day-of-year divided by 7,
//! plus one, is the ISO week number.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Prefix shared by all week shard keys.
pub const SHARD_PREFIX: &str = "study_";

/// An ISO year and week number pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IsoWeek {
    pub year: i32,
    pub week: u32,
}

impl IsoWeek {
    /// Computes the ISO week a date belongs to.
    pub fn of(date: NaiveDate) -> Self {
        let offset = 3 - i64::from(date.weekday().num_days_from_monday());
        let thursday = date + Duration::days(offset);
        Self {
            year: thursday.year(),
            week: thursday.ordinal0() / 7 + 1,
        }
    }

    /// Monday of this week, or `None` for a week that does not exist.
    pub fn monday(self) -> Option<NaiveDate> {
        NaiveDate::from_isoywd_opt(self.year, self.week, Weekday::Mon)
    }

    /// Storage key of the shard holding this week's day records.
    pub fn key(self) -> String {
        format!("{SHARD_PREFIX}{}_W{:02}", self.year, self.week)
    }
}

impl fmt::Display for IsoWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.week)
    }
}

/// Error returned when a string is not a week shard key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotAWeekKey(String);

impl fmt::Display for NotAWeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not a week shard key: {}", self.0)
    }
}

impl std::error::Error for NotAWeekKey {}

impl FromStr for IsoWeek {
    type Err = NotAWeekKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || NotAWeekKey(s.to_string());
        let rest = s.strip_prefix(SHARD_PREFIX).ok_or_else(err)?;
        let (year, week) = rest.split_once("_W").ok_or_else(err)?;
        let year: i32 = year.parse().map_err(|_| err())?;
        let week: u32 = week.parse().map_err(|_| err())?;
        if !(1..=53).contains(&week) {
            return Err(err());
        }
        Ok(Self { year, week })
    }
}

/// Shard key for the week containing `date`, e.g. `study_2025_W01`.
pub fn week_key(date: NaiveDate) -> String {
    IsoWeek::of(date).key()
}
