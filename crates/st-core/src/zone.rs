//! Mapping instants onto the calendar days and hours records are keyed by.

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, Offset, Timelike, Utc};

/// The time zone used to decide which calendar day an instant belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocalZone {
    /// The system's local time zone.
    #[default]
    System,
    /// A fixed UTC offset.
    Fixed(FixedOffset),
}

impl LocalZone {
    /// Builds a zone from an optional offset in minutes east of UTC.
    ///
    /// Out-of-range offsets fall back to the system zone.
    pub fn from_offset_minutes(minutes: Option<i32>) -> Self {
        minutes
            .and_then(|m| FixedOffset::east_opt(m.saturating_mul(60)))
            .map_or(Self::System, Self::Fixed)
    }

    /// UTC, mostly for tests and fixtures.
    pub fn utc() -> Self {
        Self::Fixed(Utc.fix())
    }

    /// Calendar date of an instant in this zone.
    pub fn date_of(self, at: DateTime<Utc>) -> NaiveDate {
        match self {
            Self::System => at.with_timezone(&Local).date_naive(),
            Self::Fixed(offset) => at.with_timezone(&offset).date_naive(),
        }
    }

    /// Wall-clock date and time of an instant in this zone.
    pub fn naive_local(self, at: DateTime<Utc>) -> NaiveDateTime {
        match self {
            Self::System => at.with_timezone(&Local).naive_local(),
            Self::Fixed(offset) => at.with_timezone(&offset).naive_local(),
        }
    }

    /// Hour of day (0-23) of an instant in this zone.
    pub fn hour_of(self, at: DateTime<Utc>) -> u32 {
        match self {
            Self::System => at.with_timezone(&Local).hour(),
            Self::Fixed(offset) => at.with_timezone(&offset).hour(),
        }
    }

    /// Today's date in this zone.
    pub fn today(self) -> NaiveDate {
        self.date_of(Utc::now())
    }
}
