//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A content pattern failed to compile or lacks the `id` capture group.
    #[error("invalid content pattern {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },

    /// A date string was not in `YYYY-MM-DD` form.
    #[error("invalid date: {value}")]
    InvalidDate { value: String },
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// A validated content identifier.
    ///
    /// Content IDs are stable identifiers for one piece of video content, usually
    /// extracted from its URL (e.g. `BV1xx411c7mD`). They key the per-day video
    /// map and the video index, so they must be non-blank.
    ContentId, "content ID"
);

/// A media playback rate.
///
/// Values are sanitized on construction: non-finite or non-positive rates become
/// 1.0, everything else is clamped to the range browsers accept.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct PlaybackRate(f64);

impl PlaybackRate {
    /// Normal speed.
    pub const NORMAL: Self = Self(1.0);

    /// Slowest accepted rate.
    pub const MIN: f64 = 0.0625;

    /// Fastest accepted rate.
    pub const MAX: f64 = 16.0;

    /// Creates a rate, replacing nonsense values with normal speed.
    #[must_use]
    pub fn sanitized(value: f64) -> Self {
        if !value.is_finite() || value <= 0.0 {
            Self::NORMAL
        } else {
            Self(value.clamp(Self::MIN, Self::MAX))
        }
    }

    /// Returns the inner f64 value.
    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }
}

impl Default for PlaybackRate {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl fmt::Display for PlaybackRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.0)
    }
}

impl Serialize for PlaybackRate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PlaybackRate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Ok(Self::sanitized(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_id_rejects_blank() {
        assert!(ContentId::new("").is_err());
        assert!(ContentId::new("   ").is_err());
        assert!(ContentId::new("BV1xx411c7mD").is_ok());
    }

    #[test]
    fn content_id_serde_roundtrip() {
        let id = ContentId::new("BV1xx411c7mD").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"BV1xx411c7mD\"");
        let parsed: ContentId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn content_id_serde_rejects_empty() {
        let result: Result<ContentId, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }

    #[test]
    #[expect(
        clippy::float_cmp,
        reason = "exact equality intended for boundary tests"
    )]
    fn playback_rate_sanitizes_edge_cases() {
        assert_eq!(PlaybackRate::sanitized(f64::NAN).value(), 1.0);
        assert_eq!(PlaybackRate::sanitized(0.0).value(), 1.0);
        assert_eq!(PlaybackRate::sanitized(-2.0).value(), 1.0);
        assert_eq!(PlaybackRate::sanitized(f64::INFINITY).value(), 1.0);
        assert_eq!(PlaybackRate::sanitized(100.0).value(), 16.0);
        assert_eq!(PlaybackRate::sanitized(0.01).value(), 0.0625);
        assert_eq!(PlaybackRate::sanitized(1.5).value(), 1.5);
    }

    #[test]
    #[expect(
        clippy::float_cmp,
        reason = "exact equality intended for default value"
    )]
    fn playback_rate_deserialize_sanitizes() {
        let parsed: PlaybackRate = serde_json::from_str("-1.0").unwrap();
        assert_eq!(parsed.value(), 1.0);
        assert_eq!(PlaybackRate::default().value(), 1.0);
    }
}
