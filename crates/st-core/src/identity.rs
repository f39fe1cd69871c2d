//! Mapping page locations to stable content ids.

use regex::Regex;

use crate::types::{ContentId, ValidationError};

/// The content a location refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentIdentity {
    pub id: ContentId,
    /// Best-effort title; may be missing while the page is still loading.
    pub title: Option<String>,
}

/// Resolves the current location to a content id.
pub trait ContentIdentityProvider {
    /// Returns `None` when the location is not a piece of video content.
    fn identify(&self, location: &str, title: Option<&str>) -> Option<ContentIdentity>;
}

/// Patterns used when no configuration overrides them.
pub const DEFAULT_CONTENT_PATTERNS: &[&str] = &[
    r"/video/(?P<id>BV[0-9A-Za-z]{10})",
    r"[?&]v=(?P<id>[0-9A-Za-z_-]{11})",
    r"/watch/(?P<id>[0-9A-Za-z_-]+)",
];

/// Identifies content by matching the location against regexes.
///
/// Each pattern must have a named `id` capture group. The first matching
/// pattern wins.
#[derive(Debug, Clone)]
pub struct PatternIdentity {
    patterns: Vec<Regex>,
}

impl PatternIdentity {
    pub fn new<I, S>(patterns: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| {
                let pattern = p.as_ref();
                let regex = Regex::new(pattern).map_err(|e| ValidationError::InvalidPattern {
                    pattern: pattern.to_string(),
                    message: e.to_string(),
                })?;
                if !regex.capture_names().any(|name| name == Some("id")) {
                    return Err(ValidationError::InvalidPattern {
                        pattern: pattern.to_string(),
                        message: "missing named capture group `id`".to_string(),
                    });
                }
                Ok(regex)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// The built-in patterns.
    pub fn with_defaults() -> Result<Self, ValidationError> {
        Self::new(DEFAULT_CONTENT_PATTERNS)
    }
}

impl ContentIdentityProvider for PatternIdentity {
    fn identify(&self, location: &str, title: Option<&str>) -> Option<ContentIdentity> {
        let id = self.patterns.iter().find_map(|re| {
            re.captures(location)
                .and_then(|caps| caps.name("id"))
                .and_then(|m| ContentId::new(m.as_str()).ok())
        })?;
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        Some(ContentIdentity { id, title })
    }
}
