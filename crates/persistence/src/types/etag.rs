//! Entity tags.
//!
//! An [`Etag`] is the opaque version token stamped on every write. Fresh
//! tokens are UUIDv7 values, so the token itself carries the write time; the
//! `_lastupdated_on` field shown to clients is derived from it and never
//! stored.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An opaque version token.
///
/// # Examples
///
/// ```
/// use docgate_persistence::types::Etag;
///
/// let first = Etag::generate();
/// let second = Etag::generate();
/// assert_ne!(first, second);
/// assert!(first.timestamp().is_some());
///
/// // Tokens written by other tools are accepted as-is.
/// let foreign = Etag::from("abc");
/// assert_eq!(foreign.as_str(), "abc");
/// assert!(foreign.timestamp().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Etag(String);

impl Etag {
    /// Generates a fresh, time-ordered token.
    pub fn generate() -> Self {
        Etag(Uuid::now_v7().simple().to_string())
    }

    /// Parses a token received in an `If-Match` header.
    ///
    /// Surrounding quotes and a weak validator prefix are removed. Returns
    /// `None` for an empty value.
    pub fn from_header(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        let trimmed = trimmed.strip_prefix("W/").unwrap_or(trimmed);
        let trimmed = trimmed.trim_matches('"');
        if trimmed.is_empty() {
            None
        } else {
            Some(Etag(trimmed.to_string()))
        }
    }

    /// Returns the token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the write time embedded in the token, when it has one.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let uuid = Uuid::parse_str(&self.0).ok()?;
        let ts = uuid.get_timestamp()?;
        let (secs, nanos) = ts.to_unix();
        Utc.timestamp_opt(secs as i64, nanos).single()
    }
}

impl fmt::Display for Etag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Etag {
    fn from(value: &str) -> Self {
        Etag(value.to_string())
    }
}

impl From<String> for Etag {
    fn from(value: String) -> Self {
        Etag(value)
    }
}
