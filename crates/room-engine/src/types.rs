//! Core identifiers: room names, calendar ids, and request windows.

use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ResolveError;

/// A human-readable room name.
///
/// Equality and hashing ignore ASCII case and surrounding whitespace, so
/// `" di_dream room"` and `"DI_Dream Room"` name the same room. [`fmt::Display`]
/// keeps the trimmed original spelling.
#[derive(Debug, Clone)]
pub struct RoomName {
    display: String,
    key: String,
}

impl RoomName {
    pub fn new(name: &str) -> Self {
        let display = name.trim().to_string();
        let key = display.to_ascii_lowercase();
        Self { display, key }
    }

    pub fn as_str(&self) -> &str {
        &self.display
    }
}

impl PartialEq for RoomName {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for RoomName {}

impl Hash for RoomName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

impl From<&str> for RoomName {
    fn from(name: &str) -> Self {
        RoomName::new(name)
    }
}

impl Serialize for RoomName {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.display)
    }
}

impl<'de> Deserialize<'de> for RoomName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(RoomName::new(&raw))
    }
}

/// An opaque external calendar identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalendarId(String);

impl CalendarId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CalendarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CalendarId {
    fn from(id: &str) -> Self {
        CalendarId::new(id)
    }
}

/// A half-open interval `[start, end)` of timezone-aware instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeWindow {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl TimeWindow {
    /// Build a window, rejecting empty or inverted ranges.
    ///
    /// # Errors
    /// Returns `ResolveError::InvalidTimeRange` if `start >= end`.
    pub fn new(
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Self, ResolveError> {
        if start >= end {
            return Err(ResolveError::InvalidTimeRange(format!(
                "start {} is not before end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse a window from two offset-carrying datetime strings.
    ///
    /// Accepts RFC 3339 (`2025-06-28T15:00:00+08:00`) and the seconds-less form
    /// (`2025-06-28T15:00+08:00`). Naive datetimes are rejected.
    pub fn parse(start: &str, end: &str) -> Result<Self, ResolveError> {
        Self::new(parse_instant(start)?, parse_instant(end)?)
    }

    /// Reject a window that starts before `earliest`.
    ///
    /// # Errors
    /// Returns `ResolveError::InvalidTimeRange` if `start < earliest`.
    pub fn not_before(self, earliest: DateTime<FixedOffset>) -> Result<Self, ResolveError> {
        if self.start < earliest {
            return Err(ResolveError::InvalidTimeRange(format!(
                "start {} is before {}",
                self.start.to_rfc3339(),
                earliest.to_rfc3339()
            )));
        }
        Ok(self)
    }

    /// The window grown by `buffer` on both sides.
    pub fn widen(&self, buffer: Duration) -> Self {
        Self {
            start: self.start - buffer,
            end: self.end + buffer,
        }
    }

    /// The smallest window covering both `self` and `other`.
    pub fn union(&self, other: &TimeWindow) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Whether `[start, end)` shares any instant with this window.
    pub fn overlaps(&self, start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> bool {
        start < self.end && end > self.start
    }
}

/// Parse an offset-carrying instant.
pub fn parse_instant(raw: &str) -> Result<DateTime<FixedOffset>, ResolveError> {
    let trimmed = raw.trim();
    DateTime::parse_from_rfc3339(trimmed)
        .or_else(|_| DateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M%:z"))
        .map_err(|e| ResolveError::InvalidTimeRange(format!("'{}': {}", raw, e)))
}
