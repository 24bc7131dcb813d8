//! Serializable availability reports for front ends.

use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::conflict::ConflictRecord;
use crate::resolver::{AvailabilityResult, Suggestion};

/// One availability question as a front end hands it over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityRequest {
    pub room: String,
    pub start: String,
    pub end: String,
}

impl AvailabilityRequest {
    pub fn new(room: impl Into<String>, start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            room: room.into(),
            start: start.into(),
            end: end.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Available,
    Unavailable,
    Error,
}

/// The answer to one [`AvailabilityRequest`].
///
/// `conflicts` is always present (empty unless unavailable); `suggestion`
/// only when unavailable and a stand-in was found; `error` only on errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailabilityReport {
    pub room: String,
    pub start: String,
    pub end: String,
    pub status: Status,
    pub conflicts: Vec<ConflictRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<Suggestion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AvailabilityReport {
    pub fn new(request: &AvailabilityRequest, result: &AvailabilityResult) -> Self {
        let (status, conflicts, suggestion, error) = match result {
            AvailabilityResult::Available => (Status::Available, Vec::new(), None, None),
            AvailabilityResult::Unavailable {
                conflicts,
                suggestion,
            } => (
                Status::Unavailable,
                conflicts.clone(),
                suggestion.clone(),
                None,
            ),
            AvailabilityResult::Error(err) => {
                (Status::Error, Vec::new(), None, Some(err.to_string()))
            }
        };

        Self {
            room: request.room.trim().to_string(),
            start: request.start.clone(),
            end: request.end.clone(),
            status,
            conflicts,
            suggestion,
            error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == Status::Error
    }

    /// Re-render conflict instants in `tz`. The request strings are left as given.
    pub fn in_timezone(mut self, tz: Tz) -> Self {
        for conflict in &mut self.conflicts {
            conflict.start = shift(conflict.start, tz);
            conflict.end = shift(conflict.end, tz);
        }
        self
    }
}

fn shift(instant: DateTime<FixedOffset>, tz: Tz) -> DateTime<FixedOffset> {
    instant.with_timezone(&tz).fixed_offset()
}
