//! Detect bookings that collide with a requested window once setup/teardown
//! buffers are applied.
//!
//! The buffer pads each event on both sides; the request window is never
//! padded. Touching at the padded boundary is NOT a conflict.

use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::snapshot::Event;
use crate::types::TimeWindow;

/// Default setup/teardown padding around every booking.
pub const DEFAULT_BUFFER_MINUTES: i64 = 30;

/// A booking that blocks the requested window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub room: String,
    pub title: String,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub note: String,
}

/// Conflict note for a given buffer, e.g. `"30-min buffer conflict"`.
pub fn buffer_note(buffer: Duration) -> String {
    format!("{}-min buffer conflict", buffer.num_minutes())
}

/// Whether a single event window collides with the request once buffered.
///
/// `request.start < end + buffer && request.end > start - buffer`, both strict.
pub fn conflicts_with(
    request: &TimeWindow,
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
    buffer: Duration,
) -> bool {
    request.start < end + buffer && request.end > start - buffer
}

/// Find every event on one room's calendar that collides with `request`.
///
/// Records come back in event order. Events whose start or end cannot be
/// parsed are skipped. All-day events are read as midnight in the offset of
/// `request.start`.
pub fn find_conflicts(
    room: &str,
    events: &[Event],
    request: &TimeWindow,
    buffer: Duration,
) -> Vec<ConflictRecord> {
    let offset = *request.start.offset();
    let note = buffer_note(buffer);

    events
        .iter()
        .filter_map(|event| {
            let start = event.start.resolve(offset)?;
            let end = event.end.resolve(offset)?;
            conflicts_with(request, start, end, buffer).then(|| ConflictRecord {
                room: room.to_string(),
                title: event.title().to_string(),
                start,
                end,
                note: note.clone(),
            })
        })
        .collect()
}
