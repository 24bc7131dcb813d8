//! Calendar events and the request-scoped snapshot the resolver reads.
//!
//! Events are kept in their calendar-API shape (`dateTime` or all-day `date`)
//! and parsed lazily by the conflict detector, so a malformed event only ever
//! skips itself.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use crate::types::{CalendarId, TimeWindow};

/// Title used for events without a summary.
pub const UNTITLED: &str = "No Title";

/// One end of an event: a timed instant or an all-day date.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl EventTime {
    pub fn at(instant: DateTime<FixedOffset>) -> Self {
        Self {
            date_time: Some(instant.to_rfc3339()),
            date: None,
        }
    }

    pub fn all_day(date: NaiveDate) -> Self {
        Self {
            date_time: None,
            date: Some(date.format("%Y-%m-%d").to_string()),
        }
    }

    /// Resolve to an instant. `dateTime` wins over `date`; an all-day `date` is
    /// taken as midnight at `offset`. Returns `None` when neither parses.
    pub fn resolve(&self, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
        if let Some(raw) = &self.date_time {
            return DateTime::parse_from_rfc3339(raw.trim()).ok();
        }
        let date = NaiveDate::parse_from_str(self.date.as_deref()?.trim(), "%Y-%m-%d").ok()?;
        offset
            .from_local_datetime(&date.and_hms_opt(0, 0, 0)?)
            .single()
    }
}

/// A booking on one calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub start: EventTime,
    pub end: EventTime,
}

impl Event {
    /// A timed event.
    pub fn new(
        summary: impl Into<String>,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            summary: Some(summary.into()),
            start: EventTime::at(start),
            end: EventTime::at(end),
        }
    }

    pub fn title(&self) -> &str {
        self.summary.as_deref().unwrap_or(UNTITLED)
    }
}

/// Events per calendar, fetched once for one top-level check.
///
/// A calendar whose fetch failed holds an empty list and a recorded reason;
/// whether that reason matters is the resolver's call.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    window: Option<TimeWindow>,
    events: HashMap<CalendarId, Vec<Event>>,
    failures: HashMap<CalendarId, String>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty snapshot that remembers the window it covers.
    pub fn for_window(window: TimeWindow) -> Self {
        Self {
            window: Some(window),
            ..Self::default()
        }
    }

    pub fn window(&self) -> Option<&TimeWindow> {
        self.window.as_ref()
    }

    /// Set the events for a calendar, replacing any previous list.
    pub fn insert(&mut self, calendar: CalendarId, events: Vec<Event>) {
        self.failures.remove(&calendar);
        self.events.insert(calendar, events);
    }

    /// Record a failed fetch. The calendar reads as empty.
    pub fn record_failure(&mut self, calendar: CalendarId, reason: impl Into<String>) {
        self.events.insert(calendar.clone(), Vec::new());
        self.failures.insert(calendar, reason.into());
    }

    /// Events for a calendar; empty when the calendar was never fetched.
    pub fn events(&self, calendar: &CalendarId) -> &[Event] {
        self.events.get(calendar).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn failure(&self, calendar: &CalendarId) -> Option<&str> {
        self.failures.get(calendar).map(String::as_str)
    }

    pub fn contains(&self, calendar: &CalendarId) -> bool {
        self.events.contains_key(calendar)
    }

    pub fn calendar_count(&self) -> usize {
        self.events.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }
}
