//! The fetch phase: read every implicated calendar once, concurrently, into a
//! [`Snapshot`] before any resolution starts.
//!
//! Calendars are independent, so the fan-out is bounded but unordered. A
//! calendar that keeps failing gets an empty event list and a recorded reason
//! instead of failing the batch.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::Duration;
use futures::stream::{self, StreamExt};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{FetchError, Result};
use crate::snapshot::{Event, Snapshot};
use crate::topology::Topology;
use crate::types::{CalendarId, RoomName, TimeWindow};

/// Something that can list the events on one calendar.
///
/// Implementations own transport concerns: authentication, timeouts,
/// cancellation. They should classify retryable failures as
/// [`FetchError::Transient`].
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn list_events(
        &self,
        calendar: &CalendarId,
        window: &TimeWindow,
    ) -> std::result::Result<Vec<Event>, FetchError>;
}

/// Fan-out limits for [`fetch_snapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Maximum calendars in flight at once.
    pub concurrency: usize,
    /// Total attempts per calendar, including the first.
    pub attempts: usize,
    pub retry_delay: StdDuration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            concurrency: 8,
            attempts: 2,
            retry_delay: StdDuration::from_millis(500),
        }
    }
}

/// The single window to fetch for a set of requests: earliest start minus
/// `buffer` through latest end plus `buffer`. `None` when there are no windows.
pub fn fetch_window<'a>(
    windows: impl IntoIterator<Item = &'a TimeWindow>,
    buffer: Duration,
) -> Option<TimeWindow> {
    windows
        .into_iter()
        .copied()
        .reduce(|acc, w| acc.union(&w))
        .map(|w| w.widen(buffer))
}

/// Calendars of every room implicated by `rooms`, fallback candidates included.
///
/// Rooms without a calendar are left out; the resolver reports them.
pub fn implicated_calendars<'a>(
    topology: &Topology,
    rooms: impl IntoIterator<Item = &'a RoomName>,
) -> Vec<CalendarId> {
    let mut seen = HashSet::new();
    rooms
        .into_iter()
        .flat_map(|room| topology.implicated_rooms(room))
        .filter_map(|room| topology.calendar_for(&room).cloned())
        .filter(|calendar| seen.insert(calendar.clone()))
        .collect()
}

/// Fetch `calendars` over `window` into a fresh snapshot.
pub async fn fetch_snapshot<S>(
    source: &S,
    calendars: impl IntoIterator<Item = CalendarId>,
    window: TimeWindow,
    options: &FetchOptions,
) -> Snapshot
where
    S: EventSource + ?Sized,
{
    let calendars: Vec<CalendarId> = calendars.into_iter().collect();
    let total = calendars.len();

    let results: Vec<(CalendarId, std::result::Result<Vec<Event>, FetchError>)> =
        stream::iter(calendars)
            .map(|calendar| async move {
                let result = fetch_with_retries(source, &calendar, &window, options).await;
                (calendar, result)
            })
            .buffer_unordered(options.concurrency.max(1))
            .collect()
            .await;

    let mut snapshot = Snapshot::for_window(window);
    for (calendar, result) in results {
        match result {
            Ok(events) => snapshot.insert(calendar, events),
            Err(err) => {
                warn!(calendar = %calendar, error = %err, "calendar fetch failed; reading it as empty");
                snapshot.record_failure(calendar, err.to_string());
            }
        }
    }

    info!(
        calendars = total,
        failures = snapshot.failure_count(),
        "fetched event snapshot"
    );
    snapshot
}

async fn fetch_with_retries<S>(
    source: &S,
    calendar: &CalendarId,
    window: &TimeWindow,
    options: &FetchOptions,
) -> std::result::Result<Vec<Event>, FetchError>
where
    S: EventSource + ?Sized,
{
    let max = options.attempts.max(1);
    let mut attempt = 0usize;

    loop {
        match source.list_events(calendar, window).await {
            Ok(events) => {
                debug!(calendar = %calendar, events = events.len(), attempt, "calendar fetched");
                return Ok(events);
            }
            Err(err) => {
                attempt += 1;
                if attempt >= max || !err.is_transient() {
                    return Err(err);
                }
                warn!(calendar = %calendar, attempt, error = %err, "retrying calendar fetch");
                sleep(options.retry_delay).await;
            }
        }
    }
}

/// An in-memory source: fixed events per calendar.
///
/// Returns the events overlapping the requested window, in stored order.
/// Events whose times cannot be parsed are passed through so the conflict
/// detector can skip them. Unknown calendars yield an empty list.
#[derive(Debug, Clone, Default)]
pub struct StaticEventSource {
    calendars: HashMap<CalendarId, Vec<Event>>,
}

impl StaticEventSource {
    pub fn new(calendars: HashMap<CalendarId, Vec<Event>>) -> Self {
        Self { calendars }
    }

    /// Load `{ "<calendar id>": [event, ...] }` from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let calendars: HashMap<CalendarId, Vec<Event>> = serde_json::from_str(raw)?;
        Ok(Self::new(calendars))
    }

    pub fn with_events(mut self, calendar: CalendarId, events: Vec<Event>) -> Self {
        self.calendars.entry(calendar).or_default().extend(events);
        self
    }
}

#[async_trait]
impl EventSource for StaticEventSource {
    async fn list_events(
        &self,
        calendar: &CalendarId,
        window: &TimeWindow,
    ) -> std::result::Result<Vec<Event>, FetchError> {
        let offset = *window.start.offset();
        let events = self
            .calendars
            .get(calendar)
            .map(|events| {
                events
                    .iter()
                    .filter(|event| {
                        match (event.start.resolve(offset), event.end.resolve(offset)) {
                            (Some(start), Some(end)) => window.overlaps(start, end),
                            _ => true,
                        }
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(events)
    }
}
