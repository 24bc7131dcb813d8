//! One-shot availability checks: fetch once, then resolve every request.

use chrono::{DateTime, FixedOffset};
use tracing::{debug, info};

use crate::config::Settings;
use crate::fetch::{fetch_snapshot, fetch_window, implicated_calendars, EventSource};
use crate::report::{AvailabilityReport, AvailabilityRequest};
use crate::resolver::{AvailabilityResult, Resolver};
use crate::topology::Topology;
use crate::types::{RoomName, TimeWindow};

/// Answer every request against a single snapshot.
///
/// Requests with unparseable or inverted times are answered with an
/// `InvalidTimeRange` error and do not widen the fetch. Reports come back in
/// request order; each request is resolved with its own visited/memo state.
pub async fn check<S>(
    topology: &Topology,
    source: &S,
    requests: &[AvailabilityRequest],
    settings: &Settings,
) -> Vec<AvailabilityReport>
where
    S: EventSource + ?Sized,
{
    run(topology, source, requests, settings, None).await
}

/// Like [`check`], also answering requests that start before `not_before`
/// (typically the start of today) with `InvalidTimeRange`.
pub async fn check_not_before<S>(
    topology: &Topology,
    source: &S,
    requests: &[AvailabilityRequest],
    settings: &Settings,
    not_before: DateTime<FixedOffset>,
) -> Vec<AvailabilityReport>
where
    S: EventSource + ?Sized,
{
    run(topology, source, requests, settings, Some(not_before)).await
}

async fn run<S>(
    topology: &Topology,
    source: &S,
    requests: &[AvailabilityRequest],
    settings: &Settings,
    not_before: Option<DateTime<FixedOffset>>,
) -> Vec<AvailabilityReport>
where
    S: EventSource + ?Sized,
{
    let parsed: Vec<Result<(RoomName, TimeWindow), AvailabilityResult>> = requests
        .iter()
        .map(|request| {
            TimeWindow::parse(&request.start, &request.end)
                .and_then(|window| match not_before {
                    Some(earliest) => window.not_before(earliest),
                    None => Ok(window),
                })
                .map(|window| (RoomName::new(&request.room), window))
                .map_err(AvailabilityResult::Error)
        })
        .collect();

    let valid: Vec<&(RoomName, TimeWindow)> = parsed.iter().filter_map(|p| p.as_ref().ok()).collect();

    let snapshot = match fetch_window(valid.iter().map(|(_, window)| window), settings.buffer()) {
        Some(window) => {
            let calendars = implicated_calendars(topology, valid.iter().map(|(room, _)| room));
            debug!(calendars = calendars.len(), "fetching implicated calendars");
            fetch_snapshot(source, calendars, window, &settings.fetch_options()).await
        }
        None => Default::default(),
    };

    let resolver = Resolver::new(topology, &snapshot, settings);
    let reports: Vec<AvailabilityReport> = requests
        .iter()
        .zip(&parsed)
        .map(|(request, parsed)| {
            let result = match parsed {
                Ok((room, window)) => resolver.resolve(room, window),
                Err(invalid) => invalid.clone(),
            };
            AvailabilityReport::new(request, &result)
        })
        .collect();

    info!(
        requests = requests.len(),
        errors = reports.iter().filter(|r| r.is_error()).count(),
        "availability check finished"
    );
    reports
}
