//! Tests for recursive availability resolution.

use chrono::{DateTime, FixedOffset, TimeZone};
use room_engine::{
    AvailabilityResult, CalendarId, Event, FailurePolicy, ResolveError, Resolver, RoomName,
    Settings, SiteConfig, Snapshot, TimeWindow, Topology,
};

// ── Helpers ─────────────────────────────────────────────────────────────────

fn at(hour: u32, min: u32) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(8 * 3600)
        .unwrap()
        .with_ymd_and_hms(2025, 6, 28, hour, min, 0)
        .unwrap()
}

/// 2025-06-28T15:00+08:00 – 16:00+08:00.
fn window() -> TimeWindow {
    TimeWindow::parse("2025-06-28T15:00+08:00", "2025-06-28T16:00+08:00").unwrap()
}

fn default_topology() -> Topology {
    Topology::from_config(&SiteConfig::default_site().unwrap()).unwrap()
}

fn topology(json: &str) -> Topology {
    Topology::from_config(&SiteConfig::from_json(json).unwrap()).unwrap()
}

fn calendar(topology: &Topology, room: &str) -> CalendarId {
    topology
        .calendar_for(&RoomName::new(room))
        .unwrap_or_else(|| panic!("{} is not mapped", room))
        .clone()
}

/// A snapshot with every mapped calendar present and a 15:30-15:45 booking on each `busy` room.
fn snapshot_with_bookings(topology: &Topology, busy: &[&str]) -> Snapshot {
    let mut snapshot = Snapshot::new();
    for room in topology.rooms() {
        snapshot.insert(topology.calendar_for(room).unwrap().clone(), Vec::new());
    }
    for room in busy {
        snapshot.insert(
            calendar(topology, room),
            vec![Event::new(format!("{} booking", room), at(15, 30), at(15, 45))],
        );
    }
    snapshot
}

fn resolve(topology: &Topology, snapshot: &Snapshot, room: &str) -> AvailabilityResult {
    Resolver::new(topology, snapshot, &Settings::default()).resolve(&RoomName::new(room), &window())
}

fn suggested(result: &AvailabilityResult) -> Option<&str> {
    result.suggestion().map(|s| s.room.as_str())
}

// ── Scenarios ───────────────────────────────────────────────────────────────

#[test]
fn free_room_is_available_with_no_conflicts() {
    let topology = default_topology();
    let snapshot = snapshot_with_bookings(&topology, &[]);

    let result = resolve(&topology, &snapshot, "DI_Dream Room");

    assert_eq!(result, AvailabilityResult::Available);
    assert!(result.conflicts().is_empty());
    assert!(result.suggestion().is_none());
}

#[test]
fn booked_room_reports_conflict_and_first_free_pool_member() {
    let topology = default_topology();
    let snapshot = snapshot_with_bookings(&topology, &["DI_Dream Room"]);

    let result = resolve(&topology, &snapshot, "DI_Dream Room");

    let conflicts = result.conflicts();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].room, "DI_Dream Room");
    assert_eq!(conflicts[0].title, "DI_Dream Room booking");
    assert_eq!(conflicts[0].note, "30-min buffer conflict");
    assert_eq!(suggested(&result), Some("DI_Impact Room"));
}

#[test]
fn combo_pair_both_booked_has_no_suggestion() {
    let topology = default_topology();
    let snapshot =
        snapshot_with_bookings(&topology, &["DI_Synergy Room A + B", "DI_Dream + Impact Room"]);

    let result = resolve(&topology, &snapshot, "DI_Synergy Room A + B");

    assert!(matches!(result, AvailabilityResult::Unavailable { suggestion: None, .. }));
    assert_eq!(result.conflicts().len(), 1);
}

#[test]
fn unmapped_room_is_an_unknown_room_error() {
    let topology = default_topology();
    let snapshot = snapshot_with_bookings(&topology, &[]);

    let result = resolve(&topology, &snapshot, "DI_Fake Room");

    assert_eq!(
        result,
        AvailabilityResult::Error(ResolveError::UnknownRoom("DI_Fake Room".to_string()))
    );
    assert_eq!(result.error().unwrap().to_string(), "Calendar not found: DI_Fake Room");
}

// ── Topology effects ────────────────────────────────────────────────────────

#[test]
fn booking_a_sub_room_blocks_its_aggregate() {
    let topology = default_topology();
    let snapshot = snapshot_with_bookings(&topology, &["DI_Synergy Room A"]);

    let result = resolve(&topology, &snapshot, "DI_Synergy Room A + B");

    assert_eq!(result.conflicts()[0].room, "DI_Synergy Room A");
    assert_eq!(suggested(&result), Some("DI_Dream + Impact Room"));
}

#[test]
fn booking_the_whole_area_blocks_every_room() {
    let topology = default_topology();
    let snapshot = snapshot_with_bookings(&topology, &["DI Whole Area (all rooms)"]);

    for room in topology.rooms() {
        let result = resolve(&topology, &snapshot, room.as_str());
        assert!(
            matches!(result, AvailabilityResult::Unavailable { suggestion: None, .. }),
            "{} should be booked with no stand-in, got {:?}",
            room,
            result
        );
    }
}

#[test]
fn booking_an_enclosing_aggregate_blocks_nested_aggregates() {
    let topology = default_topology();
    let snapshot =
        snapshot_with_bookings(&topology, &["DI_Synergy (A&B) + Dream + Impact Room"]);

    for room in ["DI_Dream + Impact Room", "DI_Synergy Room A + B", "DI_Dream Room"] {
        let result = resolve(&topology, &snapshot, room);
        assert_eq!(
            result.conflicts()[0].room,
            "DI_Synergy (A&B) + Dream + Impact Room",
            "{} should be blocked",
            room
        );
    }
    assert!(resolve(&topology, &snapshot, "DI_Open Area").is_available());
}

#[test]
fn sibling_booking_does_not_block() {
    let topology = default_topology();
    let snapshot = snapshot_with_bookings(&topology, &["DI_Impact Room"]);

    assert!(resolve(&topology, &snapshot, "DI_Dream Room").is_available());
}

#[test]
fn fallback_skips_busy_members_in_table_order() {
    let topology = default_topology();
    let snapshot = snapshot_with_bookings(&topology, &["DI_Dream Room", "DI_Impact Room"]);

    let result = resolve(&topology, &snapshot, "DI_Dream Room");

    assert_eq!(suggested(&result), Some("DI_Open Area"));
}

#[test]
fn requested_name_is_matched_loosely_but_reported_canonically() {
    let topology = default_topology();
    let snapshot = snapshot_with_bookings(&topology, &["DI_Dream Room"]);

    let result = resolve(&topology, &snapshot, "  di_dream room ");

    assert_eq!(result.conflicts()[0].room, "DI_Dream Room");
}

#[test]
fn unmapped_member_inside_expansion_is_unknown_room() {
    let topology = topology(
        r#"{
            "calendars": {"c-big": "Big"},
            "groups": {"Big": ["Ghost"]}
        }"#,
    );
    let snapshot = Snapshot::new();

    let result = resolve(&topology, &snapshot, "Big");

    assert_eq!(
        result,
        AvailabilityResult::Error(ResolveError::UnknownRoom("Ghost".to_string()))
    );
}

// ── Termination and memoization ─────────────────────────────────────────────

#[test]
fn symmetric_combo_terminates_without_suggestion() {
    let topology = topology(
        r#"{
            "calendars": {"c-a": "A", "c-b": "B"},
            "combos": [["A", "B"]]
        }"#,
    );
    let snapshot = snapshot_with_bookings(&topology, &["A", "B"]);
    let resolver = Resolver::new(&topology, &snapshot, &Settings::default());

    let (result, stats) = resolver.resolve_with_stats(&RoomName::new("A"), &window());

    assert!(matches!(result, AvailabilityResult::Unavailable { suggestion: None, .. }));
    assert_eq!(stats.detections, 2);
    assert_eq!(stats.loops, 1);
}

#[test]
fn room_reached_by_two_paths_is_detected_once() {
    // A → B → C and A → C both reach C.
    let topology = topology(
        r#"{
            "calendars": {"c-a": "A", "c-b": "B", "c-c": "C"},
            "shared_pools": [{"name": "pool", "rooms": ["A", "B", "C"]}]
        }"#,
    );
    let snapshot = snapshot_with_bookings(&topology, &["A", "B", "C"]);
    let resolver = Resolver::new(&topology, &snapshot, &Settings::default());

    let (result, stats) = resolver.resolve_with_stats(&RoomName::new("A"), &window());

    assert!(matches!(result, AvailabilityResult::Unavailable { suggestion: None, .. }));
    assert_eq!(stats.detections, 3, "each room scanned exactly once");
    assert_eq!(stats.memo_hits, 1, "A's probe of C is served from the memo");
}

#[test]
fn memoized_stand_in_found_deeper_is_still_suggested() {
    // Dream and Impact busy: Impact's own fallback search settles Open Area
    // first, and Dream then reuses that memoized answer.
    let topology = default_topology();
    let snapshot = snapshot_with_bookings(&topology, &["DI_Dream Room", "DI_Impact Room"]);
    let resolver = Resolver::new(&topology, &snapshot, &Settings::default());

    let (result, stats) = resolver.resolve_with_stats(&RoomName::new("DI_Dream Room"), &window());

    assert_eq!(suggested(&result), Some("DI_Open Area"));
    assert_eq!(stats.detections, 3);
    assert_eq!(stats.memo_hits, 1);
}

#[test]
fn each_top_level_call_starts_fresh() {
    let topology = default_topology();
    let snapshot = snapshot_with_bookings(&topology, &["DI_Dream Room"]);
    let resolver = Resolver::new(&topology, &snapshot, &Settings::default());
    let room = RoomName::new("DI_Dream Room");

    let first = resolver.resolve_with_stats(&room, &window());
    let second = resolver.resolve_with_stats(&room, &window());

    assert_eq!(first, second);
    assert_eq!(second.1.memo_hits, 0);
    assert_eq!(second.1.loops, 0);
}

// ── Fetch failures ──────────────────────────────────────────────────────────

#[test]
fn failed_calendar_of_requested_room_is_reported() {
    let topology = default_topology();
    let mut snapshot = snapshot_with_bookings(&topology, &[]);
    snapshot.record_failure(calendar(&topology, "DI_Dream + Impact Room"), "503 backend error");

    let result = resolve(&topology, &snapshot, "DI_Dream Room");

    assert_eq!(
        result,
        AvailabilityResult::Error(ResolveError::UpstreamFetchFailure {
            room: "DI_Dream + Impact Room".to_string(),
            reason: "503 backend error".to_string(),
        })
    );
}

#[test]
fn failed_calendar_of_fallback_candidate_is_skipped() {
    let topology = default_topology();
    let mut snapshot = snapshot_with_bookings(&topology, &["DI_Dream Room"]);
    snapshot.record_failure(calendar(&topology, "DI_Impact Room"), "timeout");

    let result = resolve(&topology, &snapshot, "DI_Dream Room");

    assert_eq!(result.conflicts().len(), 1);
    assert_eq!(suggested(&result), Some("DI_Open Area"));
}

#[test]
fn ignore_policy_reads_failed_calendar_as_free() {
    let topology = default_topology();
    let mut snapshot = snapshot_with_bookings(&topology, &[]);
    snapshot.record_failure(calendar(&topology, "DI_Dream Room"), "timeout");
    let settings = Settings {
        on_fetch_failure: FailurePolicy::Ignore,
        ..Settings::default()
    };

    let result =
        Resolver::new(&topology, &snapshot, &settings).resolve(&RoomName::new("DI_Dream Room"), &window());

    assert!(result.is_available());
}

#[test]
fn wider_buffer_catches_more() {
    let topology = default_topology();
    let mut snapshot = snapshot_with_bookings(&topology, &[]);
    snapshot.insert(
        calendar(&topology, "DI_Pantry"),
        vec![Event::new("Lunch", at(16, 45), at(17, 30))],
    );
    let room = RoomName::new("DI_Pantry");

    let default = Resolver::new(&topology, &snapshot, &Settings::default()).resolve(&room, &window());
    let wide = Settings {
        buffer_minutes: 60,
        ..Settings::default()
    };
    let widened = Resolver::new(&topology, &snapshot, &wide).resolve(&room, &window());

    assert!(default.is_available());
    assert_eq!(widened.conflicts()[0].note, "60-min buffer conflict");
}
