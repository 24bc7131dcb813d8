//! Recursive availability resolution with fallback suggestions.
//!
//! A room is free when no calendar in its expansion has a buffered conflict.
//! When it is not, the resolver probes stand-in rooms (shared-pool members in
//! table order, then the combo partner) and suggests the first free one.
//!
//! Every top-level call gets its own visited set and memo. The visited set
//! bounds recursion by the finite room set, so symmetric combos and pools
//! terminate; the memo keeps rooms reached along several fallback paths from
//! being evaluated twice. Resolution only ever reads the [`Snapshot`].

use std::collections::{HashMap, HashSet};

use chrono::Duration;
use serde::Serialize;
use tracing::debug;

use crate::config::{FailurePolicy, Settings};
use crate::conflict::{find_conflicts, ConflictRecord};
use crate::error::ResolveError;
use crate::snapshot::Snapshot;
use crate::topology::Topology;
use crate::types::{RoomName, TimeWindow};

/// A stand-in room that is free for the requested window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    #[serde(rename = "suggested_room")]
    pub room: RoomName,
}

/// Outcome of resolving one room for one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvailabilityResult {
    Available,
    /// Booked. `conflicts` is never empty.
    Unavailable {
        conflicts: Vec<ConflictRecord>,
        suggestion: Option<Suggestion>,
    },
    Error(ResolveError),
}

impl AvailabilityResult {
    pub fn is_available(&self) -> bool {
        matches!(self, AvailabilityResult::Available)
    }

    pub fn conflicts(&self) -> &[ConflictRecord] {
        match self {
            AvailabilityResult::Unavailable { conflicts, .. } => conflicts,
            _ => &[],
        }
    }

    pub fn suggestion(&self) -> Option<&Suggestion> {
        match self {
            AvailabilityResult::Unavailable { suggestion, .. } => suggestion.as_ref(),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ResolveError> {
        match self {
            AvailabilityResult::Error(err) => Some(err),
            _ => None,
        }
    }
}

/// Work done by one top-level resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionStats {
    /// Rooms whose calendars were scanned for conflicts.
    pub detections: usize,
    pub memo_hits: usize,
    /// Probes cut short by the visited guard.
    pub loops: usize,
}

/// Read-only resolution inputs, shareable across requests.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    topology: &'a Topology,
    snapshot: &'a Snapshot,
    buffer: Duration,
    policy: FailurePolicy,
}

impl<'a> Resolver<'a> {
    pub fn new(topology: &'a Topology, snapshot: &'a Snapshot, settings: &Settings) -> Self {
        Self {
            topology,
            snapshot,
            buffer: settings.buffer(),
            policy: settings.on_fetch_failure,
        }
    }

    /// Resolve `room` for `window` with fresh visited/memo state.
    pub fn resolve(&self, room: &RoomName, window: &TimeWindow) -> AvailabilityResult {
        self.resolve_with_stats(room, window).0
    }

    /// Like [`Resolver::resolve`], also returning what the resolution cost.
    pub fn resolve_with_stats(
        &self,
        room: &RoomName,
        window: &TimeWindow,
    ) -> (AvailabilityResult, ResolutionStats) {
        let mut run = Resolution::new(self);
        let result = run.probe(room, window);
        debug!(
            room = %room,
            available = result.is_available(),
            detections = run.stats.detections,
            memo_hits = run.stats.memo_hits,
            loops = run.stats.loops,
            "resolution finished"
        );
        (result, run.stats)
    }
}

type MemoKey = (RoomName, TimeWindow);

/// State owned by exactly one top-level resolution.
struct Resolution<'r, 'a> {
    resolver: &'r Resolver<'a>,
    visited: HashSet<RoomName>,
    memo: HashMap<MemoKey, AvailabilityResult>,
    stats: ResolutionStats,
}

impl<'r, 'a> Resolution<'r, 'a> {
    fn new(resolver: &'r Resolver<'a>) -> Self {
        Self {
            resolver,
            visited: HashSet::new(),
            memo: HashMap::new(),
            stats: ResolutionStats::default(),
        }
    }

    fn probe(&mut self, room: &RoomName, window: &TimeWindow) -> AvailabilityResult {
        let key = (room.clone(), *window);

        // Only finished results are memoized, so a room still on the active
        // chain always falls through to the visited guard.
        if let Some(cached) = self.memo.get(&key) {
            self.stats.memo_hits += 1;
            debug!(room = %room, "memo hit");
            return cached.clone();
        }

        if !self.visited.insert(room.clone()) {
            self.stats.loops += 1;
            debug!(room = %room, "room already visited in this resolution");
            return AvailabilityResult::Error(ResolveError::LoopDetected(room.to_string()));
        }

        let result = match self.detect(room, window) {
            Err(err) => AvailabilityResult::Error(err),
            Ok(conflicts) if conflicts.is_empty() => AvailabilityResult::Available,
            Ok(conflicts) => {
                let suggestion = self.suggest(room, window);
                AvailabilityResult::Unavailable {
                    conflicts,
                    suggestion,
                }
            }
        };

        self.memo.insert(key, result.clone());
        result
    }

    fn detect(
        &mut self,
        room: &RoomName,
        window: &TimeWindow,
    ) -> Result<Vec<ConflictRecord>, ResolveError> {
        let Resolver {
            topology,
            snapshot,
            buffer,
            policy,
        } = *self.resolver;

        let expanded = topology.expand(room);
        let mapped = expanded
            .iter()
            .map(|r| {
                topology
                    .calendar_for(r)
                    .map(|calendar| (r, calendar))
                    .ok_or_else(|| ResolveError::UnknownRoom(r.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.stats.detections += 1;

        let mut conflicts = Vec::new();
        for (r, calendar) in mapped {
            if let Some(reason) = snapshot.failure(calendar) {
                if policy == FailurePolicy::Report {
                    return Err(ResolveError::UpstreamFetchFailure {
                        room: r.to_string(),
                        reason: reason.to_string(),
                    });
                }
            } else if !snapshot.contains(calendar) {
                debug!(room = %r, calendar = %calendar, "calendar not in snapshot; reading it as empty");
            }
            let name = topology.room_for(calendar).unwrap_or(r);
            conflicts.extend(find_conflicts(
                name.as_str(),
                snapshot.events(calendar),
                window,
                buffer,
            ));
        }

        debug!(room = %room, conflicts = conflicts.len(), "conflicts detected");
        Ok(conflicts)
    }

    /// First free stand-in for `room`. Failed probes are skipped.
    fn suggest(&mut self, room: &RoomName, window: &TimeWindow) -> Option<Suggestion> {
        let topology = self.resolver.topology;
        for candidate in topology.fallback_candidates(room) {
            match self.probe(&candidate, window) {
                AvailabilityResult::Available => {
                    debug!(room = %room, suggestion = %candidate, "fallback found");
                    let room = topology
                        .canonical(candidate.as_str())
                        .cloned()
                        .unwrap_or(candidate);
                    return Some(Suggestion { room });
                }
                AvailabilityResult::Error(err) => {
                    debug!(room = %room, candidate = %candidate, error = %err, "fallback probe failed");
                }
                AvailabilityResult::Unavailable { .. } => {}
            }
        }
        None
    }
}
