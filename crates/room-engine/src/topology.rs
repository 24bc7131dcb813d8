//! Room topology: which calendars must be read to judge a room, and which
//! rooms may stand in for it.
//!
//! Built once from a [`SiteConfig`] and never mutated afterwards. Expansion is
//! one hop only: the hand-authored tables are expected to already encode the
//! closure they intend.
//!
//! The built-in site (`data/dream_impact.json`) is written that way. Its
//! aggregates list their sub-aggregates as members and carry their own
//! parents, so booking `DI_Synergy (A&B) + Dream + Impact Room` also blocks
//! `DI_Dream + Impact Room` and `DI_Synergy Room A + B`. Sites that want the
//! narrower behaviour supply their own tables via [`SiteConfig::load`].

use std::collections::{HashMap, HashSet, VecDeque};

use crate::config::SiteConfig;
use crate::error::{Result, RoomError};
use crate::types::{CalendarId, RoomName};

/// A named set of mutually substitutable rooms, in probe order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedPool {
    pub name: String,
    pub rooms: Vec<RoomName>,
}

impl SharedPool {
    pub fn contains(&self, room: &RoomName) -> bool {
        self.rooms.contains(room)
    }
}

/// Immutable room-relationship tables.
#[derive(Debug, Clone)]
pub struct Topology {
    calendars: HashMap<RoomName, CalendarId>,
    rooms_by_calendar: HashMap<CalendarId, RoomName>,
    room_order: Vec<RoomName>,
    groups: HashMap<RoomName, Vec<RoomName>>,
    parents: HashMap<RoomName, Vec<RoomName>>,
    pools: Vec<SharedPool>,
    combos: HashMap<RoomName, RoomName>,
}

impl Topology {
    /// Validate the raw tables and build the topology.
    ///
    /// # Errors
    /// Returns `RoomError::Config` when the calendar table is not a bijection,
    /// a combo pairs a room with itself, or a room is given two different
    /// combo partners. Rooms named in groups, parents or pools without a
    /// calendar are accepted here and reported as `UnknownRoom` when reached.
    pub fn from_config(config: &SiteConfig) -> Result<Self> {
        let mut calendars = HashMap::new();
        let mut rooms_by_calendar = HashMap::new();
        let mut room_order = Vec::new();

        for (calendar, name) in &config.calendars {
            let room = RoomName::new(name);
            let calendar = CalendarId::new(calendar.trim());
            if room.as_str().is_empty() {
                return Err(RoomError::Config(format!(
                    "calendar {} has an empty room name",
                    calendar
                )));
            }
            if let Some(existing) = calendars.insert(room.clone(), calendar.clone()) {
                return Err(RoomError::Config(format!(
                    "room '{}' is mapped to both {} and {}",
                    room, existing, calendar
                )));
            }
            if rooms_by_calendar.insert(calendar.clone(), room.clone()).is_some() {
                return Err(RoomError::Config(format!(
                    "calendar {} is mapped more than once",
                    calendar
                )));
            }
            room_order.push(room);
        }
        room_order.sort_by(|a, b| a.as_str().cmp(b.as_str()));

        let groups = relation_table(&config.groups);
        let parents = relation_table(&config.parents);

        let pools = config
            .shared_pools
            .iter()
            .map(|pool| SharedPool {
                name: pool.name.clone(),
                rooms: dedup(pool.rooms.iter().map(|r| RoomName::new(r))),
            })
            .collect();

        let mut combos = HashMap::new();
        for [a, b] in &config.combos {
            let (a, b) = (RoomName::new(a), RoomName::new(b));
            if a == b {
                return Err(RoomError::Config(format!(
                    "room '{}' cannot be its own combo partner",
                    a
                )));
            }
            register_combo(&mut combos, &a, &b)?;
            register_combo(&mut combos, &b, &a)?;
        }

        Ok(Self {
            calendars,
            rooms_by_calendar,
            room_order,
            groups,
            parents,
            pools,
            combos,
        })
    }

    /// Every room whose calendar decides whether `room` is free: the room
    /// itself, then the sub-rooms it aggregates, then the aggregates that
    /// contain it. Deduplicated, first occurrence wins.
    pub fn expand(&self, room: &RoomName) -> Vec<RoomName> {
        let members = self.groups.get(room).into_iter().flatten();
        let parents = self.parents.get(room).into_iter().flatten();
        dedup(std::iter::once(room).chain(members).chain(parents).cloned())
    }

    pub fn calendar_for(&self, room: &RoomName) -> Option<&CalendarId> {
        self.calendars.get(room)
    }

    pub fn room_for(&self, calendar: &CalendarId) -> Option<&RoomName> {
        self.rooms_by_calendar.get(calendar)
    }

    /// The configured spelling of a user-supplied room name, if it is mapped.
    pub fn canonical(&self, name: &str) -> Option<&RoomName> {
        let probe = RoomName::new(name);
        self.calendars.get_key_value(&probe).map(|(room, _)| room)
    }

    /// Mapped rooms, sorted by name.
    pub fn rooms(&self) -> &[RoomName] {
        &self.room_order
    }

    pub fn pools(&self) -> &[SharedPool] {
        &self.pools
    }

    /// Shared pools containing `room`, in table order.
    pub fn pools_containing<'a>(
        &'a self,
        room: &'a RoomName,
    ) -> impl Iterator<Item = &'a SharedPool> + 'a {
        self.pools.iter().filter(move |pool| pool.contains(room))
    }

    pub fn combo_partner(&self, room: &RoomName) -> Option<&RoomName> {
        self.combos.get(room)
    }

    /// Stand-in candidates for `room` in probe order: the other members of
    /// every pool containing it, then its combo partner.
    pub fn fallback_candidates(&self, room: &RoomName) -> Vec<RoomName> {
        let pooled = self
            .pools_containing(room)
            .flat_map(|pool| pool.rooms.iter())
            .filter(|candidate| *candidate != room);
        let combo = self.combo_partner(room);
        dedup(pooled.chain(combo).cloned())
    }

    /// Every room a full resolution of `room` may read: the closure of `room`
    /// under fallback reachability, each member expanded.
    pub fn implicated_rooms(&self, room: &RoomName) -> Vec<RoomName> {
        let mut seen: HashSet<RoomName> = HashSet::new();
        let mut queue = VecDeque::from([room.clone()]);
        let mut reachable = Vec::new();

        while let Some(next) = queue.pop_front() {
            if !seen.insert(next.clone()) {
                continue;
            }
            queue.extend(self.fallback_candidates(&next));
            reachable.push(next);
        }

        dedup(reachable.iter().flat_map(|r| self.expand(r)))
    }
}

fn relation_table(
    raw: &std::collections::BTreeMap<String, Vec<String>>,
) -> HashMap<RoomName, Vec<RoomName>> {
    raw.iter()
        .map(|(room, related)| {
            (
                RoomName::new(room),
                dedup(related.iter().map(|r| RoomName::new(r))),
            )
        })
        .collect()
}

fn register_combo(
    combos: &mut HashMap<RoomName, RoomName>,
    room: &RoomName,
    partner: &RoomName,
) -> Result<()> {
    match combos.get(room) {
        Some(existing) if existing != partner => Err(RoomError::Config(format!(
            "room '{}' has two combo partners: '{}' and '{}'",
            room, existing, partner
        ))),
        _ => {
            combos.insert(room.clone(), partner.clone());
            Ok(())
        }
    }
}

/// Order-preserving deduplication.
fn dedup(rooms: impl IntoIterator<Item = RoomName>) -> Vec<RoomName> {
    let mut seen = HashSet::new();
    rooms
        .into_iter()
        .filter(|room| seen.insert(room.clone()))
        .collect()
}
