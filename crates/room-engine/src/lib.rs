//! # room-engine
//!
//! Meeting-room availability resolution for sites where rooms combine into
//! larger areas, split into sub-rooms, or stand in for each other.
//!
//! A check runs in two phases. The fetch phase reads every calendar a request
//! could possibly touch, once, into a [`Snapshot`]. The resolution phase is
//! synchronous and in-memory: it expands the requested room through the
//! [`Topology`], tests each booking against the window with a setup/teardown
//! buffer, and when the room is taken, walks shared pools and interchangeable
//! combos for a free stand-in.
//!
//! ## Quick start
//!
//! ```rust
//! use room_engine::{Resolver, RoomName, Settings, SiteConfig, Snapshot, TimeWindow, Topology};
//!
//! let topology = Topology::from_config(&SiteConfig::default_site().unwrap()).unwrap();
//! let snapshot = Snapshot::new();
//! let window = TimeWindow::parse("2025-06-28T15:00+08:00", "2025-06-28T16:00+08:00").unwrap();
//!
//! let resolver = Resolver::new(&topology, &snapshot, &Settings::default());
//! assert!(resolver.resolve(&RoomName::new("DI_Dream Room"), &window).is_available());
//! ```
//!
//! ## Modules
//!
//! - [`topology`]: room tables, one-hop expansion, fallback candidates
//! - [`conflict`]: buffered overlap detection
//! - [`resolver`]: recursive resolution with loop guard and memo
//! - [`fetch`]: `EventSource` trait and the bounded, retrying fan-out
//! - [`check`]: fetch once, resolve many
//! - [`report`]: serializable requests and reports
//! - [`config`]: site tables and tunables
//! - [`snapshot`]: events and the per-request snapshot
//! - [`error`]: Error types

pub mod check;
pub mod config;
pub mod conflict;
pub mod error;
pub mod fetch;
pub mod report;
pub mod resolver;
pub mod snapshot;
pub mod topology;
pub mod types;

pub use check::{check, check_not_before};
pub use config::{FailurePolicy, Settings, SiteConfig};
pub use conflict::{find_conflicts, ConflictRecord};
pub use error::{FetchError, ResolveError, RoomError};
pub use fetch::{fetch_snapshot, EventSource, FetchOptions, StaticEventSource};
pub use report::{AvailabilityReport, AvailabilityRequest, Status};
pub use resolver::{AvailabilityResult, ResolutionStats, Resolver, Suggestion};
pub use snapshot::{Event, EventTime, Snapshot};
pub use topology::{SharedPool, Topology};
pub use types::{CalendarId, RoomName, TimeWindow};
