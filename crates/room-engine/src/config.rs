//! Site configuration: the room tables and the tunables, loaded once at startup.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration as StdDuration;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::conflict::DEFAULT_BUFFER_MINUTES;
use crate::error::{Result, RoomError};
use crate::fetch::FetchOptions;

const DEFAULT_SITE: &str = include_str!("../data/dream_impact.json");

/// Largest accepted setup/teardown buffer: one day.
pub const MAX_BUFFER_MINUTES: i64 = 24 * 60;

/// What the resolver does with a calendar whose fetch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// The requested room resolves to `UpstreamFetchFailure`; a fallback
    /// candidate is skipped.
    #[default]
    Report,
    /// The calendar is read as having no bookings.
    Ignore,
}

/// Runtime tunables. Every field is optional in the JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub buffer_minutes: i64,
    pub fetch_concurrency: usize,
    pub fetch_attempts: usize,
    pub retry_delay_ms: u64,
    pub on_fetch_failure: FailurePolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            buffer_minutes: DEFAULT_BUFFER_MINUTES,
            fetch_concurrency: 8,
            fetch_attempts: 2,
            retry_delay_ms: 500,
            on_fetch_failure: FailurePolicy::Report,
        }
    }
}

impl Settings {
    /// Reject tunables that would break the conflict predicate.
    ///
    /// # Errors
    /// Returns `RoomError::Config` when `buffer_minutes` is negative or above
    /// [`MAX_BUFFER_MINUTES`].
    pub fn validate(&self) -> Result<()> {
        if !(0..=MAX_BUFFER_MINUTES).contains(&self.buffer_minutes) {
            return Err(RoomError::Config(format!(
                "buffer_minutes must be between 0 and {}, got {}",
                MAX_BUFFER_MINUTES, self.buffer_minutes
            )));
        }
        Ok(())
    }

    /// The buffer as a duration, clamped to `0..=MAX_BUFFER_MINUTES` for
    /// settings built without [`Settings::validate`].
    pub fn buffer(&self) -> Duration {
        Duration::try_minutes(self.buffer_minutes.clamp(0, MAX_BUFFER_MINUTES))
            .unwrap_or_else(Duration::zero)
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            concurrency: self.fetch_concurrency.max(1),
            attempts: self.fetch_attempts.max(1),
            retry_delay: StdDuration::from_millis(self.retry_delay_ms),
        }
    }
}

/// A named set of interchangeable rooms, probed in listed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedPoolConfig {
    pub name: String,
    pub rooms: Vec<String>,
}

/// The raw, hand-authored site tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Calendar id → room name.
    pub calendars: BTreeMap<String, String>,
    /// Aggregate room → the sub-rooms it occupies.
    #[serde(default)]
    pub groups: BTreeMap<String, Vec<String>>,
    /// Room → the aggregates whose booking occupies it.
    #[serde(default)]
    pub parents: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub shared_pools: Vec<SharedPoolConfig>,
    /// Unordered interchangeable pairs.
    #[serde(default)]
    pub combos: Vec<[String; 2]>,
    #[serde(default)]
    pub settings: Settings,
}

impl SiteConfig {
    /// Read a site file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: SiteConfig = serde_json::from_str(raw)?;
        if config.calendars.is_empty() {
            return Err(RoomError::Config("no calendars configured".to_string()));
        }
        config.settings.validate()?;
        Ok(config)
    }

    /// The built-in Dream Impact site.
    pub fn default_site() -> Result<Self> {
        Self::from_json(DEFAULT_SITE)
    }
}
