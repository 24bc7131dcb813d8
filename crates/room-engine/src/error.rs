//! Error types for room-engine operations.

use thiserror::Error;

/// Errors raised while loading configuration or reading input files.
#[derive(Error, Debug)]
pub enum RoomError {
    /// The site configuration is structurally invalid (e.g., a calendar mapped twice).
    #[error("Invalid site configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reasons a single availability resolution can fail.
///
/// These are values, not panics: they are memoized, swallowed while probing
/// fallback candidates, and surfaced to the caller only for the requested room.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Start or end could not be parsed, lacked an offset, or `start >= end`.
    #[error("Invalid time range: {0}")]
    InvalidTimeRange(String),

    /// A room reached during expansion has no calendar mapping.
    #[error("Calendar not found: {0}")]
    UnknownRoom(String),

    /// The room was already visited within the current resolution chain.
    #[error("Suggestion loop detected for {0}")]
    LoopDetected(String),

    /// A calendar needed for this room could not be read.
    #[error("API error for {room}: {reason}")]
    UpstreamFetchFailure { room: String, reason: String },
}

/// Failure of a single calendar read in the fetch phase.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Worth retrying (timeouts, rate limits, 5xx).
    #[error("transient fetch failure: {0}")]
    Transient(String),

    #[error("fetch failure: {0}")]
    Permanent(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

/// Convenience alias used for configuration and IO paths.
pub type Result<T> = std::result::Result<T, RoomError>;
