//! `roomcheck` CLI: check meeting-room availability against an event snapshot.
//!
//! ## Usage
//!
//! ```sh
//! # One request against a file of calendar events
//! roomcheck check --room "DI_Dream Room" \
//!     --start 2025-06-28T15:00:00+08:00 --end 2025-06-28T16:00:00+08:00 \
//!     --events events.json
//!
//! # A JSON array of {room,start,end} requests (stdin → stdout)
//! cat requests.json | roomcheck batch --events events.json --tz Asia/Hong_Kong
//!
//! # Inspect the room tables
//! roomcheck expand "DI_Synergy Room A + B"
//! roomcheck rooms
//!
//! # Use a custom site instead of the built-in one
//! roomcheck --topology site.json rooms
//!
//! # Refuse requests that start before local midnight
//! roomcheck batch -i requests.json --events events.json --not-before today
//! ```
//!
//! Exits 1 when any report is an error.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, FixedOffset, Local, TimeZone};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use room_engine::types::parse_instant;
use room_engine::{
    check, check_not_before, AvailabilityReport, AvailabilityRequest, RoomName, Settings,
    SiteConfig, StaticEventSource, Topology,
};
use serde::Serialize;
use serde_json::json;
use std::io::{self, Read};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "roomcheck",
    version,
    about = "Meeting-room availability checks over combinable and interchangeable rooms"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Site tables (JSON). Uses the built-in site when omitted.
    #[arg(long, global = true, env = "ROOMCHECK_TOPOLOGY")]
    topology: Option<String>,

    /// Log resolver steps to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Setup/teardown buffer around each booking, in minutes
    #[arg(long, global = true)]
    buffer_minutes: Option<i64>,

    /// Maximum calendars fetched at once
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Fetch attempts per calendar, including the first
    #[arg(long, global = true)]
    attempts: Option<usize>,

    /// Delay between fetch attempts, in milliseconds
    #[arg(long, global = true)]
    retry_delay_ms: Option<u64>,

    /// Reject requests starting before this instant (RFC 3339, or `today`
    /// for local midnight)
    #[arg(long, global = true)]
    not_before: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check one room for one window
    Check {
        #[arg(long)]
        room: String,
        /// Window start (RFC 3339, offset required)
        #[arg(long)]
        start: String,
        /// Window end (RFC 3339, offset required)
        #[arg(long)]
        end: String,
        /// Calendar events keyed by calendar id
        #[arg(long)]
        events: String,
        /// Render conflict times in this IANA time zone
        #[arg(long)]
        tz: Option<String>,
    },
    /// Check a JSON array of {room,start,end} requests
    Batch {
        /// Input file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
        /// Calendar events keyed by calendar id
        #[arg(long)]
        events: String,
        /// Render conflict times in this IANA time zone
        #[arg(long)]
        tz: Option<String>,
    },
    /// Show the calendars a room depends on and its stand-in candidates
    Expand { room: String },
    /// List configured rooms and their calendars
    Rooms,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let site = load_site(cli.topology.as_deref())?;
    let settings = apply_overrides(site.settings.clone(), &cli)?;
    let cutoff = parse_cutoff(cli.not_before.as_deref())?;
    let topology = Topology::from_config(&site).context("Invalid site tables")?;

    match cli.command {
        Commands::Check {
            room,
            start,
            end,
            events,
            tz,
        } => {
            let tz = parse_tz(tz.as_deref())?;
            let source = load_events(&events)?;
            let request = AvailabilityRequest::new(room, start, end);
            let reports = run(&topology, &source, &[request], &settings, cutoff, tz).await;
            let report = reports
                .first()
                .ok_or_else(|| anyhow!("No report produced"))?;
            emit_json(None, report)?;
            exit_on_error(&reports);
        }
        Commands::Batch {
            input,
            output,
            events,
            tz,
        } => {
            let tz = parse_tz(tz.as_deref())?;
            let source = load_events(&events)?;
            let requests = read_requests(input.as_deref())?;
            let reports = run(&topology, &source, &requests, &settings, cutoff, tz).await;
            emit_json(output.as_deref(), &reports)?;
            exit_on_error(&reports);
        }
        Commands::Expand { room } => {
            let room = topology
                .canonical(&room)
                .ok_or_else(|| anyhow!("Calendar not found: {}", room.trim()))?;
            let expansion: Vec<_> = topology
                .expand(room)
                .iter()
                .map(|member| room_entry(&topology, member))
                .collect();
            let candidates: Vec<String> = topology
                .fallback_candidates(room)
                .iter()
                .map(|candidate| {
                    topology
                        .canonical(candidate.as_str())
                        .unwrap_or(candidate)
                        .to_string()
                })
                .collect();
            let value = json!({
                "room": room.as_str(),
                "expansion": expansion,
                "fallback_candidates": candidates,
            });
            emit_json(None, &value)?;
        }
        Commands::Rooms => {
            let rooms: Vec<_> = topology
                .rooms()
                .iter()
                .map(|room| room_entry(&topology, room))
                .collect();
            emit_json(None, &rooms)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_site(path: Option<&str>) -> Result<SiteConfig> {
    match path {
        Some(path) => {
            SiteConfig::load(path).with_context(|| format!("Failed to load site tables: {}", path))
        }
        None => SiteConfig::default_site().context("Built-in site tables are invalid"),
    }
}

/// Command-line flags win over the site file's settings. The merged settings
/// are validated again.
fn apply_overrides(mut settings: Settings, cli: &Cli) -> Result<Settings> {
    if let Some(minutes) = cli.buffer_minutes {
        settings.buffer_minutes = minutes;
    }
    if let Some(concurrency) = cli.concurrency {
        settings.fetch_concurrency = concurrency;
    }
    if let Some(attempts) = cli.attempts {
        settings.fetch_attempts = attempts;
    }
    if let Some(delay) = cli.retry_delay_ms {
        settings.retry_delay_ms = delay;
    }
    settings.validate().context("Invalid settings override")?;
    Ok(settings)
}

fn parse_cutoff(raw: Option<&str>) -> Result<Option<DateTime<FixedOffset>>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    if raw.trim().eq_ignore_ascii_case("today") {
        let midnight = Local::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .and_then(|naive| Local.from_local_datetime(&naive).earliest())
            .ok_or_else(|| anyhow!("Local midnight does not exist today"))?;
        return Ok(Some(midnight.fixed_offset()));
    }
    let instant = parse_instant(raw).context("Invalid --not-before")?;
    Ok(Some(instant))
}

fn parse_tz(raw: Option<&str>) -> Result<Option<Tz>> {
    raw.map(|name| {
        name.parse::<Tz>()
            .map_err(|_| anyhow!("Unknown time zone: '{}'", name))
    })
    .transpose()
}

fn load_events(path: &str) -> Result<StaticEventSource> {
    StaticEventSource::load(path).with_context(|| format!("Failed to load events: {}", path))
}

async fn run(
    topology: &Topology,
    source: &StaticEventSource,
    requests: &[AvailabilityRequest],
    settings: &Settings,
    cutoff: Option<DateTime<FixedOffset>>,
    tz: Option<Tz>,
) -> Vec<AvailabilityReport> {
    let reports = match cutoff {
        Some(cutoff) => check_not_before(topology, source, requests, settings, cutoff).await,
        None => check(topology, source, requests, settings).await,
    };
    match tz {
        Some(tz) => reports
            .into_iter()
            .map(|report| report.in_timezone(tz))
            .collect(),
        None => reports,
    }
}

fn room_entry(topology: &Topology, room: &RoomName) -> serde_json::Value {
    json!({
        "room": room.as_str(),
        "calendar": topology.calendar_for(room).map(|calendar| calendar.as_str()),
    })
}

fn exit_on_error(reports: &[AvailabilityReport]) {
    if reports.iter().any(|report| report.is_error()) {
        process::exit(1);
    }
}

/// Requests from a file, or stdin when no path is given.
fn read_requests(path: Option<&str>) -> Result<Vec<AvailabilityRequest>> {
    let raw = match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))?
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            buf
        }
    };
    serde_json::from_str(&raw).context("Failed to parse requests")
}

/// Pretty JSON to a file, or stdout when no path is given.
fn emit_json<T: Serialize + ?Sized>(path: Option<&str>, value: &T) -> Result<()> {
    let pretty = serde_json::to_string_pretty(value).context("Failed to render JSON")?;
    match path {
        Some(path) => std::fs::write(path, pretty)
            .with_context(|| format!("Failed to write file: {}", path)),
        None => {
            println!("{}", pretty);
            Ok(())
        }
    }
}
