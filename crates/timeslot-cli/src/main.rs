//! `timeslot` CLI: resolve provider availability, read calendars, and check
//! candidate bookings from the command line.
//!
//! ## Usage
//!
//! ```sh
//! # Free intervals of a provider for one week
//! timeslot slots -c provider.toml --from 2025-01-06T00:00:00Z --to 2025-01-13T00:00:00Z
//!
//! # The first five bookable 30-minute slots
//! timeslot slots -c provider.toml --from ... --to ... --duration 30 --limit 5
//!
//! # Busy time of a calendar (stdin when -i is omitted)
//! timeslot busy -i calendar.ics --from ... --to ...
//!
//! # Weekly slots minus the calendar's busy time
//! timeslot free -i calendar.ics -c provider.toml --from ... --to ...
//!
//! # Free time as iCalendar
//! timeslot export -c provider.toml --from ... --to ... -o free.ics
//!
//! # Conflicts for a candidate booking
//! timeslot check -c provider.toml --start 2025-01-06T15:00:00Z --end 2025-01-06T16:00:00Z
//! ```
//!
//! Logging goes to stderr; `--verbose` or `RUST_LOG` raise the level.

mod config;

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use timeslot::ical::export_availability;
use timeslot::{Calendar, ConflictDetector, DetectorOptions, Interval, Provider, Query};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::{parse_instant, ProviderConfig};

#[derive(Parser)]
#[command(
    name = "timeslot",
    version,
    about = "Calendar availability from weekly schedules, exceptions and bookings"
)]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Free intervals of a provider, or bookable slots with --duration
    Slots {
        /// Provider TOML file
        #[arg(short, long)]
        config: PathBuf,
        /// Window start (RFC 3339)
        #[arg(long, value_parser = instant)]
        from: DateTime<Utc>,
        /// Window end (RFC 3339)
        #[arg(long, value_parser = instant)]
        to: DateTime<Utc>,
        /// Slot length in minutes
        #[arg(short, long)]
        duration: Option<i64>,
        /// Maximum number of slots (0 for no limit)
        #[arg(short, long, default_value_t = 0)]
        limit: usize,
    },
    /// Busy intervals of an iCalendar file
    Busy {
        /// Input .ics file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[arg(long, value_parser = instant)]
        from: DateTime<Utc>,
        #[arg(long, value_parser = instant)]
        to: DateTime<Utc>,
    },
    /// A provider's weekly slots minus a calendar's busy time
    Free {
        /// Input .ics file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Provider TOML file
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, value_parser = instant)]
        from: DateTime<Utc>,
        #[arg(long, value_parser = instant)]
        to: DateTime<Utc>,
    },
    /// Export a provider's free time as iCalendar
    Export {
        /// Provider TOML file
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, value_parser = instant)]
        from: DateTime<Utc>,
        #[arg(long, value_parser = instant)]
        to: DateTime<Utc>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Conflicts for a candidate booking (an empty list when bookable)
    Check {
        /// Provider TOML file
        #[arg(short, long)]
        config: PathBuf,
        /// Booking start (RFC 3339)
        #[arg(long, value_parser = instant)]
        start: DateTime<Utc>,
        /// Booking end (RFC 3339)
        #[arg(long, value_parser = instant)]
        end: DateTime<Utc>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Slots {
            config,
            from,
            to,
            duration,
            limit,
        } => {
            check_window(from, to)?;
            let provider = load_provider(&config)?;
            match duration {
                None => {
                    let mut free = provider.availability().slots(from, to).into_vec();
                    if limit > 0 {
                        free.truncate(limit);
                    }
                    print_json(&free)?;
                }
                Some(minutes) => {
                    let query = Query::builder()
                        .duration(Duration::minutes(minutes))
                        .between(from, to)
                        .limit(limit)
                        .in_timezone(provider.timezone())
                        .build();
                    let slots = provider
                        .find_slots(&query)
                        .context("Failed to search for slots")?;
                    print_json(&slots)?;
                }
            }
        }
        Commands::Busy { input, from, to } => {
            check_window(from, to)?;
            let calendar = load_calendar(input.as_deref())?;
            print_json(&calendar.busy_intervals(from, to))?;
        }
        Commands::Free {
            input,
            config,
            from,
            to,
        } => {
            check_window(from, to)?;
            let calendar = load_calendar(input.as_deref())?;
            let provider = load_provider(&config)?;
            let free = calendar.free_intervals(from, to, provider.availability().weekly());
            print_json(&free)?;
        }
        Commands::Export {
            config,
            from,
            to,
            output,
        } => {
            check_window(from, to)?;
            let provider = load_provider(&config)?;
            let ics = export_availability(provider.availability(), from, to);
            write_output(output.as_deref(), &ics)?;
        }
        Commands::Check { config, start, end } => {
            let provider = load_provider(&config)?;
            let slot = Interval::new_in(start, end, provider.timezone())
                .context("Invalid booking window")?;
            let detector = ConflictDetector::new([provider]).with_options(DetectorOptions {
                include_buffers: true,
                allow_double_booking: false,
            });
            print_json(&detector.check_all(&slot))?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("timeslot=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("timeslot=warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn instant(value: &str) -> Result<DateTime<Utc>, String> {
    parse_instant(value).map_err(|e| format!("{:#}", e))
}

fn check_window(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<()> {
    if to <= from {
        bail!("--to ({}) must be after --from ({})", to, from);
    }
    Ok(())
}

fn load_provider(path: &Path) -> Result<Provider> {
    let provider = ProviderConfig::load(path)?
        .into_provider()
        .with_context(|| format!("Invalid provider in {}", path.display()))?;
    debug!(id = provider.id(), tz = %provider.timezone(), "loaded provider");
    Ok(provider)
}

fn load_calendar(path: Option<&Path>) -> Result<Calendar> {
    let text = read_input(path)?;
    let calendar = Calendar::parse(&text).context("Failed to parse iCalendar input")?;
    debug!(events = calendar.events.len(), "loaded calendar");
    Ok(calendar)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let pretty = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", pretty);
    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display())),
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

fn write_output(path: Option<&Path>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write file: {}", path.display()))?;
        }
        None => {
            print!("{}", content);
        }
    }
    Ok(())
}
