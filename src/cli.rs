use chrono::{DateTime, Utc};
use clap::Parser;

/// Recalculates member uptime, SLA credits and billed costs from downtime events.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Only evaluate this member
    #[arg(long)]
    pub member: Option<String>,
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
    pub month: Option<u32>,
    #[arg(long)]
    pub year: Option<i32>,
    /// Evaluate as if the current time were this instant (RFC 3339)
    #[arg(long, value_parser = clap::value_parser!(DateTime<Utc>))]
    pub now: Option<DateTime<Utc>>,
    /// End the billing window at the current time instead of the month end
    #[arg(long)]
    pub month_to_date: bool,
    /// Include the trailing twelve months of site uptime
    #[arg(long)]
    pub history: bool,
    /// Recalculate on the configured interval until interrupted
    #[arg(long)]
    pub watch: bool,
    #[arg(long)]
    pub dry_run: bool,
}
