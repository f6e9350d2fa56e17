use clap::{Args, Parser, Subcommand};

use std::path::PathBuf;

use chrono_tz::Tz;

use super::constants::{
    ENV_CONFIG, ENV_DATA_DIR, ENV_FOLLOW, ENV_REPLAY_INTERVAL_MS, ENV_TIMEZONE,
    ENV_WAIT_TIMEOUT_MS,
};
use crate::data::types::LogLevel;

#[derive(Parser)]
#[command(name = "logfacet")]
#[command(version, about = "Facet discovery and filter state for task logs", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Keep discovery streams open for later facet changes
    #[arg(long, global = true, env = ENV_FOLLOW)]
    pub follow: Option<bool>,

    /// Directory holding `<entity>.ndjson` discovery recordings
    #[arg(long, short = 'd', global = true, env = ENV_DATA_DIR)]
    pub data_dir: Option<PathBuf>,

    /// Delay between replayed payloads in milliseconds
    #[arg(long, global = true, env = ENV_REPLAY_INTERVAL_MS)]
    pub replay_interval_ms: Option<u64>,

    /// How long `filter` waits for the first snapshot, in milliseconds
    #[arg(long, global = true, env = ENV_WAIT_TIMEOUT_MS)]
    pub wait_timeout_ms: Option<u64>,

    /// Time zone of wall-clock arguments (IANA name, defaults to the host zone)
    #[arg(long, global = true, env = ENV_TIMEZONE, value_parser = parse_timezone)]
    pub timezone: Option<Tz>,
}

/// Parse an IANA time zone name from CLI/env string
fn parse_timezone(s: &str) -> Result<Tz, String> {
    s.parse::<Tz>().map_err(|_| {
        format!(
            "Invalid time zone '{}'. Expected an IANA name such as Europe/Berlin",
            s
        )
    })
}

/// Parse a selectable log level from CLI string
fn parse_level(s: &str) -> Result<LogLevel, String> {
    let level = LogLevel::parse(s);
    if !level.is_selectable() {
        return Err(format!(
            "Invalid level '{}'. Valid options: trace, debug, info, warning, error, critical",
            s
        ));
    }
    Ok(level)
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Discover and print the facets of an entity
    Facets {
        /// Entity (task) id
        entity: String,

        /// Stop after the first snapshot
        #[arg(long)]
        no_follow: bool,
    },
    /// Build filter criteria against an entity's facets
    Filter(FilterArgs),
    /// List selectable log levels
    Levels,
}

#[derive(Args, Clone, Debug, Default)]
pub struct FilterArgs {
    /// Entity (task) id
    pub entity: String,

    /// Start from criteria stored in a JSON file
    #[arg(long)]
    pub from: Option<PathBuf>,

    /// Clear the starting criteria before applying edits
    #[arg(long)]
    pub clear: bool,

    /// Agent ids to keep
    #[arg(long = "agent")]
    pub agents: Vec<String>,

    /// Container ids to keep
    #[arg(long = "container")]
    pub containers: Vec<String>,

    /// Rank ids to keep
    #[arg(long = "rank")]
    pub ranks: Vec<i64>,

    /// Log levels to keep
    #[arg(long = "level", value_parser = parse_level)]
    pub levels: Vec<LogLevel>,

    /// Log sources to keep
    #[arg(long = "source")]
    pub sources: Vec<String>,

    /// Output streams to keep (stdout, stderr)
    #[arg(long = "stdtype")]
    pub stdtypes: Vec<String>,

    /// Lower time bound as a local wall clock (YYYY-MM-DDTHH:MM:SS)
    #[arg(long)]
    pub after: Option<String>,

    /// Upper time bound as a local wall clock (YYYY-MM-DDTHH:MM:SS)
    #[arg(long)]
    pub before: Option<String>,
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub config: Option<PathBuf>,
    pub follow: Option<bool>,
    pub data_dir: Option<PathBuf>,
    pub replay_interval_ms: Option<u64>,
    pub wait_timeout_ms: Option<u64>,
    pub timezone: Option<Tz>,
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Commands) {
    let cli = Cli::parse();
    let config = CliConfig {
        config: cli.config,
        follow: cli.follow,
        data_dir: cli.data_dir,
        replay_interval_ms: cli.replay_interval_ms,
        wait_timeout_ms: cli.wait_timeout_ms,
        timezone: cli.timezone,
    };
    (config, cli.command)
}
