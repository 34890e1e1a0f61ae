//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use fleet_autoscaler::BufferSize;

/// Game-server fleet autoscaling and metrics tool.
#[derive(Parser, Debug, Clone)]
#[command(name = "fleetctl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table, global = true)]
    pub format: Format,

    /// Log output format (logs go to stderr).
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Log format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Compute the replica target a buffer policy recommends for a fleet.
    Evaluate(EvaluateArgs),

    /// Feed a recorded notification stream through the metrics controller
    /// and print the resulting measurements.
    Replay(ReplayArgs),
}

/// Arguments for the evaluate command.
#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    /// Buffer size: a replica count (`5`) or a percentage (`10%`).
    #[arg(short, long)]
    pub buffer: BufferSize,

    /// Minimum replicas.
    #[arg(long, default_value_t = 0)]
    pub min: u32,

    /// Maximum replicas.
    #[arg(long)]
    pub max: u32,

    /// Replicas currently allocated.
    #[arg(short, long, default_value_t = 0)]
    pub allocated: u32,

    /// Replicas that currently exist.
    #[arg(short, long, default_value_t = 0)]
    pub replicas: u32,
}

/// Arguments for the replay command.
#[derive(Args, Debug, Clone)]
pub struct ReplayArgs {
    /// JSON-lines file with one notification per line.
    pub file: PathBuf,

    /// Controller configuration file (TOML).
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}
