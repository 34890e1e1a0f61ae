//! # fleet-cli
//!
//! The `fleetctl` command-line tool.
//!
//! Provides commands for:
//! - Evaluating a buffer policy against fleet replica counts
//! - Replaying a recorded notification stream through the metrics controller
//!
//! Notifications are JSON lines using the tagged layout of
//! [`fleet_metrics::Notification`]:
//!
//! ```text
//! {"kind":"game_server","change":{"event":"updated","old":{...},"new":{...}}}
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;

pub use cli::{Cli, Commands, EvaluateArgs, Format, LogFormat, ReplayArgs};
pub use error::CliError;
pub use output::OutputFormat;
