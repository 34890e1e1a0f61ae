//! Replay command implementation.
//!
//! Reads notifications recorded as JSON lines, feeds them through a
//! [`MetricsController`] backed by an in-memory cache, runs one
//! reconciliation over the final state and prints the Prometheus exposition.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use fleet_metrics::{
    ControllerConfig, MetricsController, Notification, PrometheusSink, ResourceCache,
};
use tracing::{info, warn};

use crate::cli::ReplayArgs;
use crate::error::CliError;
use crate::output::{OutputFormat, ReplayReport};

/// Handler for the replay subcommand.
#[derive(Debug, Default)]
pub struct ReplayCommand;

impl ReplayCommand {
    /// Creates a new replay command handler.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Replays the file named in `args` and writes the report.
    ///
    /// # Errors
    ///
    /// Returns error if the file or configuration cannot be read, a line
    /// cannot be decoded, or writing fails.
    pub async fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        args: &ReplayArgs,
    ) -> Result<(), CliError> {
        let config = match &args.config {
            Some(path) => ControllerConfig::from_file(path)?,
            None => ControllerConfig::default(),
        };
        let notifications = read_notifications(&args.file).await?;
        let report = replay(&notifications, config)?;
        format.write(out, &report)
    }
}

/// Decodes a JSON-lines notification stream. Blank lines and lines starting
/// with `#` are skipped.
///
/// # Errors
///
/// Returns [`CliError::Replay`] with the one-based line number of the first
/// line that fails to decode.
pub fn parse_notifications(content: &str) -> Result<Vec<Notification>, CliError> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with('#')
        })
        .map(|(index, line)| {
            serde_json::from_str(line).map_err(|e| CliError::Replay {
                line: index + 1,
                reason: e.to_string(),
            })
        })
        .collect()
}

async fn read_notifications(path: &Path) -> Result<Vec<Notification>, CliError> {
    let content = tokio::fs::read_to_string(path).await?;
    parse_notifications(&content)
}

/// Feeds `notifications` through a fresh controller and reconciles once.
///
/// A failed reconciliation is reported in the output, not as an error.
///
/// # Errors
///
/// Returns [`CliError::Metrics`] if `config` is invalid.
pub fn replay(
    notifications: &[Notification],
    config: ControllerConfig,
) -> Result<ReplayReport, CliError> {
    let cache = Arc::new(ResourceCache::new());
    let sink = PrometheusSink::new();
    let controller = MetricsController::new(Arc::clone(&cache), sink.clone(), config)?;

    for notification in notifications {
        cache.apply(notification);
        controller.handle(notification);
    }
    cache.mark_synced();

    let reconcile_error = controller.collect().err().map(|e| {
        warn!(error = %e, "reconciliation failed");
        e.to_string()
    });
    info!(notifications = notifications.len(), "replay complete");

    Ok(ReplayReport {
        notifications: notifications.len(),
        game_servers: cache.game_server_count(),
        tracked_game_servers: controller.durations().len(),
        reconcile_error,
        content_type: PrometheusSink::content_type().to_string(),
        exposition: sink.encode(),
    })
}
