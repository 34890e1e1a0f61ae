//! Output formatting for CLI commands.
//!
//! Supports table (human-readable) and JSON output formats.

use std::io::Write;

use serde::Serialize;

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Check if JSON format is selected.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.format, Format::Json)
    }

    /// Write a value in the selected format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Table => {
                value.write_table(writer)?;
            }
        }
        Ok(())
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Table)
    }
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value as a human-readable table.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

/// Result of evaluating a buffer policy against a fleet.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    /// Buffer size as given.
    pub buffer_size: String,
    /// Minimum replicas.
    pub min_replicas: u32,
    /// Maximum replicas.
    pub max_replicas: u32,
    /// Allocated replicas.
    pub allocated_replicas: u32,
    /// Current replicas.
    pub current_replicas: u32,
    /// Recommended replicas.
    pub target_replicas: u32,
    /// Whether the recommendation was clamped.
    pub limited: bool,
    /// Why the policy was rejected, if it was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TableDisplay for EvaluationReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Buffer Policy")?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "Buffer Size:      {}", self.buffer_size)?;
        writeln!(writer, "Min Replicas:     {}", self.min_replicas)?;
        writeln!(writer, "Max Replicas:     {}", self.max_replicas)?;
        writeln!(writer)?;
        writeln!(writer, "Fleet")?;
        writeln!(writer, "  Allocated:      {}", self.allocated_replicas)?;
        writeln!(writer, "  Current:        {}", self.current_replicas)?;
        writeln!(writer)?;
        writeln!(writer, "Decision")?;
        writeln!(writer, "  Target:         {}", self.target_replicas)?;
        writeln!(writer, "  Limited:        {}", if self.limited { "yes" } else { "no" })?;
        if let Some(error) = &self.error {
            writeln!(writer, "  Error:          {error}")?;
        }
        Ok(())
    }
}

/// Result of replaying a notification stream.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    /// Notifications handled.
    pub notifications: usize,
    /// Game servers present after the replay.
    pub game_servers: usize,
    /// Game servers with live dwell tracking.
    pub tracked_game_servers: usize,
    /// Reconciliation failure, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconcile_error: Option<String>,
    /// Media type of the exposition.
    pub content_type: String,
    /// Prometheus text exposition.
    pub exposition: String,
}

impl TableDisplay for ReplayReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "# notifications: {}", self.notifications)?;
        writeln!(writer, "# gameservers: {}", self.game_servers)?;
        writeln!(writer, "# tracked gameservers: {}", self.tracked_game_servers)?;
        if let Some(error) = &self.reconcile_error {
            writeln!(writer, "# reconcile error: {error}")?;
        }
        writeln!(writer, "# content type: {}", self.content_type)?;
        write!(writer, "{}", self.exposition)?;
        Ok(())
    }
}
