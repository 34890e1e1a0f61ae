//! Evaluate command implementation.

use std::io::Write;

use fleet_autoscaler::{BufferPolicy, FleetState, apply_or_hold};
use tracing::warn;

use crate::cli::EvaluateArgs;
use crate::error::CliError;
use crate::output::{EvaluationReport, OutputFormat};

/// Handler for the evaluate subcommand.
#[derive(Debug, Default)]
pub struct EvaluateCommand;

impl EvaluateCommand {
    /// Creates a new evaluate command handler.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the decision for `args` and writes it.
    ///
    /// An invalid policy is reported in the output, not as an error.
    ///
    /// # Errors
    ///
    /// Returns error if writing the output fails.
    pub fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        args: &EvaluateArgs,
    ) -> Result<(), CliError> {
        format.write(out, &Self::report(args))
    }

    /// Builds the report for `args`.
    #[must_use]
    pub fn report(args: &EvaluateArgs) -> EvaluationReport {
        let policy = BufferPolicy::new(args.buffer, args.min, args.max);
        let fleet = FleetState::new("cli", "default")
            .with_replicas(args.replicas)
            .with_allocated(args.allocated);

        let (decision, error) = apply_or_hold(&policy, &fleet);
        if let Some(e) = &error {
            warn!(error = %e, "buffer policy rejected, holding current replicas");
        }

        EvaluationReport {
            buffer_size: args.buffer.to_string(),
            min_replicas: args.min,
            max_replicas: args.max,
            allocated_replicas: args.allocated,
            current_replicas: args.replicas,
            target_replicas: decision.target_replicas,
            limited: decision.limited,
            error: error.map(|e| e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_autoscaler::BufferSize;

    fn args(buffer: BufferSize, min: u32, max: u32, allocated: u32) -> EvaluateArgs {
        EvaluateArgs {
            buffer,
            min,
            max,
            allocated,
            replicas: allocated,
        }
    }

    #[test]
    fn count_buffer_adds_to_allocated() {
        let report = EvaluateCommand::report(&args(BufferSize::Count(5), 0, 100, 2));
        assert_eq!(report.target_replicas, 7);
        assert!(!report.limited);
        assert!(report.error.is_none());
    }

    #[test]
    fn percentage_buffer() {
        let report = EvaluateCommand::report(&args(BufferSize::Percentage(10.0), 0, 100, 9));
        assert_eq!(report.target_replicas, 10);
        assert_eq!(report.buffer_size, "10%");
    }

    #[test]
    fn clamped_to_min() {
        let report = EvaluateCommand::report(&args(BufferSize::Count(5), 10, 20, 2));
        assert_eq!(report.target_replicas, 10);
        assert!(report.limited);
    }

    #[test]
    fn invalid_policy_holds_current_replicas() {
        let mut invalid = args(BufferSize::Count(5), 20, 10, 2);
        invalid.replicas = 4;
        let report = EvaluateCommand::report(&invalid);
        assert_eq!(report.target_replicas, 4);
        assert!(report.error.is_some());
    }

    #[test]
    fn execute_writes_json() {
        let mut buf = Vec::new();
        EvaluateCommand::new()
            .execute(
                &mut buf,
                &OutputFormat::new(crate::cli::Format::Json),
                &args(BufferSize::Count(5), 0, 100, 2),
            )
            .expect("execute");
        let value: serde_json::Value = serde_json::from_slice(&buf).expect("json");
        assert_eq!(value["target_replicas"], 7);
    }
}
