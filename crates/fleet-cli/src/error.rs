//! CLI error types.

use fleet_metrics::MetricsError;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A replay line could not be decoded.
    #[error("replay line {line}: {reason}")]
    Replay {
        /// One-based line number.
        line: usize,
        /// Decoding failure.
        reason: String,
    },

    /// Output formatting error.
    #[error("format error: {0}")]
    Format(String),

    /// The metrics pipeline failed.
    #[error(transparent)]
    Metrics(#[from] MetricsError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_error_display_replay() {
        let err = CliError::Replay {
            line: 3,
            reason: "missing field `kind`".into(),
        };
        assert_eq!(err.to_string(), "replay line 3: missing field `kind`");
    }

    #[test]
    fn cli_error_from_metrics_error() {
        let err = CliError::from(MetricsError::Config("bad interval".into()));
        assert_eq!(err.to_string(), "configuration error: bad interval");
    }

    #[test]
    fn cli_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let cli_err = CliError::from(io_err);
        assert!(matches!(cli_err, CliError::Io(_)));
    }
}
