//! Error types for the autoscaler.

use thiserror::Error;

/// Result type for autoscaler operations.
pub type Result<T> = std::result::Result<T, AutoscalerError>;

/// Errors that can occur when evaluating fleet autoscaling policies.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AutoscalerError {
    /// Invalid buffer policy configuration.
    #[error("invalid buffer policy: {reason}")]
    InvalidPolicy {
        /// Description of why the policy is invalid.
        reason: String,
    },

    /// A textual buffer size could not be interpreted.
    #[error("invalid buffer size '{value}': {reason}")]
    InvalidBufferSize {
        /// The raw value that was rejected.
        value: String,
        /// Description of why the value was rejected.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_invalid_policy() {
        let err = AutoscalerError::InvalidPolicy {
            reason: "min_replicas (10) cannot exceed max_replicas (5)".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid buffer policy: min_replicas (10) cannot exceed max_replicas (5)"
        );
    }

    #[test]
    fn error_display_invalid_buffer_size() {
        let err = AutoscalerError::InvalidBufferSize {
            value: "abc%".into(),
            reason: "not a number".into(),
        };
        assert_eq!(err.to_string(), "invalid buffer size 'abc%': not a number");
    }

    #[test]
    fn error_clone_and_eq() {
        let err1 = AutoscalerError::InvalidPolicy {
            reason: "min > max".into(),
        };
        let err2 = err1.clone();
        assert_eq!(err1, err2);
    }
}
