//! Recorder error types.
//!
//! Only caller-contract violations surface as errors. Gaps in the narrated
//! state (no current method, no open block) are reported as
//! [`Misuse`](crate::diagnostics::Misuse) diagnostics instead.

use thiserror::Error;

/// Errors returned by recorder operations.
#[derive(Debug, Error)]
pub enum RecorderError {
    /// An argument had a shape the operation does not accept.
    #[error("invalid argument to {operation}: {reason}")]
    InvalidArgument {
        operation: &'static str,
        reason: String,
    },

    /// A configuration value could not be parsed.
    #[error("invalid configuration for {key}: {reason}")]
    InvalidConfig { key: &'static str, reason: String },

    /// Serializing the trace failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<steplog_core::CoreError> for RecorderError {
    fn from(err: steplog_core::CoreError) -> Self {
        match &err {
            steplog_core::CoreError::InvalidColor { .. } => RecorderError::InvalidConfig {
                key: "palette",
                reason: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = RecorderError::InvalidArgument {
            operation: "add_data",
            reason: "expected a string key or a single-entry object, got number".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid argument to add_data: expected a string key or a single-entry object, got number"
        );
    }

    #[test]
    fn core_error_maps_to_config_error() {
        let err: RecorderError = steplog_core::CoreError::InvalidColor {
            literal: "blue".into(),
        }
        .into();
        assert!(matches!(err, RecorderError::InvalidConfig { key: "palette", .. }));
        assert!(err.to_string().contains("blue"));
    }
}
