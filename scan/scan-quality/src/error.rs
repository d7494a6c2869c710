//! Error types for quality monitoring.

use thiserror::Error;

/// Result type for quality operations.
pub type QualityResult<T> = Result<T, QualityError>;

/// Errors that can occur while configuring the quality monitor.
#[derive(Debug, Error)]
pub enum QualityError {
    /// Invalid monitor configuration.
    #[error("invalid quality monitor parameter: {reason}")]
    InvalidParameter {
        /// Why the parameter is invalid.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let err = QualityError::InvalidParameter {
            reason: "window must be non-zero".to_string(),
        };
        assert!(format!("{err}").contains("window"));
    }
}
