//! Error types for feature detection.

use thiserror::Error;

/// Result type for feature operations.
pub type FeatureResult<T> = Result<T, FeatureError>;

/// Errors that can occur during feature detection.
#[derive(Debug, Error)]
pub enum FeatureError {
    /// Invalid detection parameters.
    #[error("invalid feature parameter: {reason}")]
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
        let err = FeatureError::InvalidParameter {
            reason: "sharp angle must be positive".to_string(),
        };
        assert!(format!("{err}").contains("sharp angle"));
    }
}
