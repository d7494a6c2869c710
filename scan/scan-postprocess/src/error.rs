//! Error types for post-processing.

use thiserror::Error;

/// Result type for post-processing operations.
pub type PostprocessResult<T> = Result<T, PostprocessError>;

/// Errors that can occur while configuring post-processing.
#[derive(Debug, Error)]
pub enum PostprocessError {
    /// Invalid stage parameter.
    #[error("invalid post-processing parameter: {reason}")]
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
        let err = PostprocessError::InvalidParameter {
            reason: "smoothing lambda must be in (0, 1]".to_string(),
        };
        assert!(format!("{err}").contains("lambda"));
    }
}
