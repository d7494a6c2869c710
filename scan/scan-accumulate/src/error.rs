//! Error types for accumulation.

use thiserror::Error;

/// Result type for accumulator operations.
pub type AccumulateResult<T> = Result<T, AccumulateError>;

/// Errors that can occur while configuring the accumulator.
#[derive(Debug, Error)]
pub enum AccumulateError {
    /// Invalid parameter value.
    #[error("invalid accumulator parameter: {reason}")]
    InvalidParameter {
        /// Why the parameter is invalid.
        reason: String,
    },
}
