//! Error types for acquisition control.

use thiserror::Error;

/// Result type for controller operations.
pub type AcquireResult<T> = Result<T, AcquireError>;

/// Errors produced by the acquisition mode controller.
#[derive(Debug, Error)]
pub enum AcquireError {
    /// An operation was requested in a state that does not allow it.
    #[error("operation not valid in state {state}")]
    InvalidState {
        /// Human-readable name of the current state.
        state: String,
    },

    /// The session's calibration has expired; re-calibrate before resuming.
    #[error("calibration expired, re-calibration required")]
    CalibrationExpired,

    /// Quality never recovered within the retry budget.
    #[error("quality threshold not met after {retries} recovery attempts")]
    QualityThresholdNotMet {
        /// Number of recovery attempts consumed.
        retries: u32,
    },

    /// No acquisition session is active.
    #[error("no active acquisition session")]
    NoSession,
}
