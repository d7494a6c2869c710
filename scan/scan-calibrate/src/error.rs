//! Error types for calibration.

use scan_types::Duration;
use thiserror::Error;

/// Result type for calibration operations.
pub type CalibrationOpResult<T> = Result<T, CalibrationError>;

/// Errors that block a scan session from starting.
///
/// Calibration errors are never silently bypassed; callers must surface them
/// as hard stops.
#[derive(Debug, Error)]
pub enum CalibrationError {
    /// Measured accuracy fell below the certification floor.
    #[error("calibration accuracy {measured:.3} below required {required:.3}")]
    AccuracyBelowThreshold {
        /// Measured accuracy score.
        measured: f64,
        /// Required minimum.
        required: f64,
    },

    /// Measured stability fell below the certification floor.
    #[error("calibration stability {measured:.3} below required {required:.3}")]
    InsufficientStability {
        /// Measured stability score.
        measured: f64,
        /// Required minimum.
        required: f64,
    },

    /// Measured coverage fell below the certification floor.
    #[error("calibration coverage {measured:.3} below required {required:.3}")]
    InsufficientCoverage {
        /// Measured coverage score.
        measured: f64,
        /// Required minimum.
        required: f64,
    },

    /// A calibration session is already active.
    #[error("a calibration session is already in progress")]
    CalibrationInProgress,

    /// The session handed to `complete_calibration` is not the active one.
    #[error("calibration session {0} is not active")]
    UnknownSession(u64),

    /// The stored calibration has expired.
    #[error("calibration expired: age {age_secs:.0}s exceeds {max_secs:.0}s")]
    CalibrationExpired {
        /// Age of the stored result in seconds.
        age_secs: f64,
        /// Configured maximum in seconds.
        max_secs: f64,
    },

    /// No calibration has ever been completed.
    #[error("sensor has never been calibrated")]
    NotCalibrated,

    /// The persistence collaborator failed.
    #[error("calibration store error: {0}")]
    StoreError(String),
}

impl CalibrationError {
    /// Builds the expiry error from an age and a policy interval.
    #[must_use]
    pub fn expired(age: Duration, max: Duration) -> Self {
        Self::CalibrationExpired {
            age_secs: age.as_secs_f64(),
            max_secs: max.as_secs_f64(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = CalibrationError::AccuracyBelowThreshold {
            measured: 0.97,
            required: 0.98,
        };
        assert!(format!("{err}").contains("0.970"));

        let err = CalibrationError::expired(Duration::from_secs(90), Duration::from_secs(60));
        assert!(format!("{err}").contains("90"));
    }
}
