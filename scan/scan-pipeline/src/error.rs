//! Error types for pipeline orchestration.

use scan_accumulate::AccumulateError;
use scan_acquire::AcquireError;
use scan_calibrate::CalibrationError;
use scan_features::FeatureError;
use scan_postprocess::PostprocessError;
use scan_quality::{GateReport, QualityError};
use scan_reconstruct::ReconstructError;
use thiserror::Error;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors surfaced by the scan pipeline.
///
/// Component errors pass through unchanged so callers can match on the
/// underlying cause.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Calibration layer error.
    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    /// Accumulator error.
    #[error(transparent)]
    Accumulate(#[from] AccumulateError),

    /// Quality monitor error.
    #[error(transparent)]
    Quality(#[from] QualityError),

    /// Acquisition controller error.
    #[error(transparent)]
    Acquire(#[from] AcquireError),

    /// Reconstruction error.
    #[error(transparent)]
    Reconstruct(#[from] ReconstructError),

    /// Post-processing error.
    #[error(transparent)]
    Postprocess(#[from] PostprocessError),

    /// Feature detection error.
    #[error(transparent)]
    Feature(#[from] FeatureError),

    /// An operation needed an active acquisition and there is none.
    #[error("no active acquisition")]
    NotActive,

    /// The last live quality evaluation does not permit finalization.
    #[error("live quality does not permit finalization")]
    NotReadyToFinalize,

    /// Post-reconstruction metrics failed the finalization gate. The mesh
    /// was discarded and the session returned to recovery.
    #[error("{0}")]
    GateFailed(GateReport),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_failure_display_carries_shortfall_count() {
        let err = PipelineError::GateFailed(GateReport {
            passed: false,
            shortfalls: Vec::new(),
        });
        assert!(format!("{err}").contains("failed"));
    }

    #[test]
    fn component_errors_pass_through() {
        let err: PipelineError = AcquireError::NoSession.into();
        assert!(matches!(err, PipelineError::Acquire(_)));
    }
}
