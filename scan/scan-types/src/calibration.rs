//! Calibration results.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::sample::PoseTransform;
use crate::time::{Duration, Timestamp};

/// A certified sensor calibration.
///
/// Produced by the calibration manager, consumed read-only by the accumulator
/// (geometric transform) and the mode controller (validity gate).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CalibrationResult {
    /// Geometric accuracy score in `[0, 1]`.
    pub accuracy: f64,
    /// Measurement stability score in `[0, 1]`.
    pub stability: f64,
    /// Spatial coverage score in `[0, 1]`.
    pub coverage: f64,
    /// Sensor-to-rig correction transform.
    pub transform: PoseTransform,
    /// How long the calibration remains valid. Region-specific: clinics in
    /// high-vibration environments configure shorter intervals.
    pub expiry: Duration,
    /// When calibration completed.
    pub completed_at: Timestamp,
}

impl CalibrationResult {
    /// Returns the age of this calibration at `now`.
    #[must_use]
    pub fn age(&self, now: Timestamp) -> Duration {
        now.abs_diff(self.completed_at)
    }

    /// Returns true if the calibration has expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.age(now) > self.expiry
    }
}
