//! Acquisition session record.

use scan_types::{CalibrationResult, Duration, Timestamp};
use serde::{Deserialize, Serialize};

use crate::controller::AcquisitionMode;

/// Book-keeping for one acquisition run.
///
/// The controller owns and mutates this; callers read it for reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionSession {
    /// Session identifier.
    pub id: u64,
    /// Mode currently (or last) active.
    pub active_mode: AcquisitionMode,
    /// Every mode the session has entered, in order.
    pub mode_history: Vec<AcquisitionMode>,
    /// Degraded quality evaluations since the last good one.
    pub consecutive_failures: u32,
    /// The delay the next recovery pause would use.
    pub current_backoff: Duration,
    /// Calibration in force when the session started.
    pub calibration: CalibrationResult,
    /// When the session started.
    pub started_at: Timestamp,
}

impl AcquisitionSession {
    /// Opens a session in the requested mode.
    #[must_use]
    pub fn new(
        id: u64,
        mode: AcquisitionMode,
        calibration: CalibrationResult,
        started_at: Timestamp,
    ) -> Self {
        Self {
            id,
            active_mode: mode,
            mode_history: vec![mode],
            consecutive_failures: 0,
            current_backoff: Duration::zero(),
            calibration,
            started_at,
        }
    }

    /// Records entry into a mode.
    pub fn enter_mode(&mut self, mode: AcquisitionMode) {
        self.active_mode = mode;
        self.mode_history.push(mode);
    }

    /// Number of mode switches performed so far.
    #[must_use]
    pub fn mode_switches(&self) -> usize {
        self.mode_history.len().saturating_sub(1)
    }
}
