//! Operator guidance events.

use scan_types::{Duration, Timestamp};
use serde::{Deserialize, Serialize};

use crate::controller::AcquisitionMode;

/// Machine-readable reason behind a guidance event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuidanceReason {
    /// Device motion is degrading the scan; hold the device steady.
    HoldSteady,
    /// Coverage is too sparse; move closer or slow the sweep.
    MoveCloser,
    /// Ambient light is too low for the active modality.
    ImproveLighting,
    /// The controller is switching sensing modes.
    SwitchingMode {
        /// Mode being left.
        from: AcquisitionMode,
        /// Mode being entered after recovery.
        to: AcquisitionMode,
    },
    /// A recovery pause has been scheduled.
    RetryScheduled {
        /// Length of the pause.
        delay: Duration,
    },
    /// The finalization gate rejected the reconstructed mesh.
    FinalizeRejected,
    /// The retry budget is exhausted; the session has failed.
    RetryExhausted,
}

/// One guidance event, stamped with pipeline time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuidanceEvent {
    /// Why the event was emitted.
    pub reason: GuidanceReason,
    /// When the event was emitted.
    pub timestamp: Timestamp,
}

impl GuidanceEvent {
    /// Creates an event at the given time.
    #[must_use]
    pub const fn new(reason: GuidanceReason, timestamp: Timestamp) -> Self {
        Self { reason, timestamp }
    }
}
