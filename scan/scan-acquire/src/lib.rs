//! Acquisition mode control.
//!
//! A deterministic state machine that reacts to live quality estimates:
//! debounced sensor-mode fallback, exponential backoff between recovery
//! attempts, a bounded retry budget, and a strict finalization gate. All
//! timing is deadline-based over pipeline timestamps so the machine is fully
//! testable without sleeping.
//!
//! # Example
//!
//! ```
//! use scan_acquire::{AcquisitionMode, ControllerState, ModeController};
//! use scan_types::{CalibrationResult, Duration, PoseTransform, Timestamp};
//!
//! let calibration = CalibrationResult {
//!     accuracy: 0.99,
//!     stability: 0.97,
//!     coverage: 0.95,
//!     transform: PoseTransform::identity(),
//!     expiry: Duration::from_secs(3600),
//!     completed_at: Timestamp::zero(),
//! };
//! let mut controller = ModeController::default();
//! controller.start(AcquisitionMode::Hybrid, &calibration, Timestamp::zero()).unwrap();
//! assert_eq!(controller.state(), ControllerState::Active(AcquisitionMode::Hybrid));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_const_for_fn)]

pub mod backoff;
pub mod controller;
pub mod error;
pub mod events;
pub mod session;

pub use backoff::{BackoffPolicy, BackoffTimer};
pub use controller::{AcquisitionMode, ControllerParams, ControllerState, ModeController};
pub use error::{AcquireError, AcquireResult};
pub use events::{GuidanceEvent, GuidanceReason};
pub use session::AcquisitionSession;
