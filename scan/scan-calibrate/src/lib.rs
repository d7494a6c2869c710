//! Sensor calibration management.
//!
//! A scan session may only start against a certified, unexpired calibration.
//! This crate provides:
//!
//! - **Sessions** - single-flight calibration sessions; starting a second one
//!   while one is active fails with `CalibrationInProgress`
//! - **Certification** - fixed floors (accuracy ≥ 0.98, stability ≥ 0.95,
//!   coverage ≥ 0.90) that measurements must clear before a
//!   [`CalibrationResult`](scan_types::CalibrationResult) is produced
//! - **Expiry** - a configurable validity interval; expired calibrations
//!   block session start and are never silently bypassed
//! - **Persistence** - an injected opaque blob store
//!   ([`CalibrationStore`]), with [`MemoryStore`] for tests
//!
//! # Example
//!
//! ```
//! use scan_calibrate::{CalibrationManager, CalibrationMeasurements, CalibrationPolicy, MemoryStore};
//! use scan_types::{PoseTransform, Timestamp};
//!
//! let mut manager = CalibrationManager::new(
//!     Box::new(MemoryStore::new()),
//!     CalibrationPolicy::default(),
//! );
//! assert!(manager.is_calibration_required(Timestamp::zero()));
//!
//! let session = manager.start_calibration(Timestamp::zero()).unwrap();
//! let measurements = CalibrationMeasurements {
//!     accuracy: 0.99,
//!     stability: 0.96,
//!     coverage: 0.93,
//!     transform: PoseTransform::identity(),
//! };
//! manager
//!     .complete_calibration(session, &measurements, Timestamp::zero())
//!     .unwrap();
//! assert!(!manager.is_calibration_required(Timestamp::zero()));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_const_for_fn)]

pub mod error;
pub mod manager;
pub mod store;

pub use error::{CalibrationError, CalibrationOpResult};
pub use manager::{
    CalibrationManager, CalibrationMeasurements, CalibrationPolicy, CalibrationSession,
};
pub use store::{CalibrationStore, MemoryStore};
