//! Acquisition quality monitoring.
//!
//! Two responsibilities: a rolling-window live monitor that classifies
//! current scan conditions for the acquisition controller, and a strict
//! finalization gate applied to post-reconstruction metrics before a mesh is
//! accepted.
//!
//! # Example
//!
//! ```
//! use scan_quality::{LiveThresholds, QualityMonitor, QualityStatus, SensorTelemetry};
//! use scan_types::{CloudSnapshot, PoseTransform, Timestamp};
//!
//! let mut monitor = QualityMonitor::with_default_window(LiveThresholds::hybrid()).unwrap();
//! let cloud = CloudSnapshot::new(Vec::new(), 0, 0, Timestamp::zero());
//! let telemetry = SensorTelemetry {
//!     pose: PoseTransform::identity(),
//!     ambient_lux: 400.0,
//!     feature_confidence: Some(0.9),
//!     timestamp: Timestamp::zero(),
//! };
//! let estimate = monitor.evaluate(&cloud, telemetry);
//! assert_eq!(estimate.status, QualityStatus::Unknown);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_const_for_fn)]

pub mod error;
pub mod monitor;
pub mod thresholds;

pub use error::{QualityError, QualityResult};
pub use monitor::{
    patch_density, QualityEstimate, QualityMonitor, QualityReason, QualityStatus, SensorTelemetry,
};
pub use thresholds::{FinalizationThresholds, GateReport, GateShortfall, LiveThresholds};
