//! Core data model for the scalp-scan pipeline.
//!
//! This crate defines the types shared by every stage of the acquisition and
//! reconstruction pipeline:
//!
//! - **Time** - Nanosecond-precision [`Timestamp`] and [`Duration`] so that
//!   backoff and windowing logic is testable without a wall clock
//! - **Samples** - [`PointSample`], [`PointCloudFrame`], and [`PoseTransform`]
//!   as delivered by the depth-ranging and visual-feature collaborators
//! - **Snapshots** - [`CloudSnapshot`], the immutable world-space point set
//!   handed to readers of the accumulator
//! - **Meshes** - [`ScanMesh`] with per-vertex confidence, the final artifact
//!   handed to downstream analyzers
//! - **Quality** - [`QualityMetrics`], the certification record attached to
//!   every emitted mesh
//! - **Profiles** - [`SensorProfile`], the per-sensor numeric configuration
//!   for reconstruction and accumulation
//! - **Calibration** - [`CalibrationResult`], consumed read-only by the
//!   accumulator and the mode controller
//!
//! All geometry uses `nalgebra` with `f64` coordinates in **millimeters**;
//! surface densities are reported in points per cm².
//!
//! # Example
//!
//! ```
//! use scan_types::{PointCloudFrame, PointSample, PoseTransform, SourceModality, Timestamp};
//! use nalgebra::Point3;
//!
//! let sample = PointSample::new(
//!     Point3::new(1.0, 2.0, 3.0),
//!     0.9,
//!     SourceModality::Range,
//!     Timestamp::from_millis(33),
//! );
//! let frame = PointCloudFrame::new(vec![sample], PoseTransform::identity(), Timestamp::from_millis(33));
//! assert_eq!(frame.len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::cast_precision_loss)]

pub mod bounds;
pub mod calibration;
pub mod mesh;
pub mod profile;
pub mod quality;
pub mod sample;
pub mod time;

pub use bounds::Aabb;
pub use calibration::CalibrationResult;
pub use mesh::{MeshVertex, ScanMesh};
pub use profile::{ProfileError, SensorProfile};
pub use quality::QualityMetrics;
pub use sample::{CloudSnapshot, PointCloudFrame, PointSample, PoseTransform, SourceModality};
pub use time::{Duration, Timestamp};
