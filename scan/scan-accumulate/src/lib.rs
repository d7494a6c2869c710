//! Point-cloud accumulation.
//!
//! The accumulator is the single mutable shared structure in the pipeline.
//! It ingests per-frame samples at sensor rate, transforms them into world
//! space, filters by the calibrated confidence floor, and merges duplicates
//! with a voxel hash grid. Readers (quality monitor, reconstructor) only ever
//! see immutable snapshots.
//!
//! # Example
//!
//! ```
//! use scan_accumulate::{Accumulator, AccumulatorParams};
//! use scan_types::{PointCloudFrame, PointSample, PoseTransform, SensorProfile, SourceModality, Timestamp};
//! use nalgebra::Point3;
//!
//! let params = AccumulatorParams::from_profile(&SensorProfile::lidar_rated());
//! let mut acc = Accumulator::new(params, PoseTransform::identity()).unwrap();
//!
//! let frame = PointCloudFrame::new(
//!     vec![PointSample::new(Point3::new(1.0, 2.0, 3.0), 0.9, SourceModality::Range, Timestamp::zero())],
//!     PoseTransform::identity(),
//!     Timestamp::zero(),
//! );
//! acc.ingest(&frame);
//! assert_eq!(acc.snapshot(Timestamp::zero()).len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_const_for_fn)]

pub mod accumulator;
pub mod error;

pub use accumulator::{Accumulator, AccumulatorParams, IngestReport};
pub use error::{AccumulateError, AccumulateResult};
