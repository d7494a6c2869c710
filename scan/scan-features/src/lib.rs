//! Surface feature detection for scan meshes.
//!
//! Detects ridges, creases, and corners from one-ring normal variation, and
//! measures how well post-processing preserved them. Detected features drive
//! smoothing clamps and decimation pinning in `scan-postprocess`; the
//! preservation fraction feeds the finalization gate.

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_const_for_fn)]

pub mod detect;
pub mod error;
pub mod preserve;

pub use detect::{
    by_vertex, detect_features, important_vertices, vertex_adjacency, FeatureClass,
    FeatureParams, FeaturePoint,
};
pub use error::{FeatureError, FeatureResult};
pub use preserve::feature_preservation;
