//! Scan session orchestration.
//!
//! Wires calibration, accumulation, live quality monitoring, acquisition
//! control, reconstruction, and post-processing into one session driver:
//!
//! - [`ScanPipeline`] - the lifecycle
//!   `start / ingest_frame / tick / interrupt / resume / finalize / abort`
//! - [`PreviewJob`] - low-resolution reconstructions on a worker thread
//!   with cooperative cancellation
//! - [`MeshCache`] - a bounded LRU of reconstructed meshes keyed by
//!   session and revision
//!
//! Guidance leaves through the injected [`GuidanceSink`]; persistence
//! arrives through the injected calibration store. The pipeline itself never
//! reads a wall clock, so every lifecycle path is testable with plain
//! `Timestamp` values.

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_const_for_fn)]

pub mod cache;
pub mod error;
pub mod pipeline;
pub mod preview;

pub use cache::{mesh_bytes, CacheKey, CacheStats, MeshCache};
pub use error::{PipelineError, PipelineResult};
pub use pipeline::{
    CollectingSink, FinalizeReport, GuidanceSink, PipelineParams, ScanPipeline,
};
pub use preview::{CancelToken, PreviewJob, PreviewOutcome};
