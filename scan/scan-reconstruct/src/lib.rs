//! Surface reconstruction from accumulated scan clouds.
//!
//! Adaptive octree over the cloud, a screened-Poisson indicator solve on the
//! leaf graph, and surface-nets isosurface extraction with cross-leaf vertex
//! welding. The result carries the quality metrics that the finalization
//! gate judges.
//!
//! # Example
//!
//! ```no_run
//! use scan_reconstruct::{reconstruct, ReconstructParams};
//! use scan_types::{CloudSnapshot, SensorProfile, Timestamp};
//!
//! let snapshot = CloudSnapshot::new(Vec::new(), 0, 0, Timestamp::zero());
//! let report = reconstruct(&snapshot, &SensorProfile::preview(), &ReconstructParams::preview())?;
//! println!("{report}");
//! # Ok::<(), scan_reconstruct::ReconstructError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::many_single_char_names)]

pub mod error;
pub mod extract;
pub mod metrics;
pub mod normals;
pub mod octree;
pub mod params;
pub mod poisson;

use nalgebra::Point3;
use scan_types::{CloudSnapshot, QualityMetrics, ScanMesh, SensorProfile};
use tracing::info;

/// KD-tree used throughout reconstruction.
///
/// Scan clouds and octree leaf centers sit on regular lattices, so whole
/// rows of points share a coordinate on an axis. A tree bucket must be able
/// to hold such a row before it can split on that axis, hence the large
/// bucket size.
pub type GridTree = kiddo::float::kdtree::KdTree<f64, u64, 3, 512, u32>;

pub use error::{ReconstructError, ReconstructResult};
pub use extract::{extract_surface, ExtractionStats};
pub use metrics::certify;
pub use normals::{estimate_normals, orient_outward};
pub use octree::{Octree, OctreeNode};
pub use params::ReconstructParams;
pub use poisson::{solve_indicator, IndicatorField};

/// Outcome of one reconstruction run.
#[derive(Debug, Clone)]
pub struct ReconstructReport {
    /// The reconstructed surface.
    pub mesh: ScanMesh,
    /// Metrics certifying the mesh against its source cloud.
    pub metrics: QualityMetrics,
    /// Usable samples after confidence filtering.
    pub sample_count: usize,
    /// Octree leaves in the solve.
    pub leaf_count: usize,
    /// Conjugate-gradient iterations consumed.
    pub solver_iterations: usize,
    /// Final relative solver residual.
    pub solver_residual: f64,
    /// Extraction statistics.
    pub extraction: ExtractionStats,
}

impl std::fmt::Display for ReconstructReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} samples → {} vertices, {} faces ({} leaves, {} CG iterations); {}",
            self.sample_count,
            self.mesh.vertex_count(),
            self.mesh.face_count(),
            self.leaf_count,
            self.solver_iterations,
            self.metrics
        )
    }
}

/// Reconstructs a surface from a cloud snapshot.
///
/// Samples below the profile's confidence floor are discarded first. Normals
/// are estimated and oriented outward, the indicator field is solved over the
/// adaptive octree, and the extracted mesh is certified against the cloud.
///
/// # Errors
///
/// - [`ReconstructError::InsufficientPointDensity`] below the profile's
///   minimum sample count;
/// - [`ReconstructError::InvalidInput`] for degenerate bounds or parameters;
/// - [`ReconstructError::OctreeBuildFailed`] if the octree cannot be built.
pub fn reconstruct(
    snapshot: &CloudSnapshot,
    profile: &SensorProfile,
    params: &ReconstructParams,
) -> ReconstructResult<ReconstructReport> {
    params.validate()?;
    profile
        .validate()
        .map_err(|e| ReconstructError::InvalidInput {
            reason: e.to_string(),
        })?;

    let mut positions: Vec<Point3<f64>> = Vec::with_capacity(snapshot.len());
    let mut confidences: Vec<f32> = Vec::with_capacity(snapshot.len());
    for s in &snapshot.samples {
        if s.confidence >= profile.confidence_floor {
            positions.push(s.position);
            confidences.push(s.confidence);
        }
    }

    if positions.len() < profile.min_point_count {
        return Err(ReconstructError::InsufficientPointDensity {
            required: profile.min_point_count,
            actual: positions.len(),
        });
    }

    let bounds = scan_types::Aabb::from_points(&positions)
        .ok_or_else(|| ReconstructError::InvalidInput {
            reason: "empty cloud".to_string(),
        })?
        .cubified(params.bounds_padding);
    if bounds.max_extent() <= f64::EPSILON {
        return Err(ReconstructError::InvalidInput {
            reason: "degenerate cloud bounds".to_string(),
        });
    }

    let mut normals = estimate_normals(&positions, params.normal_k)?;
    orient_outward(&positions, &mut normals);

    let octree = Octree::build(
        &positions,
        bounds,
        profile.samples_per_node,
        profile.max_octree_depth,
    )?;
    let field = solve_indicator(
        &octree,
        &normals,
        &confidences,
        profile.point_weight,
        params,
    )?;
    let (mut mesh, extraction) = extract_surface(
        &octree,
        &field,
        &positions,
        &confidences,
        profile.min_edge_length,
        params.field_k,
    );
    mesh.compute_vertex_normals();

    let metrics = certify(snapshot, &mesh, profile.min_edge_length);
    mesh.metrics = Some(metrics);

    let report = ReconstructReport {
        sample_count: positions.len(),
        leaf_count: field.centers.len(),
        solver_iterations: field.iterations,
        solver_residual: field.residual,
        extraction,
        metrics,
        mesh,
    };
    info!(profile = profile.name, "{report}");
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_precision_loss)]
mod tests {
    use super::*;
    use scan_types::{PointSample, SourceModality, Timestamp};

    fn sphere_snapshot(n: usize, radius: f64, confidence: f32) -> CloudSnapshot {
        use std::f64::consts::PI;
        let mut samples = Vec::new();
        for i in 0..n {
            let theta = PI * (i as f64 + 0.5) / n as f64;
            for j in 0..n {
                let phi = 2.0 * PI * j as f64 / n as f64;
                samples.push(PointSample::new(
                    Point3::new(
                        radius * theta.sin() * phi.cos(),
                        radius * theta.sin() * phi.sin(),
                        radius * theta.cos(),
                    ),
                    confidence,
                    SourceModality::Range,
                    Timestamp::zero(),
                ));
            }
        }
        let count = samples.len();
        CloudSnapshot::new(samples, count, 0, Timestamp::zero())
    }

    #[test]
    fn reconstructs_a_sphere() {
        // Radius chosen so the preview extraction grid pitch clears the
        // profile's minimum edge length.
        let snapshot = sphere_snapshot(24, 80.0, 0.9);
        let profile = SensorProfile::preview();
        let report = reconstruct(&snapshot, &profile, &ReconstructParams::default()).unwrap();
        assert!(report.mesh.face_count() > 100);
        assert!(report.metrics.surface_completeness > 0.5);
        assert!(report.mesh.metrics.is_some());
    }

    #[test]
    fn too_few_points_rejected() {
        let snapshot = sphere_snapshot(4, 50.0, 0.9);
        let profile = SensorProfile::lidar_rated();
        assert!(matches!(
            reconstruct(&snapshot, &profile, &ReconstructParams::default()),
            Err(ReconstructError::InsufficientPointDensity { .. })
        ));
    }

    #[test]
    fn low_confidence_samples_are_filtered() {
        // All samples sit below the floor, so none are usable.
        let snapshot = sphere_snapshot(24, 50.0, 0.1);
        let profile = SensorProfile::preview();
        let err = reconstruct(&snapshot, &profile, &ReconstructParams::default()).unwrap_err();
        assert!(matches!(
            err,
            ReconstructError::InsufficientPointDensity { actual: 0, .. }
        ));
    }

    #[test]
    fn report_display_mentions_counts() {
        let snapshot = sphere_snapshot(20, 50.0, 0.9);
        let report =
            reconstruct(&snapshot, &SensorProfile::preview(), &ReconstructParams::preview())
                .unwrap();
        let text = format!("{report}");
        assert!(text.contains("samples"));
        assert!(text.contains("faces"));
    }
}
