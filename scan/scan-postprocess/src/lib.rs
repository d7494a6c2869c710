//! Mesh post-processing for scan meshes.
//!
//! Chains optional cleanup stages over a reconstructed mesh: statistical
//! outlier removal, feature-clamped Laplacian smoothing, feature-pinned
//! decimation, and vertex-cache index reordering. Every stage reports its
//! own statistics; feature preservation is measured against the input mesh
//! once all stages are done.

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_const_for_fn)]

pub mod decimate;
pub mod error;
pub mod outlier;
pub mod params;
mod quadric;
pub mod reorder;
pub mod smooth;

pub use decimate::{decimate_mesh, DecimateReport};
pub use error::{PostprocessError, PostprocessResult};
pub use outlier::{remove_outlier_vertices, OutlierReport};
pub use params::{DecimateParams, OutlierParams, PostprocessParams, SmoothParams};
pub use reorder::{reorder_for_cache, ReorderReport};
pub use smooth::{smooth_mesh, SmoothReport};

use hashbrown::HashSet;
use scan_features::{feature_preservation, important_vertices, FeaturePoint};
use scan_types::ScanMesh;
use tracing::{info, warn};

/// A non-fatal quality problem encountered during post-processing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QualityWarning {
    /// Decimation degraded normal consistency below the configured floor;
    /// the un-decimated mesh was kept.
    DecimationReverted {
        /// Normal consistency of the decimated mesh.
        measured: f64,
        /// The configured floor.
        required: f64,
    },
}

impl std::fmt::Display for QualityWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DecimationReverted { measured, required } => write!(
                f,
                "decimation reverted: normal consistency {measured:.3} below {required:.3}"
            ),
        }
    }
}

/// Combined result of one post-processing run.
#[derive(Debug, Clone)]
pub struct PostprocessReport {
    /// The processed mesh, with vertex normals recomputed.
    pub mesh: ScanMesh,
    /// Outlier stage statistics, if the stage ran.
    pub outlier: Option<OutlierReport>,
    /// Smoothing stage statistics, if the stage ran.
    pub smooth: Option<SmoothReport>,
    /// Decimation statistics, if the stage ran (kept even when reverted).
    pub decimate: Option<DecimateReport>,
    /// Reordering statistics, if the stage ran.
    pub reorder: Option<ReorderReport>,
    /// Non-fatal problems encountered.
    pub warnings: Vec<QualityWarning>,
    /// Fraction of important input features surviving in the output.
    pub feature_preservation: f64,
    /// Normal consistency of the output mesh.
    pub normal_consistency: f64,
}

impl std::fmt::Display for PostprocessReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} vertices, {} faces (features {:.2}, normals {:.2}",
            self.mesh.vertex_count(),
            self.mesh.face_count(),
            self.feature_preservation,
            self.normal_consistency
        )?;
        if self.warnings.is_empty() {
            write!(f, ")")
        } else {
            write!(f, ", {} warnings)", self.warnings.len())
        }
    }
}

/// Runs the configured stages over `mesh`.
///
/// `features` are per-vertex features detected on `mesh`; vertices at or
/// above the configured importance floor are clamped during smoothing and
/// pinned during decimation. If decimation drops normal consistency below
/// `min_normal_consistency`, the decimation is undone and a
/// [`QualityWarning::DecimationReverted`] is attached instead of failing.
///
/// # Errors
///
/// Returns [`PostprocessError::InvalidParameter`] when `params` fail
/// validation.
pub fn postprocess(
    mesh: &ScanMesh,
    features: &[FeaturePoint],
    params: &PostprocessParams,
) -> PostprocessResult<PostprocessReport> {
    params.validate()?;

    let mut current = mesh.clone();
    let mut feature_set = important_vertices(features, params.feature_importance_floor);
    let mut warnings = Vec::new();

    let outlier_report = params.outlier.as_ref().map(|outlier_params| {
        let (cleaned, report, remap) = remove_outlier_vertices(&current, outlier_params);
        current = cleaned;
        feature_set = feature_set
            .iter()
            .filter_map(|&v| remap.get(v as usize).copied().flatten())
            .collect::<HashSet<u32>>();
        report
    });

    let smooth_report = params
        .smooth
        .as_ref()
        .map(|smooth_params| smooth_mesh(&mut current, &feature_set, smooth_params));

    let decimate_report = params.decimate.as_ref().map(|decimate_params| {
        let (decimated, report) = decimate_mesh(&current, &feature_set, decimate_params);
        let consistency = decimated.normal_consistency();
        if consistency < params.min_normal_consistency {
            warn!(
                consistency,
                floor = params.min_normal_consistency,
                "decimation reverted"
            );
            warnings.push(QualityWarning::DecimationReverted {
                measured: consistency,
                required: params.min_normal_consistency,
            });
        } else {
            current = decimated;
        }
        report
    });

    let reorder_report = params.reorder.then(|| reorder_for_cache(&mut current));

    current.compute_vertex_normals();
    let preservation = feature_preservation(
        mesh,
        features,
        &current,
        params.feature_tolerance,
        params.feature_importance_floor,
    );
    let consistency = current.normal_consistency();
    if let Some(metrics) = current.metrics.as_mut() {
        metrics.feature_preservation = preservation;
        metrics.normal_consistency = consistency;
    }

    let report = PostprocessReport {
        mesh: current,
        outlier: outlier_report,
        smooth: smooth_report,
        decimate: decimate_report,
        reorder: reorder_report,
        warnings,
        feature_preservation: preservation,
        normal_consistency: consistency,
    };
    info!(%report, "post-processing finished");
    Ok(report)
}
