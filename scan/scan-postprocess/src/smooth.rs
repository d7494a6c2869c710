//! Clamped Laplacian smoothing.
//!
//! Each pass moves every vertex toward the average of its one-ring
//! neighbors by `lambda`. Feature vertices use `lambda * feature_clamp`
//! instead, so creases and ridges keep their shape while open surface
//! noise is flattened.

use hashbrown::HashSet;
use nalgebra::Vector3;
use scan_features::vertex_adjacency;
use scan_types::ScanMesh;
use tracing::debug;

use crate::params::SmoothParams;

/// Statistics from one smoothing run.
#[derive(Debug, Clone, Copy)]
pub struct SmoothReport {
    /// Passes applied.
    pub iterations: usize,
    /// Mean vertex displacement over the whole run, in mm.
    pub mean_displacement: f64,
    /// Vertices that used the clamped step.
    pub clamped_vertices: usize,
}

impl std::fmt::Display for SmoothReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} passes, mean displacement {:.3} mm ({} feature vertices clamped)",
            self.iterations, self.mean_displacement, self.clamped_vertices
        )
    }
}

/// Smooths the mesh in place.
///
/// `feature_vertices` receive the clamped step. Vertex normals are stale
/// afterwards; the caller recomputes them once all stages are done.
pub fn smooth_mesh(
    mesh: &mut ScanMesh,
    feature_vertices: &HashSet<u32>,
    params: &SmoothParams,
) -> SmoothReport {
    let n = mesh.vertex_count();
    if n == 0 || params.iterations == 0 {
        return SmoothReport {
            iterations: 0,
            mean_displacement: 0.0,
            clamped_vertices: 0,
        };
    }

    let adjacency = vertex_adjacency(mesh);
    let original: Vec<_> = mesh.vertices.iter().map(|v| v.position).collect();

    for _ in 0..params.iterations {
        let positions: Vec<_> = mesh.vertices.iter().map(|v| v.position).collect();
        for (vi, neighbors) in adjacency.iter().enumerate() {
            if neighbors.is_empty() {
                continue;
            }
            let mut avg = Vector3::zeros();
            for &w in neighbors {
                avg += positions[w as usize].coords;
            }
            #[allow(clippy::cast_precision_loss)]
            let avg = avg / neighbors.len() as f64;

            #[allow(clippy::cast_possible_truncation)]
            let is_feature = feature_vertices.contains(&(vi as u32));
            let step = if is_feature {
                params.lambda * params.feature_clamp
            } else {
                params.lambda
            };
            let p = positions[vi].coords;
            mesh.vertices[vi].position = (p + (avg - p) * step).into();
        }
    }

    let mut total_displacement = 0.0;
    for (v, orig) in mesh.vertices.iter().zip(&original) {
        total_displacement += (v.position - orig).norm();
    }
    #[allow(clippy::cast_precision_loss)]
    let mean_displacement = total_displacement / n as f64;

    let clamped = feature_vertices
        .iter()
        .filter(|&&v| (v as usize) < n)
        .count();
    let report = SmoothReport {
        iterations: params.iterations,
        mean_displacement,
        clamped_vertices: clamped,
    };
    debug!(%report, "smoothing finished");
    report
}
