//! Per-vertex feature detection.
//!
//! Curvature and sharpness are estimated from one-ring topological
//! neighbors. Sharp incident edges (large dihedral between vertex normals)
//! drive the classification; smooth but strongly curved regions read as
//! ridges.

use hashbrown::{HashMap, HashSet};
use nalgebra::Vector3;
use scan_types::ScanMesh;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FeatureError, FeatureResult};

/// Feature classification for a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureClass {
    /// Smooth but strongly curved.
    Ridge,
    /// On a sharp crease (one or two sharp incident edges).
    Edge,
    /// Meeting point of several creases.
    Corner,
}

/// One detected feature vertex.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeaturePoint {
    /// Index into the mesh's vertex list.
    pub vertex: u32,
    /// Classification.
    pub class: FeatureClass,
    /// Normal-variation curvature estimate, `[0, 1]`.
    pub curvature: f64,
    /// Sharpest incident edge, `[0, 1]`.
    pub sharpness: f64,
    /// Combined importance score, `[0, 1]`.
    pub importance: f64,
}

/// Parameters for feature detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureParams {
    /// Dihedral angle (degrees) above which an edge counts as sharp.
    /// Default: 30.
    pub sharp_angle_deg: f64,
    /// Curvature above which a smooth vertex still counts as a ridge.
    /// Default: 0.08.
    pub ridge_curvature: f64,
    /// Weight of curvature in the importance score. Default: 0.5.
    pub curvature_weight: f64,
    /// Weight of sharpness in the importance score. Default: 0.5.
    pub sharpness_weight: f64,
}

impl Default for FeatureParams {
    fn default() -> Self {
        Self {
            sharp_angle_deg: 30.0,
            ridge_curvature: 0.08,
            curvature_weight: 0.5,
            sharpness_weight: 0.5,
        }
    }
}

impl FeatureParams {
    /// Creates parameters with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sharp-edge angle threshold.
    #[must_use]
    pub const fn with_sharp_angle_deg(mut self, degrees: f64) -> Self {
        self.sharp_angle_deg = degrees;
        self
    }

    /// Sets the ridge curvature threshold.
    #[must_use]
    pub const fn with_ridge_curvature(mut self, curvature: f64) -> Self {
        self.ridge_curvature = curvature;
        self
    }

    /// Validates the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::InvalidParameter`] for out-of-range values.
    pub fn validate(&self) -> FeatureResult<()> {
        if !(0.0..=180.0).contains(&self.sharp_angle_deg) || self.sharp_angle_deg == 0.0 {
            return Err(FeatureError::InvalidParameter {
                reason: "sharp_angle_deg must be in (0, 180]".to_string(),
            });
        }
        if self.curvature_weight < 0.0 || self.sharpness_weight < 0.0 {
            return Err(FeatureError::InvalidParameter {
                reason: "importance weights must be non-negative".to_string(),
            });
        }
        Ok(())
    }
}

/// One-ring vertex adjacency from the face list.
#[must_use]
pub fn vertex_adjacency(mesh: &ScanMesh) -> Vec<Vec<u32>> {
    let mut neighbor_sets: Vec<HashSet<u32>> = vec![HashSet::new(); mesh.vertex_count()];
    for f in &mesh.faces {
        for e in 0..3 {
            let a = f[e];
            let b = f[(e + 1) % 3];
            neighbor_sets[a as usize].insert(b);
            neighbor_sets[b as usize].insert(a);
        }
    }
    neighbor_sets
        .into_iter()
        .map(|s| {
            let mut v: Vec<u32> = s.into_iter().collect();
            v.sort_unstable();
            v
        })
        .collect()
}

/// Detects feature vertices on a mesh.
///
/// The mesh must carry vertex normals (see
/// `ScanMesh::compute_vertex_normals`); vertices with zero normals are
/// skipped. Returns only classified vertices; smooth low-curvature vertices
/// are absent from the result.
///
/// # Errors
///
/// Returns [`FeatureError::InvalidParameter`] if `params` fail validation.
pub fn detect_features(
    mesh: &ScanMesh,
    params: &FeatureParams,
) -> FeatureResult<Vec<FeaturePoint>> {
    params.validate()?;
    let adjacency = vertex_adjacency(mesh);
    let sharp_dot = params.sharp_angle_deg.to_radians().cos();

    let mut features = Vec::new();
    for (vi, neighbors) in adjacency.iter().enumerate() {
        if neighbors.len() < 2 {
            continue;
        }
        let n_v: Vector3<f64> = mesh.vertices[vi].normal;
        if n_v.norm() < 0.5 {
            continue;
        }

        let mut variation_sum = 0.0;
        let mut sharpest = 0.0_f64;
        let mut sharp_edges = 0_usize;
        for &wi in neighbors {
            let n_w = mesh.vertices[wi as usize].normal;
            if n_w.norm() < 0.5 {
                continue;
            }
            let dot = n_v.dot(&n_w).clamp(-1.0, 1.0);
            // 0 for parallel normals, 1 for opposed.
            let deviation = (1.0 - dot) * 0.5;
            variation_sum += deviation;
            sharpest = sharpest.max(deviation);
            if dot < sharp_dot {
                sharp_edges += 1;
            }
        }
        #[allow(clippy::cast_precision_loss)]
        let curvature = variation_sum / neighbors.len() as f64;

        let class = match sharp_edges {
            0 if curvature >= params.ridge_curvature => FeatureClass::Ridge,
            0 => continue,
            1 | 2 => FeatureClass::Edge,
            _ => FeatureClass::Corner,
        };

        let importance = (params.curvature_weight * curvature
            + params.sharpness_weight * sharpest)
            .clamp(0.0, 1.0);

        #[allow(clippy::cast_possible_truncation)]
        features.push(FeaturePoint {
            vertex: vi as u32,
            class,
            curvature,
            sharpness: sharpest,
            importance,
        });
    }

    debug!(
        vertices = mesh.vertex_count(),
        features = features.len(),
        "features detected"
    );
    Ok(features)
}

/// The vertex indices of features at or above an importance floor.
#[must_use]
pub fn important_vertices(features: &[FeaturePoint], importance_floor: f64) -> HashSet<u32> {
    features
        .iter()
        .filter(|f| f.importance >= importance_floor)
        .map(|f| f.vertex)
        .collect()
}

/// Builds an index from vertex id to its feature record.
#[must_use]
pub fn by_vertex(features: &[FeaturePoint]) -> HashMap<u32, FeaturePoint> {
    features.iter().map(|f| (f.vertex, *f)).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_precision_loss)]
mod tests {
    use super::*;
    use nalgebra::Point3;
    use scan_types::MeshVertex;

    /// Two planar sheets meeting at a 90 degree crease along x = 0.
    fn creased_sheet(n: usize) -> ScanMesh {
        let mut mesh = ScanMesh::new();
        let half = (n / 2) as i64;
        for j in 0..n {
            for i in 0..n {
                let u = i as i64 - half;
                let (x, z) = if u <= 0 {
                    (u as f64, 0.0)
                } else {
                    (0.0, u as f64)
                };
                mesh.vertices
                    .push(MeshVertex::new(Point3::new(x, j as f64, z)));
            }
        }
        let idx = |i: usize, j: usize| (j * n + i) as u32;
        for j in 0..n - 1 {
            for i in 0..n - 1 {
                mesh.faces.push([idx(i, j), idx(i + 1, j), idx(i + 1, j + 1)]);
                mesh.faces.push([idx(i, j), idx(i + 1, j + 1), idx(i, j + 1)]);
            }
        }
        mesh.compute_vertex_normals();
        mesh
    }

    /// A flat sheet in the z = 0 plane.
    fn flat_sheet(n: usize) -> ScanMesh {
        let mut mesh = ScanMesh::new();
        for j in 0..n {
            for i in 0..n {
                mesh.vertices
                    .push(MeshVertex::new(Point3::new(i as f64, j as f64, 0.0)));
            }
        }
        let idx = |i: usize, j: usize| (j * n + i) as u32;
        for j in 0..n - 1 {
            for i in 0..n - 1 {
                mesh.faces.push([idx(i, j), idx(i + 1, j), idx(i + 1, j + 1)]);
                mesh.faces.push([idx(i, j), idx(i + 1, j + 1), idx(i, j + 1)]);
            }
        }
        mesh.compute_vertex_normals();
        mesh
    }

    #[test]
    fn flat_sheet_has_no_features() {
        let mesh = flat_sheet(8);
        let features = detect_features(&mesh, &FeatureParams::default()).unwrap();
        assert!(features.is_empty(), "{} unexpected features", features.len());
    }

    #[test]
    fn crease_vertices_detected() {
        let n = 10;
        let mesh = creased_sheet(n);
        let features = detect_features(&mesh, &FeatureParams::default()).unwrap();
        assert!(!features.is_empty());

        // The crease line sits at x = 0, z = 0; averaged vertex normals make
        // the ring next to it read sharp too, but nothing further out.
        for f in &features {
            let p = mesh.vertices[f.vertex as usize].position;
            assert!(
                p.x >= -1.0 - 1e-9 && p.z <= 1.0 + 1e-9,
                "feature away from the crease at {p:?}"
            );
        }
        let crease_rows = features
            .iter()
            .filter(|f| {
                let p = mesh.vertices[f.vertex as usize].position;
                p.x.abs() < 1e-9 && p.z.abs() < 1e-9
            })
            .count();
        assert!(crease_rows > 0);
    }

    #[test]
    fn crease_features_have_high_importance() {
        let mesh = creased_sheet(10);
        let features = detect_features(&mesh, &FeatureParams::default()).unwrap();
        let important = important_vertices(&features, 0.05);
        assert!(!important.is_empty());
    }

    #[test]
    fn adjacency_is_symmetric() {
        let mesh = flat_sheet(4);
        let adjacency = vertex_adjacency(&mesh);
        for (v, neighbors) in adjacency.iter().enumerate() {
            for &w in neighbors {
                #[allow(clippy::cast_possible_truncation)]
                let v32 = v as u32;
                assert!(adjacency[w as usize].contains(&v32));
            }
        }
    }

    #[test]
    fn invalid_params_rejected() {
        let mesh = flat_sheet(4);
        let params = FeatureParams::new().with_sharp_angle_deg(0.0);
        assert!(detect_features(&mesh, &params).is_err());
    }
}
