//! Statistical outlier vertex removal.
//!
//! For each vertex: mean distance to its k nearest neighbors, then remove
//! vertices whose mean distance exceeds `global mean + multiplier * std`.
//! Faces touching a removed vertex go with it.

use kiddo::SquaredEuclidean;
use scan_types::ScanMesh;
use tracing::debug;

use crate::params::OutlierParams;

// Reconstructed flat patches leave whole rows of vertices sharing a
// coordinate; the tree bucket must hold such a row before it can split.
type VertexTree = kiddo::float::kdtree::KdTree<f64, u64, 3, 512, u32>;

/// Statistics from one outlier removal pass.
#[derive(Debug, Clone, Copy)]
pub struct OutlierReport {
    /// Vertices before removal.
    pub original_vertices: usize,
    /// Vertices removed.
    pub removed: usize,
    /// The mean-distance threshold used.
    pub threshold: f64,
}

impl std::fmt::Display for OutlierReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        #[allow(clippy::cast_precision_loss)]
        let pct = if self.original_vertices == 0 {
            0.0
        } else {
            self.removed as f64 / self.original_vertices as f64 * 100.0
        };
        write!(
            f,
            "{} → {} vertices ({} removed, {pct:.1}%)",
            self.original_vertices,
            self.original_vertices - self.removed,
            self.removed
        )
    }
}

/// Removes outlier vertices.
///
/// Returns the cleaned mesh, the report, and a remap table from old vertex
/// index to new (or `None` for removed vertices) so callers can carry
/// per-vertex annotations across the stage.
#[must_use]
pub fn remove_outlier_vertices(
    mesh: &ScanMesh,
    params: &OutlierParams,
) -> (ScanMesh, OutlierReport, Vec<Option<u32>>) {
    let n = mesh.vertex_count();
    if n <= params.k_neighbors + 1 {
        let report = OutlierReport {
            original_vertices: n,
            removed: 0,
            threshold: f64::INFINITY,
        };
        #[allow(clippy::cast_possible_truncation)]
        let remap = (0..n).map(|i| Some(i as u32)).collect();
        return (mesh.clone(), report, remap);
    }

    let mut kdtree = VertexTree::new();
    for (i, v) in mesh.vertices.iter().enumerate() {
        let p = v.position;
        #[allow(clippy::cast_possible_truncation)]
        let idx = i as u64;
        kdtree.add(&[p.x, p.y, p.z], idx);
    }

    // Mean k-NN distance per vertex. The query includes the vertex itself at
    // distance zero, so ask for one extra.
    let mut mean_dists = Vec::with_capacity(n);
    for v in &mesh.vertices {
        let p = v.position;
        let neighbors = kdtree.nearest_n::<SquaredEuclidean>(&[p.x, p.y, p.z], params.k_neighbors + 1);
        let sum: f64 = neighbors.iter().skip(1).map(|nb| nb.distance.sqrt()).sum();
        #[allow(clippy::cast_precision_loss)]
        let count = neighbors.len().saturating_sub(1).max(1) as f64;
        mean_dists.push(sum / count);
    }

    #[allow(clippy::cast_precision_loss)]
    let nf = n as f64;
    let global_mean = mean_dists.iter().sum::<f64>() / nf;
    let variance = mean_dists
        .iter()
        .map(|d| (d - global_mean).powi(2))
        .sum::<f64>()
        / nf;
    // Corner and rim vertices of a perfectly clean mesh read slightly above
    // the sigma threshold because their neighborhoods are one-sided; the
    // median floor keeps them.
    let mut sorted = mean_dists.clone();
    sorted.sort_by(f64::total_cmp);
    let median = sorted[n / 2];
    let threshold = variance
        .sqrt()
        .mul_add(params.std_multiplier, global_mean)
        .max(params.median_floor * median);

    let mut remap: Vec<Option<u32>> = vec![None; n];
    let mut out = ScanMesh::new();
    for (i, v) in mesh.vertices.iter().enumerate() {
        if mean_dists[i] <= threshold {
            #[allow(clippy::cast_possible_truncation)]
            let new_idx = out.vertices.len() as u32;
            remap[i] = Some(new_idx);
            out.vertices.push(*v);
        }
    }
    for f in &mesh.faces {
        if let (Some(a), Some(b), Some(c)) = (
            remap[f[0] as usize],
            remap[f[1] as usize],
            remap[f[2] as usize],
        ) {
            out.faces.push([a, b, c]);
        }
    }

    let removed = n - out.vertex_count();
    let report = OutlierReport {
        original_vertices: n,
        removed,
        threshold,
    };
    debug!(%report, "outlier removal finished");
    (out, report, remap)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_precision_loss)]
mod tests {
    use super::*;
    use nalgebra::Point3;
    use scan_types::MeshVertex;

    fn grid_mesh_with_spike() -> ScanMesh {
        let n = 10;
        let mut mesh = ScanMesh::new();
        for j in 0..n {
            for i in 0..n {
                // Slight jitter keeps KD-tree axes distinct.
                let z = (j * n + i) as f64 * 1e-4;
                mesh.vertices
                    .push(MeshVertex::new(Point3::new(i as f64, j as f64, z)));
            }
        }
        #[allow(clippy::cast_possible_truncation)]
        let idx = |i: usize, j: usize| (j * n + i) as u32;
        for j in 0..n - 1 {
            for i in 0..n - 1 {
                mesh.faces.push([idx(i, j), idx(i + 1, j), idx(i + 1, j + 1)]);
                mesh.faces.push([idx(i, j), idx(i + 1, j + 1), idx(i, j + 1)]);
            }
        }
        // A far-away spike vertex, attached to one corner face.
        mesh.vertices
            .push(MeshVertex::new(Point3::new(50.0, 50.0, 80.0)));
        #[allow(clippy::cast_possible_truncation)]
        let spike = (mesh.vertices.len() - 1) as u32;
        mesh.faces.push([idx(0, 0), idx(1, 0), spike]);
        mesh
    }

    #[test]
    fn spike_removed_and_faces_dropped() {
        let mesh = grid_mesh_with_spike();
        let spike_faces = mesh.face_count();
        let (cleaned, report, remap) =
            remove_outlier_vertices(&mesh, &OutlierParams::default());
        assert_eq!(report.removed, 1);
        assert_eq!(remap.last().copied().unwrap(), None);
        assert_eq!(cleaned.face_count(), spike_faces - 1);
    }

    #[test]
    fn remap_preserves_surviving_order() {
        let mesh = grid_mesh_with_spike();
        let (cleaned, _, remap) = remove_outlier_vertices(&mesh, &OutlierParams::default());
        for (old, new) in remap.iter().enumerate() {
            if let Some(new) = new {
                let a = mesh.vertices[old].position;
                let b = cleaned.vertices[*new as usize].position;
                approx::assert_relative_eq!((a - b).norm(), 0.0);
            }
        }
    }

    #[test]
    fn clean_mesh_untouched() {
        let mut mesh = grid_mesh_with_spike();
        // Drop the spike beforehand; the rest is a uniform grid.
        mesh.vertices.pop();
        mesh.faces.pop();
        let (cleaned, report, _) =
            remove_outlier_vertices(&mesh, &OutlierParams::conservative());
        assert_eq!(report.removed, 0);
        assert_eq!(cleaned.vertex_count(), mesh.vertex_count());
    }

    #[test]
    fn grid_corners_survive_default_params() {
        // Corner vertices have the widest mean neighbor distance of any
        // clean-grid vertex; none of them may be classed as outliers.
        let mut mesh = grid_mesh_with_spike();
        mesh.vertices.pop();
        mesh.faces.pop();
        let (cleaned, report, remap) =
            remove_outlier_vertices(&mesh, &OutlierParams::default());
        assert_eq!(report.removed, 0);
        assert_eq!(cleaned.vertex_count(), mesh.vertex_count());
        for corner in [0_usize, 9, 90, 99] {
            assert!(remap[corner].is_some());
        }
    }

    #[test]
    fn jittered_grid_survives_distant_strays_do_not() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(7);
        let n = 20;
        let mut mesh = ScanMesh::new();
        for j in 0..n {
            for i in 0..n {
                mesh.vertices.push(MeshVertex::new(Point3::new(
                    i as f64 + rng.gen_range(-0.1..0.1),
                    j as f64 + rng.gen_range(-0.1..0.1),
                    rng.gen_range(-0.1..0.1),
                )));
            }
        }
        // Strays far outside the jitter band.
        for _ in 0..4 {
            mesh.vertices.push(MeshVertex::new(Point3::new(
                rng.gen_range(40.0..60.0),
                rng.gen_range(40.0..60.0),
                rng.gen_range(40.0..60.0),
            )));
        }
        let (cleaned, report, _) = remove_outlier_vertices(&mesh, &OutlierParams::default());
        assert_eq!(report.removed, 4);
        assert_eq!(cleaned.vertex_count(), n * n);
    }

    #[test]
    fn tiny_mesh_skipped() {
        let mut mesh = ScanMesh::new();
        mesh.vertices.push(MeshVertex::new(Point3::origin()));
        let (cleaned, report, _) = remove_outlier_vertices(&mesh, &OutlierParams::default());
        assert_eq!(report.removed, 0);
        assert_eq!(cleaned.vertex_count(), 1);
    }
}
