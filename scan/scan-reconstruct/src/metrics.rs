//! Post-reconstruction quality certification.
//!
//! Measures the reconstructed mesh against the cloud it came from. These
//! metrics feed the finalization gate; the reconstructor itself never
//! rejects a mesh.

use kiddo::SquaredEuclidean;
use nalgebra::Point3;
use scan_types::{CloudSnapshot, QualityMetrics, ScanMesh};
use tracing::debug;

use crate::GridTree;

/// Certifies a mesh against its source cloud.
///
/// - density: cloud samples per cm² of reconstructed surface;
/// - completeness: fraction of samples within `tolerance` mm of the mesh;
/// - noise: RMS distance from samples to the tangent plane at the nearest
///   mesh vertex, in mm;
/// - normal consistency: mean alignment of adjacent face normals;
/// - feature preservation is 1.0 here (nothing has been removed yet).
///
/// `tolerance` is normally the profile's minimum edge length.
#[must_use]
pub fn certify(cloud: &CloudSnapshot, mesh: &ScanMesh, tolerance: f64) -> QualityMetrics {
    let mut metrics = QualityMetrics::unprocessed(0.0, 0.0, 0.0, 1.0);
    if mesh.is_empty() || cloud.is_empty() {
        return metrics;
    }

    let area_mm2 = mesh.area();
    if area_mm2 > f64::EPSILON {
        #[allow(clippy::cast_precision_loss)]
        let count = cloud.len() as f64;
        metrics.point_density = count / (area_mm2 / 100.0);
    }

    let mut vertex_tree = GridTree::new();
    for (i, v) in mesh.vertices.iter().enumerate() {
        let p = v.position;
        #[allow(clippy::cast_possible_truncation)]
        let idx = i as u64;
        vertex_tree.add(&[p.x, p.y, p.z], idx);
    }

    let mut within = 0_usize;
    let mut sq_plane_dist = 0.0_f64;
    for sample in &cloud.samples {
        let p = sample.position;
        let Some(nearest) = vertex_tree
            .nearest_n::<SquaredEuclidean>(&[p.x, p.y, p.z], 1)
            .first()
            .copied()
        else {
            continue;
        };
        if nearest.distance.sqrt() <= tolerance {
            within += 1;
        }
        #[allow(clippy::cast_possible_truncation)]
        let v = &mesh.vertices[nearest.item as usize];
        let offset = p - v.position;
        let plane_dist = if v.normal.norm() > 0.5 {
            offset.dot(&v.normal)
        } else {
            offset.norm()
        };
        sq_plane_dist += plane_dist * plane_dist;
    }
    #[allow(clippy::cast_precision_loss)]
    {
        let n = cloud.len() as f64;
        metrics.surface_completeness = within as f64 / n;
        metrics.noise_level = (sq_plane_dist / n).sqrt();
    }
    metrics.normal_consistency = mesh.normal_consistency();

    debug!(
        density = metrics.point_density,
        completeness = metrics.surface_completeness,
        noise = metrics.noise_level,
        normal_consistency = metrics.normal_consistency,
        "mesh certified"
    );
    metrics
}

/// Convenience: nearest-vertex distance from a point to the mesh.
#[must_use]
pub fn nearest_vertex_distance(mesh: &ScanMesh, p: &Point3<f64>) -> Option<f64> {
    let mut best: Option<f64> = None;
    for v in &mesh.vertices {
        let d = (p - v.position).norm();
        best = Some(best.map_or(d, |b: f64| b.min(d)));
    }
    best
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use nalgebra::Vector3;
    use scan_types::{MeshVertex, PointSample, SourceModality, Timestamp};

    fn flat_mesh() -> ScanMesh {
        // A 10 x 10 mm quad in the z = 0 plane.
        let mut mesh = ScanMesh::new();
        for (x, y) in [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)] {
            let mut v = MeshVertex::new(Point3::new(x, y, 0.0));
            v.normal = Vector3::z();
            mesh.vertices.push(v);
        }
        mesh.faces.push([0, 1, 2]);
        mesh.faces.push([0, 2, 3]);
        mesh
    }

    fn cloud_at_height(z: f64, n: usize) -> CloudSnapshot {
        #[allow(clippy::cast_precision_loss)]
        let samples = (0..n)
            .map(|i| {
                let x = (i % 10) as f64;
                let y = (i / 10) as f64;
                PointSample::new(
                    Point3::new(x, y, z),
                    1.0,
                    SourceModality::Range,
                    Timestamp::zero(),
                )
            })
            .collect();
        CloudSnapshot::new(samples, n, 0, Timestamp::zero())
    }

    #[test]
    fn clean_cloud_scores_well() {
        let mesh = flat_mesh();
        let metrics = certify(&cloud_at_height(0.0, 100), &mesh, 2.0);
        assert!(metrics.surface_completeness > 0.9);
        assert!(metrics.noise_level < 1e-9);
        approx::assert_relative_eq!(metrics.normal_consistency, 1.0);
        // 100 points on a 1 cm² quad.
        approx::assert_relative_eq!(metrics.point_density, 100.0);
    }

    #[test]
    fn offset_cloud_reads_as_noise() {
        let mesh = flat_mesh();
        let metrics = certify(&cloud_at_height(0.7, 100), &mesh, 2.0);
        approx::assert_relative_eq!(metrics.noise_level, 0.7, epsilon = 1e-9);
    }

    #[test]
    fn empty_mesh_keeps_defaults() {
        let metrics = certify(&cloud_at_height(0.0, 10), &ScanMesh::new(), 2.0);
        approx::assert_relative_eq!(metrics.surface_completeness, 0.0);
    }
}
