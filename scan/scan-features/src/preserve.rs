//! Feature preservation measurement.

use kiddo::SquaredEuclidean;
use scan_types::ScanMesh;
use tracing::debug;

use crate::detect::FeaturePoint;

// Reconstructed flat patches leave whole rows of vertices sharing a
// coordinate; the tree bucket must hold such a row before it can split.
type VertexTree = kiddo::float::kdtree::KdTree<f64, u64, 3, 512, u32>;

/// Fraction of high-importance feature vertices from `original` that survive
/// in `processed`, by nearest-neighbor correspondence.
///
/// A feature survives if some processed vertex lies within `tolerance` mm of
/// its original position. Returns 1.0 when the original has no features at
/// or above `importance_floor`.
#[must_use]
pub fn feature_preservation(
    original: &ScanMesh,
    features: &[FeaturePoint],
    processed: &ScanMesh,
    tolerance: f64,
    importance_floor: f64,
) -> f64 {
    let important: Vec<&FeaturePoint> = features
        .iter()
        .filter(|f| f.importance >= importance_floor)
        .collect();
    if important.is_empty() {
        return 1.0;
    }
    if processed.is_empty() {
        return 0.0;
    }

    let mut kdtree = VertexTree::new();
    for (i, v) in processed.vertices.iter().enumerate() {
        let p = v.position;
        #[allow(clippy::cast_possible_truncation)]
        let idx = i as u64;
        kdtree.add(&[p.x, p.y, p.z], idx);
    }

    let tolerance_sq = tolerance * tolerance;
    let mut surviving = 0_usize;
    for f in &important {
        let p = original.vertices[f.vertex as usize].position;
        let nearest = kdtree.nearest_n::<SquaredEuclidean>(&[p.x, p.y, p.z], 1);
        if nearest.first().is_some_and(|n| n.distance <= tolerance_sq) {
            surviving += 1;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let fraction = surviving as f64 / important.len() as f64;
    debug!(
        important = important.len(),
        surviving, fraction, "feature preservation measured"
    );
    fraction
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_precision_loss)]
mod tests {
    use super::*;
    use crate::detect::FeatureClass;
    use nalgebra::Point3;
    use scan_types::MeshVertex;

    fn line_mesh(n: usize) -> ScanMesh {
        let mut mesh = ScanMesh::new();
        for i in 0..n {
            mesh.vertices
                .push(MeshVertex::new(Point3::new(i as f64, 0.0, 0.0)));
        }
        mesh
    }

    fn feature_at(vertex: u32, importance: f64) -> FeaturePoint {
        FeaturePoint {
            vertex,
            class: FeatureClass::Edge,
            curvature: 0.5,
            sharpness: 0.5,
            importance,
        }
    }

    #[test]
    fn identical_meshes_preserve_everything() {
        let mesh = line_mesh(10);
        let features = vec![feature_at(2, 0.9), feature_at(7, 0.8)];
        let p = feature_preservation(&mesh, &features, &mesh, 0.5, 0.5);
        approx::assert_relative_eq!(p, 1.0);
    }

    #[test]
    fn removed_features_lower_the_score() {
        let original = line_mesh(10);
        // Keep only the first half of the vertices.
        let mut processed = ScanMesh::new();
        processed.vertices = original.vertices[..5].to_vec();

        let features = vec![feature_at(2, 0.9), feature_at(8, 0.9)];
        let p = feature_preservation(&original, &features, &processed, 0.5, 0.5);
        approx::assert_relative_eq!(p, 0.5);
    }

    #[test]
    fn low_importance_features_ignored() {
        let original = line_mesh(10);
        let processed = ScanMesh::new();
        let features = vec![feature_at(2, 0.1)];
        let p = feature_preservation(&original, &features, &processed, 0.5, 0.5);
        approx::assert_relative_eq!(p, 1.0);
    }

    #[test]
    fn empty_processed_mesh_scores_zero() {
        let original = line_mesh(10);
        let features = vec![feature_at(2, 0.9)];
        let p = feature_preservation(&original, &features, &ScanMesh::new(), 0.5, 0.5);
        approx::assert_relative_eq!(p, 0.0);
    }
}
