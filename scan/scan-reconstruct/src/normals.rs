//! Normal estimation for unoriented scan clouds.
//!
//! PCA plane fit over k nearest neighbors, then a centroid-outward flip.
//! Scalp patches are star-shaped around the head centroid, so the outward
//! heuristic is reliable here.

use kiddo::SquaredEuclidean;
use nalgebra::{Matrix3, Point3, SymmetricEigen, Vector3};
use rayon::prelude::*;

use crate::error::{ReconstructError, ReconstructResult};
use crate::GridTree;

/// Builds a KD-tree over positions, indexed by position order.
pub(crate) fn build_kdtree(positions: &[Point3<f64>]) -> GridTree {
    let mut kdtree = GridTree::new();
    for (i, p) in positions.iter().enumerate() {
        let coords = [p.x, p.y, p.z];
        #[allow(clippy::cast_possible_truncation)]
        let idx = i as u64;
        kdtree.add(&coords, idx);
    }
    kdtree
}

/// Estimates a normal per position using PCA on k nearest neighbors.
///
/// The normal is the eigenvector of the neighborhood covariance matrix with
/// the smallest eigenvalue. Orientation is arbitrary; call
/// [`orient_outward`] afterwards.
///
/// # Errors
///
/// Returns [`ReconstructError::InvalidInput`] for fewer than 3 points or
/// `k < 3`.
pub fn estimate_normals(
    positions: &[Point3<f64>],
    k: usize,
) -> ReconstructResult<Vec<Vector3<f64>>> {
    if positions.len() < 3 {
        return Err(ReconstructError::InvalidInput {
            reason: format!("{} points, at least 3 required", positions.len()),
        });
    }
    if k < 3 {
        return Err(ReconstructError::InvalidInput {
            reason: "normal_k must be at least 3".to_string(),
        });
    }

    let kdtree = build_kdtree(positions);
    let normals = positions
        .par_iter()
        .map(|p| pca_normal(p, &kdtree, positions, k))
        .collect();
    Ok(normals)
}

/// Flips normals that point toward the cloud centroid.
pub fn orient_outward(positions: &[Point3<f64>], normals: &mut [Vector3<f64>]) {
    if positions.is_empty() {
        return;
    }
    let sum: Vector3<f64> = positions.iter().map(|p| p.coords).sum();
    #[allow(clippy::cast_precision_loss)]
    let centroid = Point3::from(sum / positions.len() as f64);
    for (p, n) in positions.iter().zip(normals.iter_mut()) {
        let outward = p - centroid;
        if n.dot(&outward) < 0.0 {
            *n = -*n;
        }
    }
}

fn pca_normal(
    point: &Point3<f64>,
    kdtree: &GridTree,
    positions: &[Point3<f64>],
    k: usize,
) -> Vector3<f64> {
    let query = [point.x, point.y, point.z];
    let neighbors = kdtree.nearest_n::<SquaredEuclidean>(&query, k);
    if neighbors.len() < 3 {
        return Vector3::z();
    }

    #[allow(clippy::cast_possible_truncation)]
    let neighbor_positions: Vec<Point3<f64>> = neighbors
        .iter()
        .map(|n| positions[n.item as usize])
        .collect();

    let centroid: Vector3<f64> = neighbor_positions.iter().map(|p| p.coords).sum();
    #[allow(clippy::cast_precision_loss)]
    let centroid = centroid / neighbor_positions.len() as f64;

    let mut cov = Matrix3::zeros();
    for p in &neighbor_positions {
        let diff = p.coords - centroid;
        cov += diff * diff.transpose();
    }

    let eigen = SymmetricEigen::new(cov);
    let eigenvalues = eigen.eigenvalues;
    let min_idx = if eigenvalues[0] <= eigenvalues[1] && eigenvalues[0] <= eigenvalues[2] {
        0
    } else if eigenvalues[1] <= eigenvalues[2] {
        1
    } else {
        2
    };

    let col = eigen.eigenvectors.column(min_idx);
    let normal = Vector3::new(col[0], col[1], col[2]);
    let norm = normal.norm();
    if norm > 1e-10 {
        normal / norm
    } else {
        Vector3::z()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation
)]
mod tests {
    use super::*;

    fn planar_cloud(n: usize) -> Vec<Point3<f64>> {
        (0..n)
            .flat_map(|i| {
                (0..n).map(move |j| {
                    // Tiny z jitter keeps the KD-tree axes distinct.
                    let z = (i * n + j) as f64 * 1e-4;
                    Point3::new(i as f64, j as f64, z)
                })
            })
            .collect()
    }

    fn sphere_cloud(n: usize, radius: f64) -> Vec<Point3<f64>> {
        use std::f64::consts::PI;
        let mut positions = Vec::with_capacity(n * n);
        for i in 0..n {
            let theta = PI * i as f64 / (n - 1) as f64;
            for j in 0..n {
                let phi = 2.0 * PI * j as f64 / n as f64;
                positions.push(Point3::new(
                    radius * theta.sin() * phi.cos(),
                    radius * theta.sin() * phi.sin(),
                    radius * theta.cos(),
                ));
            }
        }
        positions
    }

    #[test]
    fn planar_normals_point_along_z() {
        let positions = planar_cloud(10);
        let normals = estimate_normals(&positions, 10).unwrap();
        for n in &normals {
            assert!(n.z.abs() > 0.9, "expected near-z normal, got {n:?}");
        }
    }

    #[test]
    fn sphere_normals_orient_outward() {
        let positions = sphere_cloud(12, 50.0);
        let mut normals = estimate_normals(&positions, 10).unwrap();
        orient_outward(&positions, &mut normals);

        let mut outward = 0;
        let mut total = 0;
        for (p, n) in positions.iter().zip(&normals) {
            let r = p.coords.norm();
            if r < 1.0 {
                continue;
            }
            total += 1;
            if n.dot(&(p.coords / r)) > 0.0 {
                outward += 1;
            }
        }
        assert!(f64::from(outward) / f64::from(total) >= 0.8);
    }

    #[test]
    fn too_few_points_rejected() {
        let positions = vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)];
        assert!(matches!(
            estimate_normals(&positions, 10),
            Err(ReconstructError::InvalidInput { .. })
        ));
    }
}
