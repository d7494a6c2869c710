//! Screened-Poisson indicator solve over the octree leaf graph.
//!
//! The oriented normal field is splatted to occupied leaves, its graph
//! divergence forms the right-hand side, and a screened graph Laplacian is
//! solved with conjugate gradients. The result is a smooth scalar field that
//! crosses its iso-value at the sampled surface.

use kiddo::SquaredEuclidean;
use nalgebra::{Point3, Vector3};
use tracing::debug;

use crate::error::{ReconstructError, ReconstructResult};
use crate::octree::Octree;
use crate::params::ReconstructParams;
use crate::GridTree;

/// The solved indicator field, sampled at leaf centers.
///
/// Values are higher than the iso-value inside the scanned surface and lower
/// outside; empty leaves carry the smoothly continued field.
#[derive(Debug, Clone)]
pub struct IndicatorField {
    /// Centers of the leaves carrying field values.
    pub centers: Vec<Point3<f64>>,
    /// Cell edge length per leaf.
    pub sizes: Vec<f64>,
    /// Solved field value per leaf.
    pub values: Vec<f64>,
    /// Iso-value of the reconstructed surface.
    pub iso_value: f64,
    /// Conjugate-gradient iterations consumed.
    pub iterations: usize,
    /// Final relative residual.
    pub residual: f64,
}

impl IndicatorField {
    /// Interpolates the field at an arbitrary point by inverse-distance
    /// weighting over the `k` nearest occupied leaves.
    #[must_use]
    pub fn sample(&self, kdtree: &GridTree, p: &Point3<f64>, k: usize) -> f64 {
        let neighbors = kdtree.nearest_n::<SquaredEuclidean>(&[p.x, p.y, p.z], k);
        if neighbors.is_empty() {
            return self.iso_value;
        }
        let mut weight_sum = 0.0;
        let mut value_sum = 0.0;
        for n in &neighbors {
            #[allow(clippy::cast_possible_truncation)]
            let idx = n.item as usize;
            // Soften by the leaf size so the field stays smooth inside cells.
            let w = 1.0 / (n.distance + self.sizes[idx] * self.sizes[idx] * 0.25);
            weight_sum += w;
            value_sum += w * self.values[idx];
        }
        value_sum / weight_sum
    }

    /// KD-tree over the field's leaf centers, for repeated sampling.
    #[must_use]
    pub fn center_tree(&self) -> GridTree {
        let mut kdtree = GridTree::new();
        for (i, c) in self.centers.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let idx = i as u64;
            kdtree.add(&[c.x, c.y, c.z], idx);
        }
        kdtree
    }
}

/// Solves for the indicator field.
///
/// `point_weight` is the screening weight from the sensor profile: higher
/// values pin the field harder to the iso-level at sampled leaves.
///
/// # Errors
///
/// [`ReconstructError::OctreeBuildFailed`] if the octree has no occupied
/// leaves, [`ReconstructError::InvalidInput`] on solver breakdown.
pub fn solve_indicator(
    octree: &Octree,
    normals: &[Vector3<f64>],
    confidences: &[f32],
    point_weight: f64,
    params: &ReconstructParams,
) -> ReconstructResult<IndicatorField> {
    // Every leaf joins the system; empty leaves carry the continued field
    // so the surface has signed values on both sides.
    let leaves = octree.leaves();
    if octree.occupied_leaves().is_empty() {
        return Err(ReconstructError::OctreeBuildFailed {
            reason: "no occupied leaves".to_string(),
        });
    }

    let n = leaves.len();
    let centers: Vec<Point3<f64>> = leaves.iter().map(|&l| octree.node(l).bounds.center()).collect();
    let sizes: Vec<f64> = leaves
        .iter()
        .map(|&l| octree.node(l).bounds.extent().x)
        .collect();

    // Confidence-weighted normal field per leaf.
    let mut field = vec![Vector3::zeros(); n];
    let mut mass = vec![0.0_f64; n];
    for (rank, &leaf) in leaves.iter().enumerate() {
        for &s in &octree.node(leaf).samples {
            let c = f64::from(confidences[s]);
            field[rank] += normals[s] * c;
            mass[rank] += c;
        }
        if mass[rank] > 0.0 {
            field[rank] /= mass[rank];
        }
    }

    // Leaf adjacency by center proximity, filtered to touching cells.
    let mut kdtree = GridTree::new();
    for (i, c) in centers.iter().enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        let idx = i as u64;
        kdtree.add(&[c.x, c.y, c.z], idx);
    }
    let neighbor_query = 27.min(n);
    let mut adjacency: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
    for i in 0..n {
        let c = centers[i];
        for found in kdtree.nearest_n::<SquaredEuclidean>(&[c.x, c.y, c.z], neighbor_query) {
            #[allow(clippy::cast_possible_truncation)]
            let j = found.item as usize;
            if j == i {
                continue;
            }
            let dist = found.distance.sqrt();
            // Touching cells have centers within half the summed edge
            // lengths along every axis; the diagonal bound below admits
            // edge and corner contacts too, which only adds smoothing.
            let reach = (sizes[i] + sizes[j]) * 0.5 * 1.75;
            if dist <= reach && dist > 1e-12 {
                adjacency[i].push((j, 1.0 / dist));
            }
        }
    }

    // Right-hand side: graph divergence of the splatted field plus the
    // screening pull toward the surface level at sampled leaves.
    let surface_level = 0.5;
    let mut diag = vec![0.0_f64; n];
    let mut rhs = vec![0.0_f64; n];
    for i in 0..n {
        let mut div = 0.0;
        for &(j, w) in &adjacency[i] {
            let u = (centers[j] - centers[i]).normalize();
            div += w * 0.5 * (field[i] + field[j]).dot(&u);
            diag[i] += w;
        }
        let screen = point_weight * mass[i];
        diag[i] += screen;
        rhs[i] = div + screen * surface_level;
    }

    let (values, iterations, residual) = conjugate_gradient(
        &adjacency,
        &diag,
        &rhs,
        params.cg_max_iterations,
        params.cg_tolerance,
    )?;

    // Iso-value: confidence-weighted mean field value over sampled leaves.
    let mut iso_num = 0.0;
    let mut iso_den = 0.0;
    for i in 0..n {
        iso_num += values[i] * mass[i];
        iso_den += mass[i];
    }
    let iso_value = if iso_den > 0.0 {
        iso_num / iso_den
    } else {
        surface_level
    };

    debug!(
        leaves = n,
        iterations, residual, iso_value, "indicator field solved"
    );

    Ok(IndicatorField {
        centers,
        sizes,
        values,
        iso_value,
        iterations,
        residual,
    })
}

/// Matrix-free conjugate gradients for `(D - W) x = b` with `D` the diagonal
/// and `W` the adjacency weights.
fn conjugate_gradient(
    adjacency: &[Vec<(usize, f64)>],
    diag: &[f64],
    rhs: &[f64],
    max_iterations: usize,
    tolerance: f64,
) -> ReconstructResult<(Vec<f64>, usize, f64)> {
    let n = rhs.len();
    let matvec = |x: &[f64], out: &mut [f64]| {
        for i in 0..n {
            let mut v = diag[i] * x[i];
            for &(j, w) in &adjacency[i] {
                v -= w * x[j];
            }
            out[i] = v;
        }
    };

    let mut x = vec![0.0_f64; n];
    let mut r = rhs.to_vec();
    let mut p = r.clone();
    let mut ap = vec![0.0_f64; n];

    let rhs_norm = rhs.iter().map(|v| v * v).sum::<f64>().sqrt();
    if rhs_norm <= f64::EPSILON {
        return Ok((x, 0, 0.0));
    }

    let mut rsold: f64 = r.iter().map(|v| v * v).sum();
    let mut iterations = 0;
    for _ in 0..max_iterations {
        matvec(&p, &mut ap);
        let pap: f64 = p.iter().zip(&ap).map(|(a, b)| a * b).sum();
        if pap.abs() <= f64::MIN_POSITIVE {
            return Err(ReconstructError::InvalidInput {
                reason: "conjugate gradient breakdown".to_string(),
            });
        }
        let alpha = rsold / pap;
        for i in 0..n {
            x[i] += alpha * p[i];
            r[i] -= alpha * ap[i];
        }
        iterations += 1;
        let rsnew: f64 = r.iter().map(|v| v * v).sum();
        if rsnew.sqrt() / rhs_norm < tolerance {
            rsold = rsnew;
            break;
        }
        let beta = rsnew / rsold;
        for i in 0..n {
            p[i] = r[i] + beta * p[i];
        }
        rsold = rsnew;
    }

    Ok((x, iterations, rsold.sqrt() / rhs_norm))
}
