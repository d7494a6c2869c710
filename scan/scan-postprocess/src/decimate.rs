//! Feature-preserving mesh decimation.
//!
//! Edge collapse driven by quadric error metrics. Pinned vertices (detected
//! scalp features) never move: edges between two pinned vertices are never
//! collapsed, and collapsing a free vertex into a pinned one keeps the
//! pinned position.

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use hashbrown::{HashMap, HashSet};
use nalgebra::Point3;
use scan_types::{MeshVertex, ScanMesh};
use tracing::debug;

use crate::params::DecimateParams;
use crate::quadric::Quadric;

/// Statistics from one decimation run.
#[derive(Debug, Clone, Copy)]
pub struct DecimateReport {
    /// Triangles before decimation.
    pub original_triangles: usize,
    /// Triangles after decimation.
    pub final_triangles: usize,
    /// Edge collapses performed.
    pub collapses_performed: usize,
    /// Candidates rejected (pinned, boundary, or non-manifold).
    pub collapses_rejected: usize,
}

impl std::fmt::Display for DecimateReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pct = if self.original_triangles == 0 {
            0.0
        } else {
            (self.original_triangles - self.final_triangles) as f64
                / self.original_triangles as f64
                * 100.0
        };
        write!(
            f,
            "{} → {} triangles ({} collapses, {} rejected, {pct:.1}% reduced)",
            self.original_triangles,
            self.final_triangles,
            self.collapses_performed,
            self.collapses_rejected
        )
    }
}

/// An edge collapse candidate.
#[derive(Debug, Clone)]
struct EdgeCollapse {
    v1: u32,
    v2: u32,
    cost: f64,
    optimal_pos: Point3<f64>,
}

impl PartialEq for EdgeCollapse {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost
    }
}

impl Eq for EdgeCollapse {}

impl PartialOrd for EdgeCollapse {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EdgeCollapse {
    // Reversed so the BinaryHeap pops the cheapest collapse first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
    }
}

/// Decimates the mesh toward the configured triangle target.
///
/// `pinned` vertices are kept exactly in place. Boundary edges are never
/// collapsed so open scalp-patch rims keep their silhouette.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn decimate_mesh(
    mesh: &ScanMesh,
    pinned: &HashSet<u32>,
    params: &DecimateParams,
) -> (ScanMesh, DecimateReport) {
    let original_triangles = mesh.face_count();
    let target = params
        .target_triangles
        .unwrap_or_else(|| ((original_triangles as f64) * params.target_ratio).ceil() as usize);

    if original_triangles == 0 || original_triangles <= target {
        let report = DecimateReport {
            original_triangles,
            final_triangles: original_triangles,
            collapses_performed: 0,
            collapses_rejected: 0,
        };
        return (mesh.clone(), report);
    }

    let mut vertices: Vec<Option<MeshVertex>> = mesh.vertices.iter().copied().map(Some).collect();
    let mut faces: Vec<Option<[u32; 3]>> = mesh.faces.iter().copied().map(Some).collect();
    let mut active_faces = original_triangles;

    let boundary_vertices = find_boundary_vertices(&mesh.faces);
    let mut quadrics = compute_vertex_quadrics(mesh);
    let mut heap = build_collapse_queue(mesh, &quadrics, &boundary_vertices, pinned);
    let mut vertex_remap: HashMap<u32, u32> = HashMap::new();

    let mut collapses_performed = 0;
    let mut collapses_rejected = 0;

    while active_faces > target {
        let Some(collapse) = heap.pop() else {
            break;
        };

        let v1 = resolve(collapse.v1, &vertex_remap);
        let v2 = resolve(collapse.v2, &vertex_remap);
        if v1 == v2 || vertices[v1 as usize].is_none() || vertices[v2 as usize].is_none() {
            continue;
        }
        if pinned.contains(&v1) && pinned.contains(&v2) {
            collapses_rejected += 1;
            continue;
        }
        if boundary_vertices.contains(&v1) || boundary_vertices.contains(&v2) {
            collapses_rejected += 1;
            continue;
        }

        // Merge the free vertex into the pinned one; between two free
        // vertices keep v1 as the survivor at the optimal position.
        let (keep, drop) = if pinned.contains(&v2) {
            (v2, v1)
        } else {
            (v1, v2)
        };
        let merged_pos = if pinned.contains(&keep) {
            // Position already exact; None only if the slot was cleared,
            // which the liveness check above rules out.
            match vertices[keep as usize] {
                Some(v) => v.position,
                None => continue,
            }
        } else {
            collapse.optimal_pos
        };

        let dropped_confidence = vertices[drop as usize].map(|d| d.confidence);
        if let Some(v) = vertices[keep as usize].as_mut() {
            v.position = merged_pos;
            if let Some(c) = dropped_confidence {
                v.confidence = v.confidence.max(c);
            }
        }

        let dropped_quadric = quadrics[drop as usize];
        quadrics[keep as usize].add(&dropped_quadric);
        vertices[drop as usize] = None;
        vertex_remap.insert(drop, keep);

        for face_opt in &mut faces {
            if let Some(face) = face_opt {
                for idx in face.iter_mut() {
                    *idx = resolve(*idx, &vertex_remap);
                }
                if face[0] == face[1] || face[1] == face[2] || face[0] == face[2] {
                    *face_opt = None;
                    active_faces -= 1;
                }
            }
        }

        collapses_performed += 1;
        requeue_vertex_edges(keep, &faces, &vertices, &quadrics, pinned, &mut heap);
    }

    let out = compact_mesh(&vertices, &faces);
    let report = DecimateReport {
        original_triangles,
        final_triangles: out.face_count(),
        collapses_performed,
        collapses_rejected,
    };
    debug!(%report, "decimation finished");
    (out, report)
}

const fn normalize_edge(v1: u32, v2: u32) -> (u32, u32) {
    if v1 < v2 {
        (v1, v2)
    } else {
        (v2, v1)
    }
}

fn resolve(mut v: u32, remap: &HashMap<u32, u32>) -> u32 {
    while let Some(&next) = remap.get(&v) {
        v = next;
    }
    v
}

/// Vertices on an edge shared by exactly one face.
fn find_boundary_vertices(faces: &[[u32; 3]]) -> HashSet<u32> {
    let mut edge_faces: HashMap<(u32, u32), usize> = HashMap::new();
    for face in faces {
        for i in 0..3 {
            let edge = normalize_edge(face[i], face[(i + 1) % 3]);
            *edge_faces.entry(edge).or_insert(0) += 1;
        }
    }
    let mut boundary = HashSet::new();
    for ((a, b), count) in edge_faces {
        if count == 1 {
            boundary.insert(a);
            boundary.insert(b);
        }
    }
    boundary
}

fn compute_vertex_quadrics(mesh: &ScanMesh) -> Vec<Quadric> {
    let mut quadrics = vec![Quadric::default(); mesh.vertex_count()];
    for face in &mesh.faces {
        let normal = mesh.face_normal(face);
        let len = normal.norm();
        if len < 1e-10 {
            continue;
        }
        let anchor = mesh.vertices[face[0] as usize].position;
        let q = Quadric::from_plane(normal / len, anchor);
        for &vi in face {
            quadrics[vi as usize].add(&q);
        }
    }
    quadrics
}

fn candidate(
    v1: u32,
    v2: u32,
    p1: Point3<f64>,
    p2: Point3<f64>,
    quadrics: &[Quadric],
    pinned: &HashSet<u32>,
) -> Option<EdgeCollapse> {
    if pinned.contains(&v1) && pinned.contains(&v2) {
        return None;
    }
    let mut combined = quadrics[v1 as usize];
    combined.add(&quadrics[v2 as usize]);

    let optimal_pos = if pinned.contains(&v1) {
        p1
    } else if pinned.contains(&v2) {
        p2
    } else {
        combined
            .optimal_point()
            .unwrap_or_else(|| nalgebra::center(&p1, &p2))
    };
    let cost = combined.evaluate(optimal_pos);
    Some(EdgeCollapse {
        v1,
        v2,
        cost,
        optimal_pos,
    })
}

fn build_collapse_queue(
    mesh: &ScanMesh,
    quadrics: &[Quadric],
    boundary_vertices: &HashSet<u32>,
    pinned: &HashSet<u32>,
) -> BinaryHeap<EdgeCollapse> {
    let mut heap = BinaryHeap::new();
    let mut seen = HashSet::new();
    for face in &mesh.faces {
        for i in 0..3 {
            let v1 = face[i];
            let v2 = face[(i + 1) % 3];
            let edge = normalize_edge(v1, v2);
            if !seen.insert(edge) {
                continue;
            }
            if boundary_vertices.contains(&v1) || boundary_vertices.contains(&v2) {
                continue;
            }
            let p1 = mesh.vertices[v1 as usize].position;
            let p2 = mesh.vertices[v2 as usize].position;
            if let Some(collapse) = candidate(v1, v2, p1, p2, quadrics, pinned) {
                heap.push(collapse);
            }
        }
    }
    heap
}

fn requeue_vertex_edges(
    v: u32,
    faces: &[Option<[u32; 3]>],
    vertices: &[Option<MeshVertex>],
    quadrics: &[Quadric],
    pinned: &HashSet<u32>,
    heap: &mut BinaryHeap<EdgeCollapse>,
) {
    let mut neighbors = HashSet::new();
    for face in faces.iter().flatten() {
        if face.contains(&v) {
            for &w in face {
                if w != v {
                    neighbors.insert(w);
                }
            }
        }
    }
    let Some(pv) = vertices[v as usize] else {
        return;
    };
    for w in neighbors {
        let Some(pw) = vertices[w as usize] else {
            continue;
        };
        if let Some(collapse) = candidate(v, w, pv.position, pw.position, quadrics, pinned) {
            heap.push(collapse);
        }
    }
}

fn compact_mesh(vertices: &[Option<MeshVertex>], faces: &[Option<[u32; 3]>]) -> ScanMesh {
    let mut out = ScanMesh::new();
    let mut remap: Vec<Option<u32>> = vec![None; vertices.len()];
    for (i, v) in vertices.iter().enumerate() {
        if let Some(v) = v {
            remap[i] = Some(out.vertices.len() as u32);
            out.vertices.push(*v);
        }
    }
    for face in faces.iter().flatten() {
        if let (Some(a), Some(b), Some(c)) = (
            remap[face[0] as usize],
            remap[face[1] as usize],
            remap[face[2] as usize],
        ) {
            out.faces.push([a, b, c]);
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// A dense fan disc: a center ring plus two concentric rings, closed so
    /// interior edges exist to collapse.
    fn disc_mesh(rings: usize, segments: usize) -> ScanMesh {
        let mut mesh = ScanMesh::new();
        mesh.vertices
            .push(MeshVertex::new(Point3::new(0.0, 0.0, 0.0)));
        for r in 1..=rings {
            for s in 0..segments {
                let angle = std::f64::consts::TAU * s as f64 / segments as f64;
                let radius = r as f64 * 10.0;
                mesh.vertices.push(MeshVertex::new(Point3::new(
                    radius * angle.cos(),
                    radius * angle.sin(),
                    0.0,
                )));
            }
        }
        let ring = |r: usize, s: usize| -> u32 { (1 + (r - 1) * segments + s % segments) as u32 };
        for s in 0..segments {
            mesh.faces.push([0, ring(1, s), ring(1, s + 1)]);
        }
        for r in 1..rings {
            for s in 0..segments {
                mesh.faces
                    .push([ring(r, s), ring(r + 1, s), ring(r + 1, s + 1)]);
                mesh.faces
                    .push([ring(r, s), ring(r + 1, s + 1), ring(r, s + 1)]);
            }
        }
        mesh
    }

    #[test]
    fn reaches_triangle_target() {
        let mesh = disc_mesh(4, 16);
        let original = mesh.face_count();
        let params = DecimateParams::with_target_ratio(0.5);
        let (out, report) = decimate_mesh(&mesh, &HashSet::new(), &params);
        assert!(out.face_count() < original);
        assert_eq!(report.final_triangles, out.face_count());
        assert!(report.collapses_performed > 0);
    }

    #[test]
    fn pinned_vertices_do_not_move() {
        let mesh = disc_mesh(4, 16);
        let pinned: HashSet<u32> = [0_u32].into_iter().collect();
        let center = mesh.vertices[0].position;
        let params = DecimateParams::with_target_ratio(0.4);
        let (out, _) = decimate_mesh(&mesh, &pinned, &params);
        let survived = out
            .vertices
            .iter()
            .any(|v| (v.position - center).norm() < 1e-12);
        assert!(survived);
    }

    #[test]
    fn merged_vertices_carry_max_confidence() {
        // Whichever vertex holds the highest confidence, the collapse chain
        // carries it forward, so the survivors' maximum never drops.
        let mut mesh = disc_mesh(4, 16);
        for v in &mut mesh.vertices {
            v.confidence = 0.4;
        }
        mesh.vertices[0].confidence = 0.9;
        let params = DecimateParams::with_target_ratio(0.25);
        let (out, report) = decimate_mesh(&mesh, &HashSet::new(), &params);
        assert!(report.collapses_performed > 0);
        let max_confidence = out
            .vertices
            .iter()
            .map(|v| v.confidence)
            .fold(0.0_f32, f32::max);
        approx::assert_relative_eq!(max_confidence, 0.9);
    }

    #[test]
    fn already_at_target_is_noop() {
        let mesh = disc_mesh(2, 8);
        let params = DecimateParams::with_target_triangles(mesh.face_count());
        let (out, report) = decimate_mesh(&mesh, &HashSet::new(), &params);
        assert_eq!(out.face_count(), mesh.face_count());
        assert_eq!(report.collapses_performed, 0);
    }

    #[test]
    fn empty_mesh_is_noop() {
        let mesh = ScanMesh::new();
        let (out, report) = decimate_mesh(&mesh, &HashSet::new(), &DecimateParams::default());
        assert_eq!(out.face_count(), 0);
        assert_eq!(report.original_triangles, 0);
    }
}
