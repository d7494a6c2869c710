//! Isosurface extraction from the indicator field.
//!
//! Surface-nets style: leaves near the surface are virtually refined to the
//! finest octree level so the extraction grid conforms everywhere, one vertex
//! is placed per sign-changing cell, and each sign-changing grid edge emits a
//! quad over the four cells sharing it. Vertices are keyed by global cell
//! coordinates, which welds the mesh across leaf boundaries.

use hashbrown::HashMap;
use kiddo::SquaredEuclidean;
use nalgebra::{Point3, Vector3};
use scan_types::{MeshVertex, ScanMesh};
use tracing::debug;

use crate::octree::Octree;
use crate::poisson::IndicatorField;
use crate::GridTree;

/// Statistics from one extraction run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractionStats {
    /// Cells that crossed the iso-surface.
    pub active_cells: usize,
    /// Triangles rejected for having an edge below the minimum length.
    pub rejected_triangles: usize,
}

struct GridContext<'a> {
    field: &'a IndicatorField,
    center_tree: GridTree,
    sample_tree: GridTree,
    confidences: &'a [f32],
    origin: Point3<f64>,
    h: f64,
    iso: f64,
    field_k: usize,
    corner_cache: HashMap<(i64, i64, i64), f64>,
}

impl GridContext<'_> {
    fn corner_world(&self, g: (i64, i64, i64)) -> Point3<f64> {
        #[allow(clippy::cast_precision_loss)]
        Point3::new(
            self.origin.x + g.0 as f64 * self.h,
            self.origin.y + g.1 as f64 * self.h,
            self.origin.z + g.2 as f64 * self.h,
        )
    }

    fn corner_value(&mut self, g: (i64, i64, i64)) -> f64 {
        if let Some(&v) = self.corner_cache.get(&g) {
            return v;
        }
        let p = self.corner_world(g);
        let v = self.field.sample(&self.center_tree, &p, self.field_k);
        self.corner_cache.insert(g, v);
        v
    }

    fn inside(&mut self, g: (i64, i64, i64)) -> bool {
        self.corner_value(g) > self.iso
    }

    /// Surface-nets vertex for a cell: mean of the iso crossings on the
    /// cell's twelve edges.
    fn cell_vertex(&mut self, cell: (i64, i64, i64)) -> Option<MeshVertex> {
        let corners = cell_corners(cell);
        let values: Vec<f64> = corners.iter().map(|&g| self.corner_value(g)).collect();
        let inside_mask = values.iter().filter(|&&v| v > self.iso).count();
        if inside_mask == 0 || inside_mask == 8 {
            return None;
        }

        let mut sum = Vector3::zeros();
        let mut crossings = 0.0;
        for &(a, b) in &CELL_EDGES {
            let (va, vb) = (values[a], values[b]);
            if (va > self.iso) == (vb > self.iso) {
                continue;
            }
            let t = (self.iso - va) / (vb - va);
            let pa = self.corner_world(corners[a]);
            let pb = self.corner_world(corners[b]);
            sum += pa.coords + (pb.coords - pa.coords) * t;
            crossings += 1.0;
        }
        if crossings == 0.0 {
            return None;
        }
        let position = Point3::from(sum / crossings);

        let confidence = self
            .sample_tree
            .nearest_n::<SquaredEuclidean>(&[position.x, position.y, position.z], 1)
            .first()
            .map_or(1.0, |n| {
                #[allow(clippy::cast_possible_truncation)]
                let idx = n.item as usize;
                self.confidences[idx]
            });

        let mut vertex = MeshVertex::new(position);
        vertex.confidence = confidence;
        Some(vertex)
    }
}

/// Corner offsets of a cell, x-fastest.
fn cell_corners(cell: (i64, i64, i64)) -> [(i64, i64, i64); 8] {
    let (i, j, k) = cell;
    [
        (i, j, k),
        (i + 1, j, k),
        (i, j + 1, k),
        (i + 1, j + 1, k),
        (i, j, k + 1),
        (i + 1, j, k + 1),
        (i, j + 1, k + 1),
        (i + 1, j + 1, k + 1),
    ]
}

/// The 12 cell edges as corner-index pairs into [`cell_corners`].
const CELL_EDGES: [(usize, usize); 12] = [
    (0, 1),
    (2, 3),
    (4, 5),
    (6, 7),
    (0, 2),
    (1, 3),
    (4, 6),
    (5, 7),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

/// Extracts the iso-surface mesh.
///
/// Triangles with any edge shorter than `min_edge_length` are rejected during
/// emission. Vertex normals are left zeroed; the caller recomputes them from
/// the final face set.
pub fn extract_surface(
    octree: &Octree,
    field: &IndicatorField,
    positions: &[Point3<f64>],
    confidences: &[f32],
    min_edge_length: f64,
    field_k: usize,
) -> (ScanMesh, ExtractionStats) {
    let root = octree.root_bounds();
    let finest_cells = 1_i64 << octree.max_depth();
    #[allow(clippy::cast_precision_loss)]
    let h = root.max_extent() / finest_cells as f64;

    let mut sample_tree = GridTree::new();
    for (i, p) in positions.iter().enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        let idx = i as u64;
        sample_tree.add(&[p.x, p.y, p.z], idx);
    }

    let mut ctx = GridContext {
        field,
        center_tree: field.center_tree(),
        sample_tree,
        confidences,
        origin: root.min,
        h,
        iso: field.iso_value,
        field_k,
        corner_cache: HashMap::new(),
    };

    // Pass 1: find sign-changing cells and place their vertices.
    let mut cell_map: HashMap<(i64, i64, i64), u32> = HashMap::new();
    let mut mesh = ScanMesh::new();
    let mut active: Vec<(i64, i64, i64)> = Vec::new();

    for leaf_idx in octree.leaves() {
        let node = octree.node(leaf_idx);
        let span = 1_i64 << (octree.max_depth() - node.depth);
        let base = grid_index(&node.bounds.min, &root.min, h);

        // Empty leaves whose corners sit firmly on one side cannot host the
        // surface; the field is near-linear at leaf scale.
        if node.samples.is_empty() && span > 1 {
            let all_inside = cell_corners_at_span(base, span)
                .iter()
                .all(|&g| ctx.inside(g));
            let all_outside = cell_corners_at_span(base, span)
                .iter()
                .all(|&g| !ctx.inside(g));
            if all_inside || all_outside {
                continue;
            }
        }

        for di in 0..span {
            for dj in 0..span {
                for dk in 0..span {
                    let cell = (base.0 + di, base.1 + dj, base.2 + dk);
                    if cell_map.contains_key(&cell) {
                        continue;
                    }
                    if let Some(vertex) = ctx.cell_vertex(cell) {
                        #[allow(clippy::cast_possible_truncation)]
                        let idx = mesh.vertices.len() as u32;
                        mesh.vertices.push(vertex);
                        cell_map.insert(cell, idx);
                        active.push(cell);
                    }
                }
            }
        }
    }

    // Pass 2: one quad per sign-changing grid edge. Each active cell scans
    // the three edges leaving its minimal corner; any crossing edge has all
    // four sharing cells sign-changing, so no edge is missed.
    let mut stats = ExtractionStats {
        active_cells: active.len(),
        rejected_triangles: 0,
    };
    for &(i, j, k) in &active {
        let p0 = (i, j, k);
        let v0_inside = ctx.inside(p0);
        for axis in 0..3 {
            let p1 = step(p0, axis, 1);
            let v1_inside = ctx.inside(p1);
            if v0_inside == v1_inside {
                continue;
            }
            let quad = edge_quad((i, j, k), axis);
            let Some(indices) = lookup_quad(&quad, &cell_map) else {
                continue;
            };
            // Winding: the quad is CCW viewed from the +axis side; flip it
            // when the inside of the surface lies on that side.
            let [a, b, c, d] = if v1_inside {
                [indices[3], indices[2], indices[1], indices[0]]
            } else {
                indices
            };
            emit_triangle(&mut mesh, [a, b, c], min_edge_length, &mut stats);
            emit_triangle(&mut mesh, [a, c, d], min_edge_length, &mut stats);
        }
    }

    debug!(
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        active_cells = stats.active_cells,
        rejected = stats.rejected_triangles,
        "surface extracted"
    );
    (mesh, stats)
}

fn grid_index(p: &Point3<f64>, origin: &Point3<f64>, h: f64) -> (i64, i64, i64) {
    #[allow(clippy::cast_possible_truncation)]
    (
        ((p.x - origin.x) / h).round() as i64,
        ((p.y - origin.y) / h).round() as i64,
        ((p.z - origin.z) / h).round() as i64,
    )
}

fn cell_corners_at_span(base: (i64, i64, i64), span: i64) -> [(i64, i64, i64); 8] {
    let (i, j, k) = base;
    [
        (i, j, k),
        (i + span, j, k),
        (i, j + span, k),
        (i + span, j + span, k),
        (i, j, k + span),
        (i + span, j, k + span),
        (i, j + span, k + span),
        (i + span, j + span, k + span),
    ]
}

fn step(p: (i64, i64, i64), axis: usize, by: i64) -> (i64, i64, i64) {
    match axis {
        0 => (p.0 + by, p.1, p.2),
        1 => (p.0, p.1 + by, p.2),
        _ => (p.0, p.1, p.2 + by),
    }
}

/// The four cells sharing the grid edge leaving `p` along `axis`, in cyclic
/// order that is CCW viewed from the positive end of the axis.
fn edge_quad(p: (i64, i64, i64), axis: usize) -> [(i64, i64, i64); 4] {
    let (i, j, k) = p;
    match axis {
        0 => [
            (i, j - 1, k - 1),
            (i, j, k - 1),
            (i, j, k),
            (i, j - 1, k),
        ],
        1 => [
            (i - 1, j, k - 1),
            (i - 1, j, k),
            (i, j, k),
            (i, j, k - 1),
        ],
        _ => [
            (i - 1, j - 1, k),
            (i, j - 1, k),
            (i, j, k),
            (i - 1, j, k),
        ],
    }
}

fn lookup_quad(
    quad: &[(i64, i64, i64); 4],
    cell_map: &HashMap<(i64, i64, i64), u32>,
) -> Option<[u32; 4]> {
    Some([
        *cell_map.get(&quad[0])?,
        *cell_map.get(&quad[1])?,
        *cell_map.get(&quad[2])?,
        *cell_map.get(&quad[3])?,
    ])
}

fn emit_triangle(
    mesh: &mut ScanMesh,
    face: [u32; 3],
    min_edge_length: f64,
    stats: &mut ExtractionStats,
) {
    if face[0] == face[1] || face[1] == face[2] || face[0] == face[2] {
        return;
    }
    for e in 0..3 {
        let a = mesh.vertices[face[e] as usize].position;
        let b = mesh.vertices[face[(e + 1) % 3] as usize].position;
        if (b - a).norm() < min_edge_length {
            stats.rejected_triangles += 1;
            return;
        }
    }
    mesh.faces.push(face);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_precision_loss)]
mod tests {
    use super::*;
    use crate::normals::{estimate_normals, orient_outward};
    use crate::params::ReconstructParams;
    use crate::poisson::solve_indicator;
    use scan_types::Aabb;

    fn sphere_cloud(n: usize, radius: f64) -> Vec<Point3<f64>> {
        use std::f64::consts::PI;
        let mut positions = Vec::new();
        for i in 0..n {
            let theta = PI * (i as f64 + 0.5) / n as f64;
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

    fn extract_sphere(min_edge: f64) -> (ScanMesh, ExtractionStats, Vec<Point3<f64>>) {
        let positions = sphere_cloud(24, 50.0);
        let mut normals = estimate_normals(&positions, 12).unwrap();
        orient_outward(&positions, &mut normals);
        let confidences = vec![0.9_f32; positions.len()];
        let bounds = Aabb::from_points(&positions).unwrap().cubified(0.2);
        let octree = Octree::build(&positions, bounds, 8, 5).unwrap();
        let params = ReconstructParams::default();
        let field =
            solve_indicator(&octree, &normals, &confidences, 4.0, &params).unwrap();
        let (mesh, stats) =
            extract_surface(&octree, &field, &positions, &confidences, min_edge, params.field_k);
        (mesh, stats, positions)
    }

    #[test]
    fn sphere_produces_closed_surface() {
        let (mut mesh, stats, _) = extract_sphere(0.01);
        assert!(stats.active_cells > 0);
        assert!(mesh.face_count() > 100, "only {} faces", mesh.face_count());
        mesh.compute_vertex_normals();

        // Vertices should sit near the sampled radius.
        let mut near = 0;
        for v in &mesh.vertices {
            let r = v.position.coords.norm();
            if (r - 50.0).abs() < 8.0 {
                near += 1;
            }
        }
        assert!(
            near * 10 >= mesh.vertex_count() * 8,
            "{near}/{} vertices near the sphere",
            mesh.vertex_count()
        );
    }

    #[test]
    fn normals_face_outward() {
        let (mut mesh, _, _) = extract_sphere(0.01);
        mesh.compute_vertex_normals();
        let mut outward = 0;
        let mut total = 0;
        for v in &mesh.vertices {
            let r = v.position.coords.norm();
            if r < 1.0 || v.normal.norm() < 0.5 {
                continue;
            }
            total += 1;
            if v.normal.dot(&(v.position.coords / r)) > 0.0 {
                outward += 1;
            }
        }
        assert!(total > 0);
        assert!(
            outward * 10 >= total * 7,
            "{outward}/{total} normals outward"
        );
    }

    #[test]
    fn min_edge_rejection_counts() {
        let (_, permissive, _) = extract_sphere(0.01);
        let (mesh, strict, _) = extract_sphere(1000.0);
        assert_eq!(mesh.face_count(), 0);
        assert!(strict.rejected_triangles > permissive.rejected_triangles);
    }

    #[test]
    fn vertices_inherit_sample_confidence() {
        let (mesh, _, _) = extract_sphere(0.01);
        for v in mesh.vertices.iter().take(50) {
            approx::assert_relative_eq!(v.confidence, 0.9);
        }
    }

    #[test]
    fn surface_is_mostly_watertight() {
        // Count boundary edges (used by exactly one face). A closed surface
        // nets mesh over a sphere should have none, modulo rejected slivers.
        let (mesh, _, _) = extract_sphere(0.01);
        let mut edge_use: HashMap<(u32, u32), u32> = HashMap::new();
        for f in &mesh.faces {
            for e in 0..3 {
                let a = f[e];
                let b = f[(e + 1) % 3];
                let key = (a.min(b), a.max(b));
                *edge_use.entry(key).or_insert(0) += 1;
            }
        }
        let boundary = edge_use.values().filter(|&&c| c == 1).count();
        assert!(
            boundary * 20 <= edge_use.len(),
            "{boundary} boundary edges of {}",
            edge_use.len()
        );
    }
}
