//! Vertex-cache index reordering.
//!
//! Greedy triangle reordering after Forsyth's linear-speed vertex cache
//! optimization, followed by a first-use vertex remap. Geometry is
//! untouched; only index and vertex ordering change.

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]

use scan_types::ScanMesh;
use tracing::debug;

/// Modeled post-transform cache depth.
const CACHE_SIZE: usize = 32;
/// Score decay for cache positions past the first three.
const CACHE_DECAY_POWER: f64 = 1.5;
/// Score for the three most recent vertices (shared by one triangle).
const LAST_TRI_SCORE: f64 = 0.75;
/// Valence boost scale and power.
const VALENCE_BOOST_SCALE: f64 = 2.0;
const VALENCE_BOOST_POWER: f64 = 0.5;

/// Statistics from one reordering run.
#[derive(Debug, Clone, Copy)]
pub struct ReorderReport {
    /// Average cache miss ratio before, misses per triangle.
    pub acmr_before: f64,
    /// Average cache miss ratio after.
    pub acmr_after: f64,
    /// Cache depth the optimization targeted.
    pub cache_size: usize,
}

impl std::fmt::Display for ReorderReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ACMR {:.2} → {:.2} (cache {})",
            self.acmr_before, self.acmr_after, self.cache_size
        )
    }
}

/// Reorders faces and vertices in place for vertex-cache locality.
pub fn reorder_for_cache(mesh: &mut ScanMesh) -> ReorderReport {
    let acmr_before = acmr(&mesh.faces, CACHE_SIZE);
    if mesh.face_count() == 0 {
        return ReorderReport {
            acmr_before,
            acmr_after: acmr_before,
            cache_size: CACHE_SIZE,
        };
    }

    let order = optimize_triangle_order(&mesh.faces, mesh.vertex_count());
    let faces: Vec<[u32; 3]> = order.iter().map(|&fi| mesh.faces[fi]).collect();
    mesh.faces = faces;
    remap_vertices_by_first_use(mesh);

    let acmr_after = acmr(&mesh.faces, CACHE_SIZE);
    let report = ReorderReport {
        acmr_before,
        acmr_after,
        cache_size: CACHE_SIZE,
    };
    debug!(%report, "cache reorder finished");
    report
}

/// FIFO cache miss ratio, misses per triangle.
fn acmr(faces: &[[u32; 3]], cache_size: usize) -> f64 {
    if faces.is_empty() {
        return 0.0;
    }
    let mut cache: Vec<u32> = Vec::with_capacity(cache_size);
    let mut misses = 0usize;
    for face in faces {
        for &v in face {
            if !cache.contains(&v) {
                misses += 1;
                if cache.len() == cache_size {
                    cache.remove(0);
                }
                cache.push(v);
            }
        }
    }
    misses as f64 / faces.len() as f64
}

struct VertexState {
    /// Cache position, or `None` when not resident.
    cache_pos: Option<usize>,
    /// Triangles not yet emitted that use this vertex.
    remaining: Vec<u32>,
}

fn vertex_score(state: &VertexState) -> f64 {
    if state.remaining.is_empty() {
        return -1.0;
    }
    let mut score = match state.cache_pos {
        None => 0.0,
        Some(p) if p < 3 => LAST_TRI_SCORE,
        Some(p) => {
            let scaled = (CACHE_SIZE - p) as f64 / (CACHE_SIZE - 3) as f64;
            scaled.powf(CACHE_DECAY_POWER)
        }
    };
    score += VALENCE_BOOST_SCALE * (state.remaining.len() as f64).powf(-VALENCE_BOOST_POWER);
    score
}

#[allow(clippy::too_many_lines)]
fn optimize_triangle_order(faces: &[[u32; 3]], vertex_count: usize) -> Vec<usize> {
    let mut states: Vec<VertexState> = (0..vertex_count)
        .map(|_| VertexState {
            cache_pos: None,
            remaining: Vec::new(),
        })
        .collect();
    for (fi, face) in faces.iter().enumerate() {
        for &v in face {
            states[v as usize].remaining.push(fi as u32);
        }
    }

    let mut emitted = vec![false; faces.len()];
    let mut scores: Vec<f64> = states.iter().map(vertex_score).collect();
    let mut cache: Vec<u32> = Vec::with_capacity(CACHE_SIZE + 3);
    let mut order = Vec::with_capacity(faces.len());
    let mut scan_from = 0usize;

    for _ in 0..faces.len() {
        // Best candidate among triangles touching the cache; fall back to the
        // first unemitted triangle when the cache offers none.
        let mut best: Option<(usize, f64)> = None;
        for &cv in &cache {
            for &fi in &states[cv as usize].remaining {
                let fi = fi as usize;
                if emitted[fi] {
                    continue;
                }
                let score: f64 = faces[fi].iter().map(|&v| scores[v as usize]).sum();
                if best.map_or(true, |(_, b)| score > b) {
                    best = Some((fi, score));
                }
            }
        }
        let next = match best {
            Some((fi, _)) => fi,
            None => {
                while emitted[scan_from] {
                    scan_from += 1;
                }
                scan_from
            }
        };

        emitted[next] = true;
        order.push(next);
        for &v in &faces[next] {
            let state = &mut states[v as usize];
            state.remaining.retain(|&fi| fi as usize != next);
            // Move to front of the modeled cache.
            cache.retain(|&c| c != v);
            cache.insert(0, v);
        }
        while cache.len() > CACHE_SIZE {
            let evicted = cache.pop().unwrap_or(0);
            states[evicted as usize].cache_pos = None;
            scores[evicted as usize] = vertex_score(&states[evicted as usize]);
        }
        for (pos, &cv) in cache.iter().enumerate() {
            states[cv as usize].cache_pos = Some(pos);
            scores[cv as usize] = vertex_score(&states[cv as usize]);
        }
    }
    order
}

/// Renumbers vertices in the order the reordered faces first reference them.
fn remap_vertices_by_first_use(mesh: &mut ScanMesh) {
    let n = mesh.vertex_count();
    let mut remap: Vec<Option<u32>> = vec![None; n];
    let mut next = 0u32;
    for face in &mut mesh.faces {
        for v in face.iter_mut() {
            let slot = &mut remap[*v as usize];
            let new = match *slot {
                Some(new) => new,
                None => {
                    let new = next;
                    *slot = Some(new);
                    next += 1;
                    new
                }
            };
            *v = new;
        }
    }

    let old_vertices = std::mem::take(&mut mesh.vertices);
    let mut new_vertices = vec![None; n];
    let mut unreferenced = next as usize;
    for (old, vertex) in old_vertices.into_iter().enumerate() {
        match remap[old] {
            Some(new) => new_vertices[new as usize] = Some(vertex),
            None => {
                // Unreferenced vertices go to the tail, order preserved.
                new_vertices[unreferenced] = Some(vertex);
                unreferenced += 1;
            }
        }
    }
    mesh.vertices = new_vertices.into_iter().flatten().collect();
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use nalgebra::Point3;
    use scan_types::MeshVertex;

    fn grid_mesh(n: usize) -> ScanMesh {
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
        mesh
    }

    /// Shuffle faces deterministically to destroy locality.
    fn scrambled_grid(n: usize) -> ScanMesh {
        let mut mesh = grid_mesh(n);
        let len = mesh.faces.len();
        let mut scrambled = Vec::with_capacity(len);
        let stride = 17;
        let mut k = 0;
        for _ in 0..len {
            scrambled.push(mesh.faces[k]);
            k = (k + stride) % len;
        }
        mesh.faces = scrambled;
        mesh
    }

    #[test]
    fn geometry_is_preserved() {
        let mesh = scrambled_grid(12);
        let mut reordered = mesh.clone();
        reorder_for_cache(&mut reordered);

        assert_eq!(reordered.vertex_count(), mesh.vertex_count());
        assert_eq!(reordered.face_count(), mesh.face_count());
        approx::assert_relative_eq!(reordered.area(), mesh.area(), epsilon = 1e-9);

        // Every original triangle survives as a position triple.
        let key = |m: &ScanMesh, f: &[u32; 3]| {
            let mut ps: Vec<[i64; 3]> = f
                .iter()
                .map(|&v| {
                    let p = m.vertices[v as usize].position;
                    [
                        (p.x * 1e6) as i64,
                        (p.y * 1e6) as i64,
                        (p.z * 1e6) as i64,
                    ]
                })
                .collect();
            ps.sort_unstable();
            ps
        };
        let mut before: Vec<_> = mesh.faces.iter().map(|f| key(&mesh, f)).collect();
        let mut after: Vec<_> = reordered.faces.iter().map(|f| key(&reordered, f)).collect();
        before.sort_unstable();
        after.sort_unstable();
        assert_eq!(before, after);
    }

    #[test]
    fn acmr_improves_on_scrambled_input() {
        let mut mesh = scrambled_grid(24);
        let report = reorder_for_cache(&mut mesh);
        assert!(report.acmr_after <= report.acmr_before);
        // A well-ordered grid approaches one miss per triangle or better.
        assert!(report.acmr_after < 1.5);
    }

    #[test]
    fn empty_mesh_is_noop() {
        let mut mesh = ScanMesh::new();
        let report = reorder_for_cache(&mut mesh);
        approx::assert_relative_eq!(report.acmr_before, report.acmr_after);
    }
}
