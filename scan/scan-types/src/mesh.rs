//! Triangulated scan surface.

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::bounds::Aabb;
use crate::quality::QualityMetrics;

/// A mesh vertex with normal, confidence, and optional texture coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MeshVertex {
    /// Position in millimeters.
    pub position: Point3<f64>,
    /// Unit surface normal.
    pub normal: Vector3<f64>,
    /// Confidence inherited from the samples that produced this vertex.
    pub confidence: f32,
    /// Optional UV coordinates for downstream texturing.
    pub uv: Option<[f32; 2]>,
}

impl MeshVertex {
    /// Creates a vertex with a zero normal and full confidence.
    #[must_use]
    pub fn new(position: Point3<f64>) -> Self {
        Self {
            position,
            normal: Vector3::zeros(),
            confidence: 1.0,
            uv: None,
        }
    }

    /// Creates a vertex with position and normal.
    #[must_use]
    pub fn with_normal(position: Point3<f64>, normal: Vector3<f64>) -> Self {
        Self {
            position,
            normal,
            confidence: 1.0,
            uv: None,
        }
    }
}

/// An indexed triangle mesh produced by the reconstruction pipeline.
///
/// Faces use counter-clockwise winding viewed from outside the scalp surface.
/// A mesh is immutable once emitted to consumers; a re-scan supersedes it
/// rather than mutating it.
///
/// # Example
///
/// ```
/// use scan_types::{MeshVertex, ScanMesh};
/// use nalgebra::Point3;
///
/// let mut mesh = ScanMesh::new();
/// mesh.vertices.push(MeshVertex::new(Point3::new(0.0, 0.0, 0.0)));
/// mesh.vertices.push(MeshVertex::new(Point3::new(1.0, 0.0, 0.0)));
/// mesh.vertices.push(MeshVertex::new(Point3::new(0.0, 1.0, 0.0)));
/// mesh.faces.push([0, 1, 2]);
///
/// assert_eq!(mesh.face_count(), 1);
/// assert!(mesh.area() > 0.0);
/// ```
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScanMesh {
    /// Vertex data.
    pub vertices: Vec<MeshVertex>,
    /// Triangles as CCW vertex-index triples.
    pub faces: Vec<[u32; 3]>,
    /// The quality metrics that certified this mesh, once validated.
    pub metrics: Option<QualityMetrics>,
}

impl ScanMesh {
    /// Creates an empty mesh.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
            metrics: None,
        }
    }

    /// Creates a mesh with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(vertex_count: usize, face_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            faces: Vec::with_capacity(face_count),
            metrics: None,
        }
    }

    /// Returns the number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Returns the number of faces.
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Returns true if the mesh has no vertices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Returns the bounding box, or `None` if empty.
    #[must_use]
    pub fn bounds(&self) -> Option<Aabb> {
        let positions: Vec<Point3<f64>> = self.vertices.iter().map(|v| v.position).collect();
        Aabb::from_points(&positions)
    }

    /// Returns the (unnormalized) normal of a face.
    #[must_use]
    pub fn face_normal(&self, face: &[u32; 3]) -> Vector3<f64> {
        let a = self.vertices[face[0] as usize].position;
        let b = self.vertices[face[1] as usize].position;
        let c = self.vertices[face[2] as usize].position;
        (b - a).cross(&(c - a))
    }

    /// Returns the total surface area in mm².
    #[must_use]
    pub fn area(&self) -> f64 {
        self.faces
            .iter()
            .map(|f| self.face_normal(f).norm() * 0.5)
            .sum()
    }

    /// Recomputes per-vertex normals as area-weighted averages of incident
    /// face normals.
    pub fn compute_vertex_normals(&mut self) {
        let mut accum = vec![Vector3::zeros(); self.vertices.len()];
        for face in &self.faces {
            let n = self.face_normal(face);
            for &i in face {
                accum[i as usize] += n;
            }
        }
        for (vertex, n) in self.vertices.iter_mut().zip(accum) {
            let len = n.norm();
            if len > f64::EPSILON {
                vertex.normal = n / len;
            }
        }
    }

    /// Mean alignment of face normals across shared edges, clamped to
    /// `[0, 1]`. Returns 1.0 for meshes without interior edges.
    #[must_use]
    pub fn normal_consistency(&self) -> f64 {
        use std::collections::HashMap;

        let mut edge_faces: HashMap<(u32, u32), Vec<usize>> = HashMap::new();
        for (fi, f) in self.faces.iter().enumerate() {
            for e in 0..3 {
                let a = f[e];
                let b = f[(e + 1) % 3];
                edge_faces.entry((a.min(b), a.max(b))).or_default().push(fi);
            }
        }

        let normals: Vec<Vector3<f64>> = self
            .faces
            .iter()
            .map(|f| {
                let n = self.face_normal(f);
                let len = n.norm();
                if len > f64::EPSILON {
                    n / len
                } else {
                    n
                }
            })
            .collect();

        let mut sum = 0.0;
        let mut pairs = 0_usize;
        for faces in edge_faces.values() {
            if let [a, b] = faces.as_slice() {
                sum += normals[*a].dot(&normals[*b]).max(0.0);
                pairs += 1;
            }
        }
        if pairs == 0 {
            return 1.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let mean = sum / pairs as f64;
        mean
    }

    /// Returns the length of the shortest edge, or `None` for an empty mesh.
    #[must_use]
    pub fn min_edge_length(&self) -> Option<f64> {
        let mut min: Option<f64> = None;
        for face in &self.faces {
            for i in 0..3 {
                let a = self.vertices[face[i] as usize].position;
                let b = self.vertices[face[(i + 1) % 3] as usize].position;
                let len = (b - a).norm();
                min = Some(min.map_or(len, |m: f64| m.min(len)));
            }
        }
        min
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_triangle() -> ScanMesh {
        let mut mesh = ScanMesh::new();
        mesh.vertices.push(MeshVertex::new(Point3::origin()));
        mesh.vertices
            .push(MeshVertex::new(Point3::new(1.0, 0.0, 0.0)));
        mesh.vertices
            .push(MeshVertex::new(Point3::new(0.0, 1.0, 0.0)));
        mesh.faces.push([0, 1, 2]);
        mesh
    }

    #[test]
    fn area_of_unit_triangle() {
        let mesh = unit_triangle();
        assert_relative_eq!(mesh.area(), 0.5);
    }

    #[test]
    fn vertex_normals_point_up() {
        let mut mesh = unit_triangle();
        mesh.compute_vertex_normals();
        for v in &mesh.vertices {
            assert_relative_eq!(v.normal.z, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn min_edge_length() {
        let mesh = unit_triangle();
        assert_relative_eq!(mesh.min_edge_length().unwrap(), 1.0);
        assert!(ScanMesh::new().min_edge_length().is_none());
    }

    #[test]
    fn bounds() {
        let mesh = unit_triangle();
        let b = mesh.bounds().unwrap();
        assert_relative_eq!(b.max.x, 1.0);
        assert_relative_eq!(b.max.y, 1.0);
    }
}
