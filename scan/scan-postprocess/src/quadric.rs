//! Quadric error metric.
//!
//! A quadric accumulates squared point-to-plane distances for the planes of
//! a vertex's incident faces. Edge collapse uses it to cost candidate merges
//! and place the merged vertex.

use nalgebra::{Point3, Vector3};

/// Symmetric 4x4 error matrix stored as its upper triangle.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Quadric {
    // [a b c d]
    // [  e f g]
    // [    h i]
    // [      j]
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
    g: f64,
    h: f64,
    i: f64,
    j: f64,
}

impl Quadric {
    /// Builds the quadric of the plane through `point` with unit `normal`.
    pub fn from_plane(normal: Vector3<f64>, point: Point3<f64>) -> Self {
        let (a, b, c) = (normal.x, normal.y, normal.z);
        let d = -normal.dot(&point.coords);
        Self {
            a: a * a,
            b: a * b,
            c: a * c,
            d: a * d,
            e: b * b,
            f: b * c,
            g: b * d,
            h: c * c,
            i: c * d,
            j: d * d,
        }
    }

    /// Accumulates another quadric.
    pub fn add(&mut self, other: &Self) {
        self.a += other.a;
        self.b += other.b;
        self.c += other.c;
        self.d += other.d;
        self.e += other.e;
        self.f += other.f;
        self.g += other.g;
        self.h += other.h;
        self.i += other.i;
        self.j += other.j;
    }

    /// Sum of squared distances from `p` to every accumulated plane.
    pub fn evaluate(&self, p: Point3<f64>) -> f64 {
        let (x, y, z) = (p.x, p.y, p.z);
        // v^T Q v with v = [x, y, z, 1]
        x.mul_add(
            x.mul_add(self.a, 2.0 * y.mul_add(self.b, z.mul_add(self.c, self.d))),
            y.mul_add(
                y.mul_add(self.e, 2.0 * z.mul_add(self.f, self.g)),
                z.mul_add(z.mul_add(self.h, 2.0 * self.i), self.j),
            ),
        )
    }

    /// Point minimizing the error, or `None` when the 3x3 block is singular
    /// (planar or linear neighborhoods).
    pub fn optimal_point(&self) -> Option<Point3<f64>> {
        // Solve:
        // [a b c] [x]   [-d]
        // [b e f] [y] = [-g]
        // [c f h] [z]   [-i]
        let det = self.a.mul_add(
            self.f.mul_add(-self.f, self.e * self.h),
            self.b.mul_add(
                self.c.mul_add(self.f, -self.b * self.h),
                self.c * self.e.mul_add(-self.c, self.b * self.f),
            ),
        );
        if det.abs() < 1e-10 {
            return None;
        }
        let inv_det = 1.0 / det;

        let m00 = self.f.mul_add(-self.f, self.e * self.h) * inv_det;
        let m01 = self.c.mul_add(self.f, -self.b * self.h) * inv_det;
        let m02 = self.c.mul_add(-self.e, self.b * self.f) * inv_det;
        let m11 = self.c.mul_add(-self.c, self.a * self.h) * inv_det;
        let m12 = self.b.mul_add(self.c, -self.a * self.f) * inv_det;
        let m22 = self.b.mul_add(-self.b, self.a * self.e) * inv_det;

        let x = m00.mul_add(-self.d, m01.mul_add(-self.g, m02 * -self.i));
        let y = m01.mul_add(-self.d, m11.mul_add(-self.g, m12 * -self.i));
        let z = m02.mul_add(-self.d, m12.mul_add(-self.g, m22 * -self.i));
        Some(Point3::new(x, y, z))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn zero_quadric_has_zero_error() {
        let q = Quadric::default();
        approx::assert_relative_eq!(q.evaluate(Point3::new(1.0, 2.0, 3.0)), 0.0);
    }

    #[test]
    fn plane_distance_is_squared() {
        let q = Quadric::from_plane(Vector3::z(), Point3::origin());
        approx::assert_relative_eq!(q.evaluate(Point3::new(4.0, -2.0, 0.0)), 0.0, epsilon = 1e-10);
        approx::assert_relative_eq!(q.evaluate(Point3::new(0.0, 0.0, 3.0)), 9.0, epsilon = 1e-9);
    }

    #[test]
    fn optimal_point_at_plane_intersection() {
        let mut q = Quadric::from_plane(Vector3::x(), Point3::new(1.0, 0.0, 0.0));
        q.add(&Quadric::from_plane(Vector3::y(), Point3::new(0.0, 2.0, 0.0)));
        q.add(&Quadric::from_plane(Vector3::z(), Point3::new(0.0, 0.0, 3.0)));
        let p = q.optimal_point().unwrap();
        approx::assert_relative_eq!(p, Point3::new(1.0, 2.0, 3.0), epsilon = 1e-8);
    }

    #[test]
    fn planar_quadric_is_singular() {
        let q = Quadric::from_plane(Vector3::z(), Point3::origin());
        assert!(q.optimal_point().is_none());
    }
}
