//! Axis-aligned bounding boxes.

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box in world space (millimeters).
///
/// # Example
///
/// ```
/// use scan_types::Aabb;
/// use nalgebra::Point3;
///
/// let aabb = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 4.0, 6.0));
/// assert!((aabb.extent().y - 4.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Aabb {
    /// Minimum corner.
    pub min: Point3<f64>,
    /// Maximum corner.
    pub max: Point3<f64>,
}

impl Aabb {
    /// Creates a bounding box from min/max corners.
    #[must_use]
    pub const fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self { min, max }
    }

    /// Computes the bounding box of a set of points.
    ///
    /// Returns `None` if the slice is empty.
    #[must_use]
    pub fn from_points(points: &[Point3<f64>]) -> Option<Self> {
        let first = points.first()?;
        let mut min = *first;
        let mut max = *first;
        for p in &points[1..] {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            max.z = max.z.max(p.z);
        }
        Some(Self { min, max })
    }

    /// Returns the center of the box.
    #[must_use]
    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    /// Returns the size of the box along each axis.
    #[must_use]
    pub fn extent(&self) -> Vector3<f64> {
        self.max - self.min
    }

    /// Returns the length of the longest axis.
    #[must_use]
    pub fn max_extent(&self) -> f64 {
        let e = self.extent();
        e.x.max(e.y).max(e.z)
    }

    /// Checks whether a point lies inside the box (inclusive).
    #[must_use]
    pub fn contains(&self, p: &Point3<f64>) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Returns a cube centered on this box, sized to the longest axis plus
    /// a relative padding factor.
    ///
    /// The octree in `scan-reconstruct` requires cubic root cells so leaf
    /// cells stay cubic at every depth.
    #[must_use]
    pub fn cubified(&self, padding: f64) -> Self {
        let center = self.center();
        let half = self.max_extent() * 0.5 * (1.0 + padding);
        let h = Vector3::new(half, half, half);
        Self {
            min: center - h,
            max: center + h,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn from_points_empty() {
        assert!(Aabb::from_points(&[]).is_none());
    }

    #[test]
    fn from_points_bounds() {
        let pts = vec![Point3::new(1.0, -2.0, 3.0), Point3::new(-1.0, 2.0, 0.0)];
        let aabb = Aabb::from_points(&pts).unwrap();
        assert_relative_eq!(aabb.min.x, -1.0);
        assert_relative_eq!(aabb.max.y, 2.0);
        assert_relative_eq!(aabb.max.z, 3.0);
    }

    #[test]
    fn cubified_is_cubic_and_contains_original() {
        let aabb = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 4.0, 2.0));
        let cube = aabb.cubified(0.1);
        let e = cube.extent();
        assert_relative_eq!(e.x, e.y);
        assert_relative_eq!(e.y, e.z);
        assert!(cube.contains(&aabb.min));
        assert!(cube.contains(&aabb.max));
    }

    #[test]
    fn contains_edge_cases() {
        let aabb = Aabb::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        assert!(aabb.contains(&Point3::new(1.0, 1.0, 1.0)));
        assert!(!aabb.contains(&Point3::new(1.0, 1.0, 1.001)));
    }
}
