//! Point samples, frames, and pose transforms.

use nalgebra::{Isometry3, Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::bounds::Aabb;
use crate::time::Timestamp;

/// The sensing modality that produced a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SourceModality {
    /// Direct depth-ranging measurement (LiDAR-class sensor).
    Range,
    /// Triangulated from cross-frame visual feature matches.
    VisualFeature,
}

/// A single immutable 3D sample.
///
/// Positions are in the frame-local sensor coordinate system until the
/// accumulator transforms them into world space.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PointSample {
    /// 3D position in millimeters.
    pub position: Point3<f64>,
    /// Sensor confidence in `[0, 1]`.
    pub confidence: f32,
    /// Which sensor produced this sample.
    pub modality: SourceModality,
    /// Capture time.
    pub timestamp: Timestamp,
}

impl PointSample {
    /// Creates a new sample. Confidence is clamped to `[0, 1]`.
    #[must_use]
    pub fn new(
        position: Point3<f64>,
        confidence: f32,
        modality: SourceModality,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            position,
            confidence: confidence.clamp(0.0, 1.0),
            modality,
            timestamp,
        }
    }
}

/// A rigid pose transform (sensor frame → world frame).
///
/// Thin wrapper over [`Isometry3`] so collaborators never hand raw matrices
/// across the pipeline boundary.
///
/// # Example
///
/// ```
/// use scan_types::PoseTransform;
/// use nalgebra::{Point3, Vector3};
///
/// let pose = PoseTransform::from_translation(Vector3::new(5.0, 0.0, 0.0));
/// let p = pose.apply_point(&Point3::origin());
/// assert!((p.x - 5.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoseTransform {
    /// The underlying isometry.
    pub isometry: Isometry3<f64>,
}

impl PoseTransform {
    /// The identity transform.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            isometry: Isometry3::identity(),
        }
    }

    /// Creates a pure translation.
    #[must_use]
    pub fn from_translation(translation: Vector3<f64>) -> Self {
        Self {
            isometry: Isometry3::translation(translation.x, translation.y, translation.z),
        }
    }

    /// Wraps an existing isometry.
    #[must_use]
    pub const fn from_isometry(isometry: Isometry3<f64>) -> Self {
        Self { isometry }
    }

    /// Transforms a point into world space.
    #[must_use]
    pub fn apply_point(&self, p: &Point3<f64>) -> Point3<f64> {
        self.isometry.transform_point(p)
    }

    /// Transforms a direction (rotation only).
    #[must_use]
    pub fn apply_vector(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.isometry.rotation * v
    }

    /// Returns the translation component.
    #[must_use]
    pub fn translation(&self) -> Vector3<f64> {
        self.isometry.translation.vector
    }

    /// Composes two transforms (`self` after `other`).
    #[must_use]
    pub fn compose(&self, other: &Self) -> Self {
        Self {
            isometry: self.isometry * other.isometry,
        }
    }
}

impl Default for PoseTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// One sensor callback worth of samples plus the pose active at capture time.
///
/// Owned by the accumulator once ingested; the accumulator applies the pose
/// to move samples into world space.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PointCloudFrame {
    /// Samples in sensor-local coordinates, in capture order.
    pub samples: Vec<PointSample>,
    /// Sensor-to-world pose at capture time.
    pub pose: PoseTransform,
    /// Frame capture time.
    pub timestamp: Timestamp,
}

impl PointCloudFrame {
    /// Creates a new frame.
    #[must_use]
    pub const fn new(samples: Vec<PointSample>, pose: PoseTransform, timestamp: Timestamp) -> Self {
        Self {
            samples,
            pose,
            timestamp,
        }
    }

    /// Returns the number of samples in the frame.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if the frame has no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// A consistent point-in-time copy of the accumulated world-space cloud.
///
/// Snapshots are immutable; the quality monitor and the reconstructor never
/// see live accumulator state.
#[derive(Debug, Clone)]
pub struct CloudSnapshot {
    /// Deduplicated world-space samples.
    pub samples: Vec<PointSample>,
    /// Number of samples that came from the range sensor.
    pub range_count: usize,
    /// Number of samples that came from visual features.
    pub feature_count: usize,
    /// When the snapshot was taken.
    pub taken_at: Timestamp,
}

impl CloudSnapshot {
    /// Creates a snapshot from already world-space samples.
    #[must_use]
    pub const fn new(
        samples: Vec<PointSample>,
        range_count: usize,
        feature_count: usize,
        taken_at: Timestamp,
    ) -> Self {
        Self {
            samples,
            range_count,
            feature_count,
            taken_at,
        }
    }

    /// Returns the number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns the world-space bounding box, or `None` if empty.
    #[must_use]
    pub fn bounds(&self) -> Option<Aabb> {
        let positions: Vec<Point3<f64>> = self.samples.iter().map(|s| s.position).collect();
        Aabb::from_points(&positions)
    }

    /// Returns just the positions.
    #[must_use]
    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.samples.iter().map(|s| s.position).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sample_clamps_confidence() {
        let s = PointSample::new(
            Point3::origin(),
            1.5,
            SourceModality::Range,
            Timestamp::zero(),
        );
        assert_relative_eq!(s.confidence, 1.0);
    }

    #[test]
    fn pose_roundtrip() {
        let pose = PoseTransform::from_translation(Vector3::new(1.0, 2.0, 3.0));
        let p = pose.apply_point(&Point3::new(1.0, 1.0, 1.0));
        assert_relative_eq!(p.x, 2.0);
        assert_relative_eq!(p.y, 3.0);
        assert_relative_eq!(p.z, 4.0);
    }

    #[test]
    fn pose_vector_ignores_translation() {
        let pose = PoseTransform::from_translation(Vector3::new(10.0, 0.0, 0.0));
        let v = pose.apply_vector(&Vector3::z());
        assert_relative_eq!(v.z, 1.0);
        assert_relative_eq!(v.x, 0.0);
    }

    #[test]
    fn snapshot_counts_and_bounds() {
        let snapshot = CloudSnapshot {
            samples: vec![
                PointSample::new(
                    Point3::new(0.0, 0.0, 0.0),
                    1.0,
                    SourceModality::Range,
                    Timestamp::zero(),
                ),
                PointSample::new(
                    Point3::new(4.0, 2.0, 1.0),
                    0.7,
                    SourceModality::VisualFeature,
                    Timestamp::zero(),
                ),
            ],
            range_count: 1,
            feature_count: 1,
            taken_at: Timestamp::zero(),
        };
        let bounds = snapshot.bounds().unwrap();
        assert_relative_eq!(bounds.max.x, 4.0);
        assert_eq!(snapshot.len(), 2);
    }
}
