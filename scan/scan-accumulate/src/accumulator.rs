//! The point-cloud accumulator.
//!
//! Samples arrive per frame in sensor coordinates; the accumulator moves them
//! into world space with the frame pose (composed with the calibration
//! correction), drops everything below the calibrated confidence floor, and
//! merges samples falling into the same voxel of a spatial hash grid so the
//! cloud stays bounded under arbitrarily long scans.
//!
//! Merging is a confidence-weighted centroid per voxel, which makes re-ingest
//! of an identical frame idempotent: weights double but positions and voxel
//! occupancy do not change.

use hashbrown::HashMap;
use nalgebra::Vector3;
use scan_types::{
    CloudSnapshot, PointCloudFrame, PointSample, PoseTransform, SensorProfile, SourceModality,
    Timestamp,
};
use tracing::debug;

use crate::error::{AccumulateError, AccumulateResult};

/// Accumulation parameters.
///
/// # Example
///
/// ```
/// use scan_accumulate::AccumulatorParams;
/// use scan_types::SensorProfile;
///
/// let params = AccumulatorParams::from_profile(&SensorProfile::lidar_rated());
/// assert!(params.merge_radius > 0.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AccumulatorParams {
    /// Samples below this confidence are discarded at ingest.
    pub confidence_floor: f32,
    /// Voxel edge length (mm); samples within the same voxel are merged.
    pub merge_radius: f64,
}

impl AccumulatorParams {
    /// Derives parameters from a sensor profile.
    #[must_use]
    pub const fn from_profile(profile: &SensorProfile) -> Self {
        Self {
            confidence_floor: profile.confidence_floor,
            merge_radius: profile.merge_radius,
        }
    }

    /// Overrides the confidence floor.
    #[must_use]
    pub const fn with_confidence_floor(mut self, floor: f32) -> Self {
        self.confidence_floor = floor;
        self
    }

    /// Validates the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`AccumulateError::InvalidParameter`] for non-positive radii
    /// or an out-of-range confidence floor.
    pub fn validate(&self) -> AccumulateResult<()> {
        if self.merge_radius <= 0.0 {
            return Err(AccumulateError::InvalidParameter {
                reason: "merge radius must be positive".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.confidence_floor) {
            return Err(AccumulateError::InvalidParameter {
                reason: format!("confidence floor {} not in [0, 1]", self.confidence_floor),
            });
        }
        Ok(())
    }
}

/// Per-voxel merge state.
#[derive(Debug, Clone)]
struct VoxelBin {
    /// Confidence-weighted position sum.
    weighted_sum: Vector3<f64>,
    /// Sum of confidence weights.
    weight: f64,
    /// Highest contributing confidence.
    best_confidence: f32,
    /// Modality of the highest-confidence contributor.
    modality: SourceModality,
    /// Most recent contribution time.
    latest: Timestamp,
}

/// Statistics for one `ingest` call.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestReport {
    /// Samples accepted into the grid.
    pub accepted: usize,
    /// Samples discarded below the confidence floor.
    pub rejected_low_confidence: usize,
    /// Accepted samples that landed in an already occupied voxel.
    pub merged: usize,
    /// Voxels created by this frame.
    pub new_voxels: usize,
}

impl std::fmt::Display for IngestReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ingest: {} accepted ({} merged, {} new voxels), {} below floor",
            self.accepted, self.merged, self.new_voxels, self.rejected_low_confidence
        )
    }
}

/// The running, deduplicated world-space point set.
///
/// Mutated only by the frame-ingestion task; every reader gets an immutable
/// [`CloudSnapshot`].
#[derive(Debug)]
pub struct Accumulator {
    params: AccumulatorParams,
    /// Calibration correction applied after the frame pose.
    calibration: PoseTransform,
    voxels: HashMap<(i64, i64, i64), VoxelBin>,
    range_count: usize,
    feature_count: usize,
}

impl Accumulator {
    /// Creates an accumulator.
    ///
    /// # Errors
    ///
    /// Returns an error if `params` fail validation.
    pub fn new(params: AccumulatorParams, calibration: PoseTransform) -> AccumulateResult<Self> {
        params.validate()?;
        Ok(Self {
            params,
            calibration,
            voxels: HashMap::new(),
            range_count: 0,
            feature_count: 0,
        })
    }

    /// Returns the number of occupied voxels (deduplicated cloud size).
    #[must_use]
    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    /// Returns true if nothing has been accumulated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    /// Clears all accumulated state at scan start.
    pub fn reset(&mut self) {
        self.voxels.clear();
        self.range_count = 0;
        self.feature_count = 0;
    }

    fn voxel_key(&self, p: &nalgebra::Point3<f64>) -> (i64, i64, i64) {
        let r = self.params.merge_radius;
        #[allow(clippy::cast_possible_truncation)]
        (
            (p.x / r).floor() as i64,
            (p.y / r).floor() as i64,
            (p.z / r).floor() as i64,
        )
    }

    /// Ingests one frame: world transform, confidence floor, voxel merge.
    pub fn ingest(&mut self, frame: &PointCloudFrame) -> IngestReport {
        let world = self.calibration.compose(&frame.pose);
        let mut report = IngestReport::default();

        for sample in &frame.samples {
            if sample.confidence < self.params.confidence_floor {
                report.rejected_low_confidence += 1;
                continue;
            }
            report.accepted += 1;

            let position = world.apply_point(&sample.position);
            let key = self.voxel_key(&position);
            let weight = f64::from(sample.confidence);

            match self.voxels.get_mut(&key) {
                Some(bin) => {
                    bin.weighted_sum += position.coords * weight;
                    bin.weight += weight;
                    if sample.confidence > bin.best_confidence {
                        bin.best_confidence = sample.confidence;
                        bin.modality = sample.modality;
                    }
                    if sample.timestamp > bin.latest {
                        bin.latest = sample.timestamp;
                    }
                    report.merged += 1;
                }
                None => {
                    self.voxels.insert(
                        key,
                        VoxelBin {
                            weighted_sum: position.coords * weight,
                            weight,
                            best_confidence: sample.confidence,
                            modality: sample.modality,
                            latest: sample.timestamp,
                        },
                    );
                    match sample.modality {
                        SourceModality::Range => self.range_count += 1,
                        SourceModality::VisualFeature => self.feature_count += 1,
                    }
                    report.new_voxels += 1;
                }
            }
        }

        debug!(
            frame_samples = frame.len(),
            accepted = report.accepted,
            cloud_size = self.voxels.len(),
            "frame ingested"
        );
        report
    }

    /// Returns a consistent point-in-time copy of the cloud.
    #[must_use]
    pub fn snapshot(&self, now: Timestamp) -> CloudSnapshot {
        let mut samples = Vec::with_capacity(self.voxels.len());
        for bin in self.voxels.values() {
            let centroid = bin.weighted_sum / bin.weight;
            samples.push(PointSample::new(
                centroid.into(),
                bin.best_confidence,
                bin.modality,
                bin.latest,
            ));
        }
        CloudSnapshot {
            samples,
            range_count: self.range_count,
            feature_count: self.feature_count,
            taken_at: now,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn params() -> AccumulatorParams {
        AccumulatorParams {
            confidence_floor: 0.5,
            merge_radius: 0.5,
        }
    }

    fn frame_of(points: &[(f64, f64, f64, f32)]) -> PointCloudFrame {
        let samples = points
            .iter()
            .map(|&(x, y, z, c)| {
                PointSample::new(
                    Point3::new(x, y, z),
                    c,
                    SourceModality::Range,
                    Timestamp::from_millis(10),
                )
            })
            .collect();
        PointCloudFrame::new(samples, PoseTransform::identity(), Timestamp::from_millis(10))
    }

    #[test]
    fn rejects_invalid_params() {
        let bad = AccumulatorParams {
            confidence_floor: 0.5,
            merge_radius: 0.0,
        };
        assert!(Accumulator::new(bad, PoseTransform::identity()).is_err());
    }

    #[test]
    fn confidence_floor_filters() {
        let mut acc = Accumulator::new(params(), PoseTransform::identity()).unwrap();
        let report = acc.ingest(&frame_of(&[
            (0.0, 0.0, 0.0, 0.9),
            (10.0, 0.0, 0.0, 0.3), // below floor
        ]));
        assert_eq!(report.accepted, 1);
        assert_eq!(report.rejected_low_confidence, 1);
        assert_eq!(acc.len(), 1);
    }

    #[test]
    fn ingest_never_shrinks_the_cloud() {
        let mut acc = Accumulator::new(params(), PoseTransform::identity()).unwrap();
        acc.ingest(&frame_of(&[(0.0, 0.0, 0.0, 0.9), (5.0, 0.0, 0.0, 0.9)]));
        let before = acc.len();
        acc.ingest(&frame_of(&[(9.0, 9.0, 9.0, 0.9)]));
        assert!(acc.len() >= before);
    }

    #[test]
    fn reingest_is_idempotent() {
        let frame = frame_of(&[
            (0.0, 0.0, 0.0, 0.9),
            (5.0, 0.0, 0.0, 0.8),
            (0.0, 5.0, 0.0, 0.7),
        ]);
        let mut acc = Accumulator::new(params(), PoseTransform::identity()).unwrap();
        acc.ingest(&frame);
        let size_once = acc.len();
        let snap_once = acc.snapshot(Timestamp::zero());

        acc.ingest(&frame);
        assert_eq!(acc.len(), size_once);

        // Weighted centroids are unchanged when identical data is re-added.
        let snap_twice = acc.snapshot(Timestamp::zero());
        let mut once: Vec<_> = snap_once
            .samples
            .iter()
            .map(|s| (s.position.x.to_bits(), s.position.y.to_bits()))
            .collect();
        let mut twice: Vec<_> = snap_twice
            .samples
            .iter()
            .map(|s| (s.position.x.to_bits(), s.position.y.to_bits()))
            .collect();
        once.sort_unstable();
        twice.sort_unstable();
        assert_eq!(once, twice);
    }

    #[test]
    fn nearby_samples_merge() {
        let mut acc = Accumulator::new(params(), PoseTransform::identity()).unwrap();
        let report = acc.ingest(&frame_of(&[
            (0.10, 0.10, 0.10, 0.9),
            (0.12, 0.11, 0.10, 0.8), // same 0.5 mm voxel
        ]));
        assert_eq!(report.merged, 1);
        assert_eq!(acc.len(), 1);
    }

    #[test]
    fn pose_and_calibration_compose() {
        let calibration = PoseTransform::from_translation(Vector3::new(0.0, 0.0, 1.0));
        let mut acc = Accumulator::new(params(), calibration).unwrap();

        let mut frame = frame_of(&[(0.0, 0.0, 0.0, 0.9)]);
        frame.pose = PoseTransform::from_translation(Vector3::new(2.0, 0.0, 0.0));
        acc.ingest(&frame);

        let snap = acc.snapshot(Timestamp::zero());
        let p = snap.samples[0].position;
        assert!((p.x - 2.0).abs() < 1e-9);
        assert!((p.z - 1.0).abs() < 1e-9);
    }

    #[test]
    fn merged_position_is_weighted_centroid() {
        let mut acc = Accumulator::new(
            AccumulatorParams {
                confidence_floor: 0.0,
                merge_radius: 10.0,
            },
            PoseTransform::identity(),
        )
        .unwrap();
        // Two samples in one big voxel, weights 1.0 and 0.5.
        let mut frame = frame_of(&[(0.0, 0.0, 0.0, 1.0), (3.0, 0.0, 0.0, 0.5)]);
        frame.samples[1].confidence = 0.5;
        acc.ingest(&frame);

        let snap = acc.snapshot(Timestamp::zero());
        assert_eq!(snap.len(), 1);
        assert!((snap.samples[0].position.x - 1.0).abs() < 1e-9);
    }

    #[test]
    fn reset_clears_everything() {
        let mut acc = Accumulator::new(params(), PoseTransform::identity()).unwrap();
        acc.ingest(&frame_of(&[(0.0, 0.0, 0.0, 0.9)]));
        acc.reset();
        assert!(acc.is_empty());
        assert_eq!(acc.snapshot(Timestamp::zero()).range_count, 0);
    }

    #[test]
    fn snapshot_counts_modalities() {
        let mut acc = Accumulator::new(params(), PoseTransform::identity()).unwrap();
        let mut frame = frame_of(&[(0.0, 0.0, 0.0, 0.9), (5.0, 0.0, 0.0, 0.9)]);
        frame.samples[1].modality = SourceModality::VisualFeature;
        acc.ingest(&frame);

        let snap = acc.snapshot(Timestamp::zero());
        assert_eq!(snap.range_count, 1);
        assert_eq!(snap.feature_count, 1);
    }
}
