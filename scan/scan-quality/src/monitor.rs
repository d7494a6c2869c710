//! Live quality monitor.
//!
//! Evaluates the accumulated cloud together with a rolling window of sensor
//! telemetry and classifies current acquisition quality. The classification
//! is advisory; the acquisition controller decides what to do with it.

use std::collections::VecDeque;

use scan_types::{CloudSnapshot, Duration, PoseTransform, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{QualityError, QualityResult};
use crate::thresholds::LiveThresholds;

/// One telemetry reading from the sensor rig, sampled alongside each frame.
#[derive(Debug, Clone)]
pub struct SensorTelemetry {
    /// Device pose at the time of the reading.
    pub pose: PoseTransform,
    /// Ambient illuminance in lux.
    pub ambient_lux: f64,
    /// Visual feature-tracking confidence in `[0, 1]`, when the visual
    /// tracker is running.
    pub feature_confidence: Option<f32>,
    /// When the reading was taken.
    pub timestamp: Timestamp,
}

/// Ordered quality classification, worst first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityStatus {
    /// Not enough telemetry in the window to classify.
    Unknown,
    /// At least one metric is in its poor band; acquisition in the current
    /// mode is unlikely to recover without intervention.
    Poor,
    /// At least one metric is below its floor; coverage is accumulating too
    /// slowly or conditions are marginal.
    Insufficient,
    /// All metrics clear their floors.
    Good,
    /// All metrics clear their floors and density is at the excellent level.
    Excellent,
}

/// Why an estimate came out below `Good`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityReason {
    /// Point density below the floor for the active mode.
    LowDensity,
    /// Device motion deviation above the tolerance.
    ExcessiveMotion,
    /// Ambient light below the floor.
    PoorLighting,
    /// Visual feature tracking confidence below the floor.
    WeakFeatureTracking,
}

/// One quality evaluation.
#[derive(Debug, Clone)]
pub struct QualityEstimate {
    /// The classification.
    pub status: QualityStatus,
    /// Estimated point density over the scanned patch, in points/cm².
    pub density: f64,
    /// Standard deviation of per-frame translation deltas over the window,
    /// in millimeters.
    pub motion_deviation: f64,
    /// Most recent ambient illuminance, in lux.
    pub lighting: f64,
    /// Most recent feature-tracking confidence, if the tracker is active.
    pub feature_confidence: Option<f32>,
    /// The metrics that pulled the status below `Good`, in check order.
    pub reasons: Vec<QualityReason>,
}

impl QualityEstimate {
    fn unknown() -> Self {
        Self {
            status: QualityStatus::Unknown,
            density: 0.0,
            motion_deviation: 0.0,
            lighting: 0.0,
            feature_confidence: None,
            reasons: Vec::new(),
        }
    }
}

/// Rolling-window quality monitor.
///
/// Holds the live thresholds for the active acquisition mode and a telemetry
/// window of fixed duration. Call [`Self::evaluate`] once per ingested frame.
#[derive(Debug)]
pub struct QualityMonitor {
    thresholds: LiveThresholds,
    window: Duration,
    readings: VecDeque<SensorTelemetry>,
}

impl QualityMonitor {
    /// Creates a monitor with the given mode thresholds and window length.
    ///
    /// # Errors
    ///
    /// Returns [`QualityError::InvalidParameter`] if the window is zero.
    pub fn new(thresholds: LiveThresholds, window: Duration) -> QualityResult<Self> {
        if window.is_zero() {
            return Err(QualityError::InvalidParameter {
                reason: "telemetry window must be non-zero".to_string(),
            });
        }
        Ok(Self {
            thresholds,
            window,
            readings: VecDeque::new(),
        })
    }

    /// Creates a monitor with the default 2 second window.
    ///
    /// # Errors
    ///
    /// Never fails for the default window; the `Result` keeps the signature
    /// uniform with [`Self::new`].
    pub fn with_default_window(thresholds: LiveThresholds) -> QualityResult<Self> {
        Self::new(thresholds, Duration::from_millis(2000))
    }

    /// Swaps in the thresholds for a different acquisition mode. The
    /// telemetry window is kept so the next estimate stays informed.
    pub fn set_thresholds(&mut self, thresholds: LiveThresholds) {
        self.thresholds = thresholds;
    }

    /// Active thresholds.
    #[must_use]
    pub const fn thresholds(&self) -> &LiveThresholds {
        &self.thresholds
    }

    /// Number of telemetry readings currently in the window.
    #[must_use]
    pub fn window_len(&self) -> usize {
        self.readings.len()
    }

    /// Ingests a telemetry reading and evaluates quality against the
    /// accumulated cloud.
    ///
    /// Classification is an ordered comparison: `Unknown` while the window
    /// holds fewer than two readings, then `Poor` if any metric sits in its
    /// poor band, then `Insufficient` if any metric misses its floor, then
    /// `Excellent` if density reaches the excellent level, otherwise `Good`.
    pub fn evaluate(&mut self, cloud: &CloudSnapshot, telemetry: SensorTelemetry) -> QualityEstimate {
        let now = telemetry.timestamp;
        self.readings.push_back(telemetry);
        let horizon = now.saturating_sub(self.window);
        while self
            .readings
            .front()
            .is_some_and(|r| r.timestamp < horizon)
        {
            self.readings.pop_front();
        }

        if self.readings.len() < 2 {
            return QualityEstimate::unknown();
        }

        let density = patch_density(cloud);
        let motion_deviation = self.motion_deviation();
        // Front of the deque is oldest; the reading just pushed is last.
        #[allow(clippy::unwrap_used)]
        let latest = self.readings.back().unwrap();
        let lighting = latest.ambient_lux;
        let feature_confidence = latest.feature_confidence;

        let t = &self.thresholds;
        let mut reasons = Vec::new();
        let mut poor = false;
        let mut insufficient = false;

        if density < t.poor_density {
            poor = true;
            reasons.push(QualityReason::LowDensity);
        } else if density < t.min_density {
            insufficient = true;
            reasons.push(QualityReason::LowDensity);
        }

        if motion_deviation > t.poor_motion {
            poor = true;
            reasons.push(QualityReason::ExcessiveMotion);
        } else if motion_deviation > t.max_motion {
            insufficient = true;
            reasons.push(QualityReason::ExcessiveMotion);
        }

        if lighting < t.poor_lighting {
            poor = true;
            reasons.push(QualityReason::PoorLighting);
        } else if lighting < t.min_lighting {
            insufficient = true;
            reasons.push(QualityReason::PoorLighting);
        }

        if let Some(conf) = feature_confidence {
            if conf < t.poor_feature_confidence {
                poor = true;
                reasons.push(QualityReason::WeakFeatureTracking);
            } else if conf < t.min_feature_confidence {
                insufficient = true;
                reasons.push(QualityReason::WeakFeatureTracking);
            }
        }

        let status = if poor {
            QualityStatus::Poor
        } else if insufficient {
            QualityStatus::Insufficient
        } else if density >= t.excellent_density {
            QualityStatus::Excellent
        } else {
            QualityStatus::Good
        };

        debug!(
            ?status,
            density,
            motion_deviation,
            lighting,
            "quality evaluated"
        );

        QualityEstimate {
            status,
            density,
            motion_deviation,
            lighting,
            feature_confidence,
            reasons,
        }
    }

    /// Clears the telemetry window, e.g. after an interruption.
    pub fn reset(&mut self) {
        self.readings.clear();
    }

    /// Standard deviation of the norms of consecutive translation deltas.
    fn motion_deviation(&self) -> f64 {
        let deltas: Vec<f64> = self
            .readings
            .iter()
            .zip(self.readings.iter().skip(1))
            .map(|(a, b)| (b.pose.translation() - a.pose.translation()).norm())
            .collect();
        if deltas.is_empty() {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = deltas.len() as f64;
        let mean = deltas.iter().sum::<f64>() / n;
        let var = deltas.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
        var.sqrt()
    }
}

/// Estimates point density over the scanned patch, in points/cm².
///
/// The patch area is approximated by the product of the two largest extents
/// of the cloud's bounding box, treating the scan as a gently curved sheet.
#[must_use]
pub fn patch_density(cloud: &CloudSnapshot) -> f64 {
    let Some(bounds) = cloud.bounds() else {
        return 0.0;
    };
    let extent = bounds.extent();
    let mut dims = [extent.x, extent.y, extent.z];
    dims.sort_by(|a, b| a.total_cmp(b));
    let area_mm2 = dims[1] * dims[2];
    if area_mm2 <= f64::EPSILON {
        return 0.0;
    }
    // 1 cm² = 100 mm².
    #[allow(clippy::cast_precision_loss)]
    let count = cloud.len() as f64;
    count / (area_mm2 / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};
    use scan_types::{PointSample, SourceModality};

    fn dense_cloud() -> CloudSnapshot {
        // A 10 mm x 10 mm patch (1 cm²) with 1000 points gives 1000 pts/cm².
        let mut samples = Vec::new();
        for i in 0..1000 {
            let x = f64::from(i % 100) * 0.1;
            let y = f64::from(i / 100) * 1.0;
            samples.push(PointSample::new(
                Point3::new(x, y, 0.0),
                0.9,
                SourceModality::Range,
                Timestamp::zero(),
            ));
        }
        CloudSnapshot::new(samples, 1000, 0, Timestamp::zero())
    }

    fn steady_telemetry(at_ms: u64) -> SensorTelemetry {
        SensorTelemetry {
            pose: PoseTransform::from_translation(Vector3::new(
                f64::from(u32::try_from(at_ms).unwrap_or(0)) * 0.001,
                0.0,
                0.0,
            )),
            ambient_lux: 400.0,
            feature_confidence: Some(0.9),
            timestamp: Timestamp::from_millis(at_ms),
        }
    }

    #[test]
    fn unknown_until_window_fills() {
        let mut monitor =
            QualityMonitor::with_default_window(LiveThresholds::hybrid()).unwrap();
        let estimate = monitor.evaluate(&dense_cloud(), steady_telemetry(0));
        assert_eq!(estimate.status, QualityStatus::Unknown);
    }

    #[test]
    fn excellent_when_dense_and_steady() {
        let mut monitor =
            QualityMonitor::with_default_window(LiveThresholds::hybrid()).unwrap();
        let cloud = dense_cloud();
        monitor.evaluate(&cloud, steady_telemetry(0));
        let estimate = monitor.evaluate(&cloud, steady_telemetry(33));
        assert_eq!(estimate.status, QualityStatus::Excellent);
        assert!(estimate.reasons.is_empty());
        assert_relative_eq!(estimate.density, 1000.0, max_relative = 0.15);
    }

    #[test]
    fn poor_lighting_flags_reason() {
        let mut monitor =
            QualityMonitor::with_default_window(LiveThresholds::feature()).unwrap();
        let cloud = dense_cloud();
        let dark = |at_ms| SensorTelemetry {
            ambient_lux: 5.0,
            ..steady_telemetry(at_ms)
        };
        monitor.evaluate(&cloud, dark(0));
        let estimate = monitor.evaluate(&cloud, dark(33));
        assert_eq!(estimate.status, QualityStatus::Poor);
        assert!(estimate.reasons.contains(&QualityReason::PoorLighting));
    }

    #[test]
    fn excessive_motion_detected() {
        let mut monitor =
            QualityMonitor::with_default_window(LiveThresholds::range()).unwrap();
        let cloud = dense_cloud();
        // Alternate between large and tiny jumps so the delta norms have
        // high variance.
        for (i, step) in [0.0, 20.0, 20.5, 40.0, 40.2].iter().enumerate() {
            let telemetry = SensorTelemetry {
                pose: PoseTransform::from_translation(Vector3::new(*step, 0.0, 0.0)),
                ambient_lux: 400.0,
                feature_confidence: None,
                timestamp: Timestamp::from_millis(u64::try_from(i).unwrap_or(0) * 33),
            };
            let estimate = monitor.evaluate(&cloud, telemetry);
            if i == 4 {
                assert_eq!(estimate.status, QualityStatus::Poor);
                assert!(estimate
                    .reasons
                    .contains(&QualityReason::ExcessiveMotion));
            }
        }
    }

    #[test]
    fn insufficient_density_before_poor() {
        let mut monitor =
            QualityMonitor::with_default_window(LiveThresholds::hybrid()).unwrap();
        // 300 points over 1 cm² sits between the poor and minimum floors.
        let samples: Vec<_> = (0..300)
            .map(|i| {
                PointSample::new(
                    Point3::new(f64::from(i % 30) / 3.0, f64::from(i / 30), 0.0),
                    0.9,
                    SourceModality::Range,
                    Timestamp::zero(),
                )
            })
            .collect();
        let cloud = CloudSnapshot::new(samples, 300, 0, Timestamp::zero());
        monitor.evaluate(&cloud, steady_telemetry(0));
        let estimate = monitor.evaluate(&cloud, steady_telemetry(33));
        assert_eq!(estimate.status, QualityStatus::Insufficient);
        assert!(estimate.reasons.contains(&QualityReason::LowDensity));
    }

    #[test]
    fn window_discards_stale_readings() {
        let mut monitor = QualityMonitor::new(
            LiveThresholds::hybrid(),
            Duration::from_millis(100),
        )
        .unwrap();
        let cloud = dense_cloud();
        monitor.evaluate(&cloud, steady_telemetry(0));
        monitor.evaluate(&cloud, steady_telemetry(33));
        assert_eq!(monitor.window_len(), 2);
        // A reading far in the future evicts everything older.
        let estimate = monitor.evaluate(&cloud, steady_telemetry(5000));
        assert_eq!(monitor.window_len(), 1);
        assert_eq!(estimate.status, QualityStatus::Unknown);
    }

    #[test]
    fn reset_clears_window() {
        let mut monitor =
            QualityMonitor::with_default_window(LiveThresholds::hybrid()).unwrap();
        let cloud = dense_cloud();
        monitor.evaluate(&cloud, steady_telemetry(0));
        monitor.evaluate(&cloud, steady_telemetry(33));
        monitor.reset();
        assert_eq!(monitor.window_len(), 0);
    }

    #[test]
    fn zero_window_rejected() {
        assert!(QualityMonitor::new(LiveThresholds::range(), Duration::from_millis(0)).is_err());
    }

    #[test]
    fn empty_cloud_has_zero_density() {
        let cloud = CloudSnapshot::new(Vec::new(), 0, 0, Timestamp::zero());
        assert_relative_eq!(patch_density(&cloud), 0.0);
    }
}
