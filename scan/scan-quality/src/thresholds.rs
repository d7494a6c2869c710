//! Quality thresholds.
//!
//! Two independent sets: **live** thresholds are advisory and drive mode
//! fallback during acquisition; **finalization** thresholds are strictly
//! tighter and form the authoritative acceptance gate for an emitted mesh.

use scan_types::QualityMetrics;
use serde::{Deserialize, Serialize};

/// Live (advisory) thresholds for one acquisition mode.
///
/// Each metric has an *insufficient* band and a *poor* band; classification
/// is an ordered comparison documented on
/// [`QualityMonitor::evaluate`](crate::QualityMonitor::evaluate).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveThresholds {
    /// Density below this (pts/cm²) is insufficient.
    pub min_density: f64,
    /// Density below this (pts/cm²) is poor.
    pub poor_density: f64,
    /// Density at or above this (pts/cm²) is excellent.
    pub excellent_density: f64,
    /// Motion deviation above this (mm) is insufficient.
    pub max_motion: f64,
    /// Motion deviation above this (mm) is poor.
    pub poor_motion: f64,
    /// Ambient light below this (lux) is insufficient.
    pub min_lighting: f64,
    /// Ambient light below this (lux) is poor.
    pub poor_lighting: f64,
    /// Feature-tracking confidence below this is insufficient
    /// (only checked when the visual tracker is active).
    pub min_feature_confidence: f32,
    /// Feature-tracking confidence below this is poor.
    pub poor_feature_confidence: f32,
}

impl LiveThresholds {
    /// Thresholds for range-only acquisition. Depth ranging tolerates dim
    /// light but is sensitive to motion.
    #[must_use]
    pub const fn range() -> Self {
        Self {
            min_density: 500.0,
            poor_density: 250.0,
            excellent_density: 900.0,
            max_motion: 2.0,
            poor_motion: 5.0,
            min_lighting: 10.0,
            poor_lighting: 2.0,
            min_feature_confidence: 0.0,
            poor_feature_confidence: 0.0,
        }
    }

    /// Thresholds for feature-only acquisition, which needs light and
    /// texture but tolerates more motion.
    #[must_use]
    pub const fn feature() -> Self {
        Self {
            min_density: 500.0,
            poor_density: 250.0,
            excellent_density: 900.0,
            max_motion: 3.0,
            poor_motion: 8.0,
            min_lighting: 100.0,
            poor_lighting: 30.0,
            min_feature_confidence: 0.6,
            poor_feature_confidence: 0.3,
        }
    }

    /// Thresholds for hybrid fusion: the union of both modalities'
    /// requirements, slightly relaxed since the modalities cover for each
    /// other.
    #[must_use]
    pub const fn hybrid() -> Self {
        Self {
            min_density: 500.0,
            poor_density: 250.0,
            excellent_density: 900.0,
            max_motion: 2.5,
            poor_motion: 6.0,
            min_lighting: 50.0,
            poor_lighting: 10.0,
            min_feature_confidence: 0.4,
            poor_feature_confidence: 0.2,
        }
    }
}

/// The authoritative acceptance gate applied to post-reconstruction metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizationThresholds {
    /// Minimum point density (pts/cm²).
    pub min_density: f64,
    /// Minimum surface completeness.
    pub min_completeness: f64,
    /// Maximum RMS noise (mm).
    pub max_noise: f64,
    /// Minimum feature preservation.
    pub min_feature_preservation: f64,
    /// Minimum normal consistency.
    pub min_normal_consistency: f64,
}

impl Default for FinalizationThresholds {
    /// The live floors tightened: density ×1.4, noise halved relative to the
    /// 1 mm live tolerance, completeness per the clinical target.
    fn default() -> Self {
        Self {
            min_density: 700.0,
            min_completeness: 0.95,
            max_noise: 0.5,
            min_feature_preservation: 0.85,
            min_normal_consistency: 0.90,
        }
    }
}

/// One metric that failed the finalization gate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GateShortfall {
    /// Density below the floor.
    Density {
        /// Measured value (pts/cm²).
        measured: f64,
        /// Required minimum.
        required: f64,
    },
    /// Completeness below the floor.
    Completeness {
        /// Measured value.
        measured: f64,
        /// Required minimum.
        required: f64,
    },
    /// Noise above the ceiling.
    Noise {
        /// Measured value (mm).
        measured: f64,
        /// Allowed maximum.
        allowed: f64,
    },
    /// Feature preservation below the floor.
    FeaturePreservation {
        /// Measured value.
        measured: f64,
        /// Required minimum.
        required: f64,
    },
    /// Normal consistency below the floor.
    NormalConsistency {
        /// Measured value.
        measured: f64,
        /// Required minimum.
        required: f64,
    },
}

/// Outcome of applying the finalization gate.
#[derive(Debug, Clone, PartialEq)]
pub struct GateReport {
    /// True if every metric cleared its threshold.
    pub passed: bool,
    /// The metrics that fell short, in evaluation order.
    pub shortfalls: Vec<GateShortfall>,
}

impl std::fmt::Display for GateReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.passed {
            write!(f, "finalization gate passed")
        } else {
            write!(f, "finalization gate failed: {} shortfalls", self.shortfalls.len())
        }
    }
}

impl FinalizationThresholds {
    /// Evaluates metrics against this gate.
    #[must_use]
    pub fn gate(&self, metrics: &QualityMetrics) -> GateReport {
        let mut shortfalls = Vec::new();
        if metrics.point_density < self.min_density {
            shortfalls.push(GateShortfall::Density {
                measured: metrics.point_density,
                required: self.min_density,
            });
        }
        if metrics.surface_completeness < self.min_completeness {
            shortfalls.push(GateShortfall::Completeness {
                measured: metrics.surface_completeness,
                required: self.min_completeness,
            });
        }
        if metrics.noise_level > self.max_noise {
            shortfalls.push(GateShortfall::Noise {
                measured: metrics.noise_level,
                allowed: self.max_noise,
            });
        }
        if metrics.feature_preservation < self.min_feature_preservation {
            shortfalls.push(GateShortfall::FeaturePreservation {
                measured: metrics.feature_preservation,
                required: self.min_feature_preservation,
            });
        }
        if metrics.normal_consistency < self.min_normal_consistency {
            shortfalls.push(GateShortfall::NormalConsistency {
                measured: metrics.normal_consistency,
                required: self.min_normal_consistency,
            });
        }
        GateReport {
            passed: shortfalls.is_empty(),
            shortfalls,
        }
    }
}
