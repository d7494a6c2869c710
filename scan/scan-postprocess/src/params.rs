//! Post-processing parameters.
//!
//! Each stage is optional; `None` skips it. Every stage is idempotent at the
//! mesh level, so re-running a report's configuration on its output changes
//! nothing meaningful.

use serde::{Deserialize, Serialize};

use crate::error::{PostprocessError, PostprocessResult};

/// Parameters for statistical outlier vertex removal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierParams {
    /// Number of neighbors to consider. Default: 20.
    pub k_neighbors: usize,
    /// Vertices with mean neighbor distance beyond
    /// `mean + std_multiplier * std` are removed. Default: 2.0.
    pub std_multiplier: f64,
    /// Lower bound on the removal threshold, as a multiple of the median
    /// mean-neighbor distance. Keeps rim and corner vertices of clean
    /// meshes, whose one-sided neighborhoods read slightly wide, from
    /// being classed as outliers. Default: 2.0.
    pub median_floor: f64,
}

impl Default for OutlierParams {
    fn default() -> Self {
        Self {
            k_neighbors: 20,
            std_multiplier: 2.0,
            median_floor: 2.0,
        }
    }
}

impl OutlierParams {
    /// Creates parameters with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes more points (lower multiplier, wider neighborhood).
    #[must_use]
    pub const fn aggressive() -> Self {
        Self {
            k_neighbors: 30,
            std_multiplier: 1.0,
            median_floor: 1.5,
        }
    }

    /// Removes only obvious outliers.
    #[must_use]
    pub const fn conservative() -> Self {
        Self {
            k_neighbors: 10,
            std_multiplier: 3.0,
            median_floor: 3.0,
        }
    }
}

/// Parameters for clamped Laplacian smoothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmoothParams {
    /// Smoothing passes. Default: 3.
    pub iterations: usize,
    /// Step toward the neighborhood average per pass, `(0, 1]`. Default: 0.5.
    pub lambda: f64,
    /// Multiplier applied to `lambda` at feature vertices, `[0, 1]`.
    /// Default: 0.1, so creases barely move.
    pub feature_clamp: f64,
}

impl Default for SmoothParams {
    fn default() -> Self {
        Self {
            iterations: 3,
            lambda: 0.5,
            feature_clamp: 0.1,
        }
    }
}

impl SmoothParams {
    /// Creates parameters with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of passes.
    #[must_use]
    pub const fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Sets the smoothing step.
    #[must_use]
    pub const fn with_lambda(mut self, lambda: f64) -> Self {
        self.lambda = lambda;
        self
    }
}

/// Parameters for feature-preserving decimation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecimateParams {
    /// Keep this fraction of triangles. Ignored when `target_triangles` is
    /// set. Default: 0.5.
    pub target_ratio: f64,
    /// Absolute triangle target.
    pub target_triangles: Option<usize>,
}

impl Default for DecimateParams {
    fn default() -> Self {
        Self {
            target_ratio: 0.5,
            target_triangles: None,
        }
    }
}

impl DecimateParams {
    /// Creates parameters with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Targets a fraction of the original triangle count.
    #[must_use]
    pub const fn with_target_ratio(ratio: f64) -> Self {
        Self {
            target_ratio: ratio,
            target_triangles: None,
        }
    }

    /// Targets an absolute triangle count.
    #[must_use]
    pub const fn with_target_triangles(count: usize) -> Self {
        Self {
            target_ratio: 1.0,
            target_triangles: Some(count),
        }
    }
}

/// Full post-processing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostprocessParams {
    /// Outlier removal stage, or `None` to skip.
    pub outlier: Option<OutlierParams>,
    /// Smoothing stage, or `None` to skip.
    pub smooth: Option<SmoothParams>,
    /// Decimation stage, or `None` to skip.
    pub decimate: Option<DecimateParams>,
    /// Whether to reorder indices for vertex-cache locality.
    pub reorder: bool,
    /// Decimation is reverted when the result's normal consistency falls
    /// below this. Default: 0.9.
    pub min_normal_consistency: f64,
    /// Features at or above this importance are pinned during decimation
    /// and counted for preservation. Default: 0.3.
    pub feature_importance_floor: f64,
    /// Correspondence tolerance (mm) for the preservation measure.
    /// Default: 2.0.
    pub feature_tolerance: f64,
}

impl Default for PostprocessParams {
    fn default() -> Self {
        Self {
            outlier: Some(OutlierParams::default()),
            smooth: Some(SmoothParams::default()),
            decimate: Some(DecimateParams::default()),
            reorder: true,
            min_normal_consistency: 0.9,
            feature_importance_floor: 0.3,
            feature_tolerance: 2.0,
        }
    }
}

impl PostprocessParams {
    /// Creates parameters with defaults (all stages enabled).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cleanup only: no decimation, single smoothing pass. Used for live
    /// previews where latency matters more than size.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            outlier: Some(OutlierParams::conservative()),
            smooth: Some(SmoothParams::new().with_iterations(1)),
            decimate: None,
            reorder: false,
            ..Self::default()
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PostprocessError::InvalidParameter`] for out-of-range
    /// values.
    pub fn validate(&self) -> PostprocessResult<()> {
        if let Some(outlier) = &self.outlier {
            if outlier.k_neighbors == 0 {
                return Err(PostprocessError::InvalidParameter {
                    reason: "outlier k_neighbors must be positive".to_string(),
                });
            }
            if outlier.std_multiplier <= 0.0 {
                return Err(PostprocessError::InvalidParameter {
                    reason: "outlier std_multiplier must be positive".to_string(),
                });
            }
            if outlier.median_floor < 1.0 {
                return Err(PostprocessError::InvalidParameter {
                    reason: "outlier median_floor must be at least 1".to_string(),
                });
            }
        }
        if let Some(smooth) = &self.smooth {
            if !(0.0..=1.0).contains(&smooth.lambda) || smooth.lambda == 0.0 {
                return Err(PostprocessError::InvalidParameter {
                    reason: "smoothing lambda must be in (0, 1]".to_string(),
                });
            }
            if !(0.0..=1.0).contains(&smooth.feature_clamp) {
                return Err(PostprocessError::InvalidParameter {
                    reason: "feature_clamp must be in [0, 1]".to_string(),
                });
            }
        }
        if let Some(decimate) = &self.decimate {
            if !(0.0..=1.0).contains(&decimate.target_ratio) {
                return Err(PostprocessError::InvalidParameter {
                    reason: "target_ratio must be in [0, 1]".to_string(),
                });
            }
        }
        if !(0.0..=1.0).contains(&self.min_normal_consistency) {
            return Err(PostprocessError::InvalidParameter {
                reason: "min_normal_consistency must be in [0, 1]".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(PostprocessParams::default().validate().is_ok());
        assert!(PostprocessParams::fast().validate().is_ok());
    }

    #[test]
    fn fast_skips_decimation() {
        let params = PostprocessParams::fast();
        assert!(params.decimate.is_none());
        assert!(!params.reorder);
    }

    #[test]
    fn bad_lambda_rejected() {
        let mut params = PostprocessParams::default();
        params.smooth = Some(SmoothParams::new().with_lambda(0.0));
        assert!(params.validate().is_err());
    }

    #[test]
    fn aggressive_removes_more() {
        assert!(OutlierParams::aggressive().std_multiplier < OutlierParams::default().std_multiplier);
        assert!(OutlierParams::conservative().std_multiplier > OutlierParams::default().std_multiplier);
    }
}
