//! Reconstruction parameters.

use serde::{Deserialize, Serialize};

use crate::error::{ReconstructError, ReconstructResult};

/// Parameters for the reconstruction solve that are sensor-independent.
///
/// Sensor-specific knobs (octree depth, samples per node, screening weight,
/// minimum edge length) come from the `SensorProfile`; these control the
/// numerics.
///
/// # Example
///
/// ```
/// use scan_reconstruct::ReconstructParams;
///
/// let params = ReconstructParams::new().with_normal_k(16);
/// assert_eq!(params.normal_k, 16);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconstructParams {
    /// Neighbors used for PCA normal estimation. Default: 20.
    pub normal_k: usize,
    /// Conjugate-gradient iteration cap. Default: 300.
    pub cg_max_iterations: usize,
    /// Conjugate-gradient relative residual tolerance. Default: 1e-8.
    pub cg_tolerance: f64,
    /// Relative padding applied when cubifying the cloud bounds. Default: 0.1.
    pub bounds_padding: f64,
    /// Neighbors used when interpolating the indicator field at grid
    /// corners. Default: 8.
    pub field_k: usize,
}

impl Default for ReconstructParams {
    fn default() -> Self {
        Self {
            normal_k: 20,
            cg_max_iterations: 300,
            cg_tolerance: 1e-8,
            bounds_padding: 0.1,
            field_k: 8,
        }
    }
}

impl ReconstructParams {
    /// Creates parameters with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fast settings for live previews: fewer neighbors, looser solve.
    #[must_use]
    pub fn preview() -> Self {
        Self {
            normal_k: 12,
            cg_max_iterations: 80,
            cg_tolerance: 1e-5,
            ..Self::default()
        }
    }

    /// Sets the normal-estimation neighborhood size.
    #[must_use]
    pub const fn with_normal_k(mut self, k: usize) -> Self {
        self.normal_k = k;
        self
    }

    /// Sets the conjugate-gradient iteration cap.
    #[must_use]
    pub const fn with_cg_max_iterations(mut self, iterations: usize) -> Self {
        self.cg_max_iterations = iterations;
        self
    }

    /// Sets the conjugate-gradient tolerance.
    #[must_use]
    pub const fn with_cg_tolerance(mut self, tolerance: f64) -> Self {
        self.cg_tolerance = tolerance;
        self
    }

    /// Validates the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ReconstructError::InvalidInput`] for out-of-range values.
    pub fn validate(&self) -> ReconstructResult<()> {
        if self.normal_k < 3 {
            return Err(ReconstructError::InvalidInput {
                reason: "normal_k must be at least 3".to_string(),
            });
        }
        if self.cg_max_iterations == 0 {
            return Err(ReconstructError::InvalidInput {
                reason: "cg_max_iterations must be positive".to_string(),
            });
        }
        if self.cg_tolerance <= 0.0 || self.cg_tolerance.is_nan() {
            return Err(ReconstructError::InvalidInput {
                reason: "cg_tolerance must be positive".to_string(),
            });
        }
        if self.field_k == 0 {
            return Err(ReconstructError::InvalidInput {
                reason: "field_k must be positive".to_string(),
            });
        }
        if !(0.0..1.0).contains(&self.bounds_padding) {
            return Err(ReconstructError::InvalidInput {
                reason: "bounds_padding must be in [0, 1)".to_string(),
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
        assert!(ReconstructParams::default().validate().is_ok());
        assert!(ReconstructParams::preview().validate().is_ok());
    }

    #[test]
    fn preview_is_looser() {
        let preview = ReconstructParams::preview();
        let default = ReconstructParams::default();
        assert!(preview.cg_max_iterations < default.cg_max_iterations);
        assert!(preview.cg_tolerance > default.cg_tolerance);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(ReconstructParams::new().with_normal_k(1).validate().is_err());
        assert!(ReconstructParams::new()
            .with_cg_max_iterations(0)
            .validate()
            .is_err());
        assert!(ReconstructParams::new()
            .with_cg_tolerance(-1.0)
            .validate()
            .is_err());
    }
}
