//! Sensor profiles.
//!
//! Every numeric knob of the reconstruction and accumulation pipeline lives
//! here rather than in the algorithms: different sensors need different
//! octree depths and weights to hit the clinical precision targets.

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Error returned when a profile fails validation.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// A numeric field is outside its valid range.
    #[error("invalid profile field {field}: {reason}")]
    InvalidField {
        /// The offending field name.
        field: &'static str,
        /// Why the value is invalid.
        reason: String,
    },
}

/// Numeric configuration for one sensor class.
///
/// # Example
///
/// ```
/// use scan_types::SensorProfile;
///
/// let profile = SensorProfile::lidar_rated();
/// assert!(profile.max_octree_depth >= SensorProfile::preview().max_octree_depth);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SensorProfile {
    /// Human-readable profile name.
    pub name: &'static str,
    /// Maximum octree depth for reconstruction. Denser sensors go deeper.
    pub max_octree_depth: u32,
    /// Target samples per octree node before subdivision.
    pub samples_per_node: usize,
    /// Screening weight for the Poisson solve (0 = pure Poisson).
    pub point_weight: f64,
    /// Minimum triangle edge length in mm; shorter triangles are rejected
    /// during isosurface extraction.
    pub min_edge_length: f64,
    /// Minimum usable sample confidence; lower-confidence samples are
    /// discarded at ingest.
    pub confidence_floor: f32,
    /// Samples within this radius (mm) are merged by the accumulator.
    pub merge_radius: f64,
    /// Minimum sample count for reconstruction to be attempted.
    pub min_point_count: usize,
    /// Sensor's rated areal density in points per cm².
    pub rated_density: f64,
}

impl SensorProfile {
    /// Profile for the depth-ranging sensor at its rated density.
    #[must_use]
    pub const fn lidar_rated() -> Self {
        Self {
            name: "lidar-rated",
            max_octree_depth: 7,
            samples_per_node: 8,
            point_weight: 4.0,
            min_edge_length: 2.0,
            confidence_floor: 0.5,
            merge_radius: 0.5,
            min_point_count: 500,
            rated_density: 1000.0,
        }
    }

    /// Profile for visual-feature (photogrammetry) acquisition, which is
    /// sparser and noisier than direct ranging.
    #[must_use]
    pub const fn photogrammetry() -> Self {
        Self {
            name: "photogrammetry",
            max_octree_depth: 6,
            samples_per_node: 12,
            point_weight: 2.0,
            min_edge_length: 2.0,
            confidence_floor: 0.4,
            merge_radius: 0.8,
            min_point_count: 300,
            rated_density: 600.0,
        }
    }

    /// Shallow profile for live low-resolution previews.
    #[must_use]
    pub const fn preview() -> Self {
        Self {
            name: "preview",
            max_octree_depth: 5,
            samples_per_node: 24,
            point_weight: 2.0,
            min_edge_length: 4.0,
            confidence_floor: 0.3,
            merge_radius: 1.0,
            min_point_count: 100,
            rated_density: 250.0,
        }
    }

    /// Validates the profile.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidField`] for out-of-range values.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.max_octree_depth == 0 || self.max_octree_depth > 12 {
            return Err(ProfileError::InvalidField {
                field: "max_octree_depth",
                reason: format!("{} not in 1..=12", self.max_octree_depth),
            });
        }
        if self.samples_per_node == 0 {
            return Err(ProfileError::InvalidField {
                field: "samples_per_node",
                reason: "must be positive".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.confidence_floor) {
            return Err(ProfileError::InvalidField {
                field: "confidence_floor",
                reason: format!("{} not in [0, 1]", self.confidence_floor),
            });
        }
        if self.merge_radius <= 0.0 {
            return Err(ProfileError::InvalidField {
                field: "merge_radius",
                reason: "must be positive".to_string(),
            });
        }
        if self.min_edge_length <= 0.0 {
            return Err(ProfileError::InvalidField {
                field: "min_edge_length",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_validate() {
        assert!(SensorProfile::lidar_rated().validate().is_ok());
        assert!(SensorProfile::photogrammetry().validate().is_ok());
        assert!(SensorProfile::preview().validate().is_ok());
    }

    #[test]
    fn invalid_depth_rejected() {
        let mut p = SensorProfile::lidar_rated();
        p.max_octree_depth = 0;
        assert!(matches!(
            p.validate(),
            Err(ProfileError::InvalidField { field, .. }) if field == "max_octree_depth"
        ));
    }

    #[test]
    fn invalid_confidence_rejected() {
        let mut p = SensorProfile::preview();
        p.confidence_floor = 1.5;
        assert!(p.validate().is_err());
    }
}
