//! Quality metrics attached to reconstructed meshes.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Multi-metric quality record for a reconstructed surface.
///
/// Computed whenever reconstruction completes; a lightweight live estimate of
/// the density term is also available during acquisition (see `scan-quality`).
///
/// # Example
///
/// ```
/// use scan_types::QualityMetrics;
///
/// let metrics = QualityMetrics {
///     point_density: 820.0,
///     surface_completeness: 0.97,
///     noise_level: 0.12,
///     feature_preservation: 0.91,
///     normal_consistency: 0.94,
/// };
/// println!("{metrics}");
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct QualityMetrics {
    /// Point density over the scanned surface in points per cm².
    pub point_density: f64,
    /// Fraction of input samples explained by the surface, `[0, 1]`.
    pub surface_completeness: f64,
    /// RMS sample-to-surface distance in millimeters.
    pub noise_level: f64,
    /// Fraction of high-importance detected features surviving
    /// post-processing, `[0, 1]`.
    pub feature_preservation: f64,
    /// Mean alignment of adjacent face normals, `[0, 1]`.
    pub normal_consistency: f64,
}

impl QualityMetrics {
    /// A metrics record representing a freshly reconstructed, unprocessed
    /// surface (feature preservation not yet measured).
    #[must_use]
    pub const fn unprocessed(
        point_density: f64,
        surface_completeness: f64,
        noise_level: f64,
        normal_consistency: f64,
    ) -> Self {
        Self {
            point_density,
            surface_completeness,
            noise_level,
            feature_preservation: 1.0,
            normal_consistency,
        }
    }
}

impl std::fmt::Display for QualityMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "density {:.0} pts/cm², completeness {:.1}%, noise {:.2} mm, features {:.1}%, normals {:.1}%",
            self.point_density,
            self.surface_completeness * 100.0,
            self.noise_level,
            self.feature_preservation * 100.0,
            self.normal_consistency * 100.0
        )
    }
}
