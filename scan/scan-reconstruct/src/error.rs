//! Error types for surface reconstruction.

use thiserror::Error;

/// Result type for reconstruction operations.
pub type ReconstructResult<T> = Result<T, ReconstructError>;

/// Errors that can occur during surface reconstruction.
#[derive(Debug, Error)]
pub enum ReconstructError {
    /// The input cloud is unusable (too few points, degenerate bounds).
    #[error("invalid reconstruction input: {reason}")]
    InvalidInput {
        /// Why the input is unusable.
        reason: String,
    },

    /// The cloud is below the profile's minimum sample count.
    #[error("insufficient point density: {actual} usable points, {required} required")]
    InsufficientPointDensity {
        /// Minimum usable samples required by the profile.
        required: usize,
        /// Usable samples actually present.
        actual: usize,
    },

    /// The adaptive octree could not be built.
    #[error("octree build failed: {reason}")]
    OctreeBuildFailed {
        /// Why the build failed.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let err = ReconstructError::InsufficientPointDensity {
            required: 500,
            actual: 12,
        };
        let msg = format!("{err}");
        assert!(msg.contains("500"));
        assert!(msg.contains("12"));
    }
}
