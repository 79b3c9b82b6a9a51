//! Error types for registration operations.
//!
//! Every stage boundary returns [`Result`]. Configuration and geometry
//! problems are reported before any pyramid level runs.

use thiserror::Error;

/// Main error type for registration operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistrationError {
    /// Images that must share a grid do not, or a grid is unusable.
    #[error("Geometry mismatch in {stage}: {detail}")]
    GeometryMismatch { stage: String, detail: String },

    /// Histogram matching asked for zero bins or zero match points.
    #[error("Invalid histogram configuration: {0}")]
    InvalidHistogramConfig(String),

    /// A mask does not lie on the grid of the image it restricts.
    #[error("Mask geometry mismatch in {stage}: expected {expected}, got {actual}")]
    MaskGeometryMismatch {
        stage: String,
        expected: String,
        actual: String,
    },

    /// The per-level schedules disagree in length.
    #[error(
        "Level count mismatch: {levels} levels, {shrink_factors} shrink factor entries, {iterations} iteration entries"
    )]
    LevelCountMismatch {
        levels: usize,
        shrink_factors: usize,
        iterations: usize,
    },

    /// An input image holds NaN or infinite intensities.
    #[error("Non-finite intensities in {stage}: {image} image")]
    NonFiniteIntensity { stage: String, image: String },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The run was cancelled between two iterations.
    #[error("Registration cancelled at level {level}, iteration {iteration}")]
    Cancelled { level: usize, iteration: usize },
}

/// Result type for registration operations.
pub type Result<T> = std::result::Result<T, RegistrationError>;

impl RegistrationError {
    /// Create a geometry mismatch error.
    pub fn geometry_mismatch(stage: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::GeometryMismatch {
            stage: stage.into(),
            detail: detail.into(),
        }
    }

    /// Create a mask geometry mismatch error from the two grids involved.
    pub fn mask_geometry_mismatch(
        stage: impl Into<String>,
        expected: impl std::fmt::Display,
        actual: impl std::fmt::Display,
    ) -> Self {
        Self::MaskGeometryMismatch {
            stage: stage.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create an invalid histogram configuration error.
    pub fn invalid_histogram(msg: impl Into<String>) -> Self {
        Self::InvalidHistogramConfig(msg.into())
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = RegistrationError::invalid_histogram("zero bins");
        assert!(matches!(err, RegistrationError::InvalidHistogramConfig(_)));
    }

    #[test]
    fn test_error_display() {
        let err = RegistrationError::geometry_mismatch("registration", "sizes differ");
        assert_eq!(err.to_string(), "Geometry mismatch in registration: sizes differ");
    }

    #[test]
    fn test_level_count_mismatch() {
        let err = RegistrationError::LevelCountMismatch {
            levels: 3,
            shrink_factors: 2,
            iterations: 3,
        };
        let err_str = err.to_string();
        assert!(err_str.contains("3 levels"));
        assert!(err_str.contains("2 shrink factor"));
    }

    #[test]
    fn test_cancelled_reports_position() {
        let err = RegistrationError::Cancelled { level: 1, iteration: 7 };
        assert_eq!(err.to_string(), "Registration cancelled at level 1, iteration 7");
    }
}
