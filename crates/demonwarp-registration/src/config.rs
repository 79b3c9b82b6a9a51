//! Registration parameters.
//!
//! A [`RegistrationParameters`] is built once and never mutated by the
//! pipeline. It derives burn's `Config`, so every field has a `with_*`
//! builder and the whole set round-trips through JSON with `save`/`load`.

use burn::config::Config;
use serde::{Deserialize, Serialize};

use crate::error::RegistrationError;

/// Which image gradient drives the Demons force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ForceStrategy {
    /// Average of the fixed and warped-moving gradients.
    #[default]
    Symmetric,
    /// Gradient of the fixed image (classic Thirion demons).
    FixedImage,
    /// Gradient of the warped moving image.
    WarpedMoving,
}

/// How each update is folded into the deformation field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UpdateRule {
    /// `u <- u ∘ exp(v)`; keeps the transform invertible.
    #[default]
    Diffeomorphic,
    /// `u <- u + v`.
    Additive,
}

/// Interpolator used for the final warped moving image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InterpolationMode {
    #[default]
    Linear,
    NearestNeighbor,
}

/// Brain-only-by-flood-fill cleanup of an input mask.
#[derive(Config, Debug, PartialEq)]
pub struct MaskCleanup {
    /// Grid index (axis order) the kept region must contain.
    pub seed: Vec<usize>,
    /// Lowest mask value counted as foreground.
    #[config(default = "0.5")]
    pub lower: f32,
    /// Highest mask value counted as foreground.
    #[config(default = "1.0")]
    pub upper: f32,
    /// Neighborhood radius that must lie entirely in `[lower, upper]`.
    #[config(default = "vec![1]")]
    pub radius: Vec<usize>,
    /// Median radius applied to the flood-filled region.
    #[config(default = "vec![1]")]
    pub median_radius: Vec<usize>,
}

#[derive(Config, Debug, PartialEq)]
pub struct RegistrationParameters {
    /// Number of pyramid levels.
    #[config(default = "3")]
    pub number_of_levels: usize,
    /// Shrink factors per level (coarsest first), per axis; one value broadcasts.
    #[config(default = "vec![vec![4, 4, 4], vec![2, 2, 2], vec![1, 1, 1]]")]
    pub shrink_factors: Vec<Vec<usize>>,
    /// Demons iterations per level.
    #[config(default = "vec![300, 100, 30]")]
    pub iterations_per_level: Vec<usize>,
    #[config(default = "false")]
    pub use_histogram_matching: bool,
    #[config(default = "1024")]
    pub number_of_histogram_levels: usize,
    #[config(default = "7")]
    pub number_of_match_points: usize,
    /// Build histograms only from voxels above the image mean.
    #[config(default = "true")]
    pub threshold_at_mean_intensity: bool,
    /// Longest update vector in voxels; 0 disables the limit.
    #[config(default = "2.0")]
    pub maximum_update_step_length: f64,
    /// Deformation field smoothing, in voxels.
    #[config(default = "3.0")]
    pub smoothing_sigma: f64,
    /// Update field smoothing, in voxels.
    #[config(default = "0.0")]
    pub update_field_sigma: f64,
    /// Voxels whose intensity difference is below this get no force.
    #[config(default = "0.001")]
    pub intensity_difference_threshold: f64,
    #[config(default = "ForceStrategy::Symmetric")]
    pub force_strategy: ForceStrategy,
    #[config(default = "UpdateRule::Diffeomorphic")]
    pub update_rule: UpdateRule,
    /// Median pre-filter radius, per axis; empty disables it.
    #[config(default = "Vec::new()")]
    pub median_filter_radius: Vec<usize>,
    pub mask_cleanup: Option<MaskCleanup>,
    /// Value written outside the masks; the image minimum when unset.
    pub mask_background: Option<f32>,
    #[config(default = "InterpolationMode::Linear")]
    pub interpolation_mode: InterpolationMode,
    /// Return the preprocessed moving image with the result.
    #[config(default = "false")]
    pub output_normalized: bool,
    /// Checkers per axis for the fixed/warped comparison image.
    pub checkerboard_pattern: Option<Vec<usize>>,
}

impl RegistrationParameters {
    /// Checks everything that can be checked without images.
    ///
    /// Errors here are reported before any preprocessing or level work.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.shrink_factors.len() != self.number_of_levels
            || self.iterations_per_level.len() != self.number_of_levels
        {
            return Err(RegistrationError::LevelCountMismatch {
                levels: self.number_of_levels,
                shrink_factors: self.shrink_factors.len(),
                iterations: self.iterations_per_level.len(),
            });
        }
        if self.number_of_levels == 0 {
            return Err(RegistrationError::invalid_configuration("at least one level is required"));
        }
        for (level, factors) in self.shrink_factors.iter().enumerate() {
            if factors.is_empty() || factors.iter().any(|&f| f == 0) {
                return Err(RegistrationError::invalid_configuration(format!(
                    "shrink factors of level {} must be non-empty and at least 1, got {:?}",
                    level, factors
                )));
            }
        }
        self.validate_histogram()?;
        if !(self.maximum_update_step_length >= 0.0) {
            return Err(RegistrationError::invalid_configuration(format!(
                "maximum update step length must be non-negative, got {}",
                self.maximum_update_step_length
            )));
        }
        for (name, sigma) in [
            ("smoothing_sigma", self.smoothing_sigma),
            ("update_field_sigma", self.update_field_sigma),
            ("intensity_difference_threshold", self.intensity_difference_threshold),
        ] {
            if !(sigma >= 0.0) {
                return Err(RegistrationError::invalid_configuration(format!(
                    "{} must be non-negative, got {}",
                    name, sigma
                )));
            }
        }
        if let Some(pattern) = &self.checkerboard_pattern {
            if pattern.is_empty() || pattern.iter().any(|&p| p == 0) {
                return Err(RegistrationError::invalid_configuration(format!(
                    "checkerboard pattern must be non-empty and positive, got {:?}",
                    pattern
                )));
            }
        }
        if let Some(cleanup) = &self.mask_cleanup {
            if cleanup.lower > cleanup.upper {
                return Err(RegistrationError::invalid_configuration(format!(
                    "mask cleanup band is empty: [{}, {}]",
                    cleanup.lower, cleanup.upper
                )));
            }
        }
        Ok(())
    }

    /// Histogram settings are checked whether or not matching is enabled.
    pub fn validate_histogram(&self) -> crate::error::Result<()> {
        if self.number_of_histogram_levels == 0 {
            return Err(RegistrationError::invalid_histogram("number of histogram levels must be positive"));
        }
        if self.number_of_match_points == 0 {
            return Err(RegistrationError::invalid_histogram("number of match points must be positive"));
        }
        Ok(())
    }

    /// Shrink factors of `level` resolved to `D` axes.
    pub fn level_shrink_factors<const D: usize>(&self, level: usize) -> [usize; D] {
        let factors = &self.shrink_factors[level];
        std::array::from_fn(|axis| match factors.len() {
            1 => factors[0],
            _ => factors.get(axis).copied().unwrap_or(1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_consistent() {
        let params = RegistrationParameters::new();
        assert_eq!(params.number_of_levels, 3);
        assert_eq!(params.iterations_per_level, vec![300, 100, 30]);
        assert_eq!(params.force_strategy, ForceStrategy::Symmetric);
        assert_eq!(params.update_rule, UpdateRule::Diffeomorphic);
        assert_eq!(params.interpolation_mode, InterpolationMode::Linear);
        assert!(!params.output_normalized);
        assert!(params.mask_cleanup.is_none());
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_level_count_mismatch() {
        let params = RegistrationParameters::new().with_iterations_per_level(vec![10, 10]);
        assert_eq!(
            params.validate(),
            Err(RegistrationError::LevelCountMismatch {
                levels: 3,
                shrink_factors: 3,
                iterations: 2,
            })
        );
    }

    #[test]
    fn test_zero_histogram_levels_rejected_even_when_disabled() {
        let params = RegistrationParameters::new()
            .with_use_histogram_matching(false)
            .with_number_of_histogram_levels(0);
        assert!(matches!(params.validate(), Err(RegistrationError::InvalidHistogramConfig(_))));
        let params = RegistrationParameters::new().with_number_of_match_points(0);
        assert!(matches!(params.validate(), Err(RegistrationError::InvalidHistogramConfig(_))));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let zero_factor = RegistrationParameters::new()
            .with_number_of_levels(1)
            .with_shrink_factors(vec![vec![0]])
            .with_iterations_per_level(vec![1]);
        assert!(matches!(zero_factor.validate(), Err(RegistrationError::InvalidConfiguration(_))));
        let negative_step = RegistrationParameters::new().with_maximum_update_step_length(-1.0);
        assert!(negative_step.validate().is_err());
        let empty_band = RegistrationParameters::new()
            .with_mask_cleanup(Some(MaskCleanup::new(vec![0, 0, 0]).with_lower(0.9).with_upper(0.1)));
        assert!(empty_band.validate().is_err());
    }

    #[test]
    fn test_output_options_survive_save_and_load() {
        let params = RegistrationParameters::new()
            .with_interpolation_mode(InterpolationMode::NearestNeighbor)
            .with_output_normalized(true)
            .with_mask_cleanup(Some(MaskCleanup::new(vec![1, 2, 3])));
        let path = std::env::temp_dir().join(format!("demonwarp-config-{}.json", std::process::id()));
        params.save(&path).unwrap();
        let loaded = RegistrationParameters::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded.interpolation_mode, InterpolationMode::NearestNeighbor);
        assert!(loaded.output_normalized);
        assert_eq!(loaded, params);
        assert!(loaded.validate().is_ok());
    }

    #[test]
    fn test_level_shrink_factors_broadcast() {
        let params = RegistrationParameters::new()
            .with_number_of_levels(2)
            .with_shrink_factors(vec![vec![3], vec![2, 1]])
            .with_iterations_per_level(vec![1, 1]);
        assert_eq!(params.level_shrink_factors::<3>(0), [3, 3, 3]);
        assert_eq!(params.level_shrink_factors::<3>(1), [2, 1, 1]);
    }
}
