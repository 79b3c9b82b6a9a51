use burn::tensor::backend::Backend;
use demonwarp_core::filter::MultiResolutionPyramid;
use demonwarp_core::image::{ForegroundMask, Image};
use demonwarp_core::interpolation::NearestNeighborInterpolator;
use demonwarp_core::transform::DeformationField;
use tracing::info;

use crate::config::{InterpolationMode, RegistrationParameters};
use crate::demons::{LevelReport, LevelSolver};
use crate::error::{RegistrationError, Result};
use crate::progress::ProgressTracker;
use crate::validation::{validate_mask, validate_same_grid};

/// Output of a registration run.
#[derive(Debug, Clone)]
pub struct PipelineResult<B: Backend, const D: usize> {
    /// Displacements on the fixed grid, physical units.
    pub field: DeformationField<B, D>,
    /// Moving image warped onto the fixed grid.
    pub warped: Image<B, D>,
    /// Fixed image minimum before any preprocessing.
    pub fixed_min: f64,
    /// Moving image minimum before any preprocessing.
    pub moving_min: f64,
    /// One report per level, coarsest first.
    pub reports: Vec<LevelReport>,
    /// Fixed and warped images interleaved, when requested.
    pub checkerboard: Option<Image<B, D>>,
    /// Moving image after preprocessing, on the fixed grid, when requested.
    pub normalized_moving: Option<Image<B, D>>,
}

/// Coarse-to-fine driver around a [`LevelSolver`].
///
/// Both images are reduced into pyramids with the same schedule. Level 0
/// starts from a zero field (or the given initial field), and every later
/// level starts from the previous result upsampled onto its grid.
pub struct MultiResolutionRegistrator<S> {
    solver: S,
    number_of_levels: usize,
    shrink_factors: Vec<Vec<usize>>,
    iterations_per_level: Vec<usize>,
    interpolation_mode: InterpolationMode,
    progress: ProgressTracker,
}

impl<S> MultiResolutionRegistrator<S> {
    pub fn new(solver: S, params: &RegistrationParameters) -> Self {
        Self {
            solver,
            number_of_levels: params.number_of_levels,
            shrink_factors: params.shrink_factors.clone(),
            iterations_per_level: params.iterations_per_level.clone(),
            interpolation_mode: params.interpolation_mode,
            progress: ProgressTracker::new(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressTracker) -> Self {
        self.progress = progress;
        self
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    pub fn into_solver(self) -> S {
        self.solver
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    pub fn number_of_levels(&self) -> usize {
        self.number_of_levels
    }

    fn check_schedule(&self) -> Result<()> {
        if self.shrink_factors.len() != self.number_of_levels || self.iterations_per_level.len() != self.number_of_levels {
            return Err(RegistrationError::LevelCountMismatch {
                levels: self.number_of_levels,
                shrink_factors: self.shrink_factors.len(),
                iterations: self.iterations_per_level.len(),
            });
        }
        Ok(())
    }

    /// Registers `moving` to `fixed`.
    ///
    /// # Arguments
    /// * `fixed`, `moving` - images on the same grid
    /// * `mask` - optional restriction on that grid
    /// * `initial_field` - optional starting field on any grid
    ///
    /// # Errors
    /// Schedule and geometry problems are reported before any level runs.
    pub fn register<B: Backend, const D: usize>(
        &mut self,
        fixed: &Image<B, D>,
        moving: &Image<B, D>,
        mask: Option<&ForegroundMask<B, D>>,
        initial_field: Option<&DeformationField<B, D>>,
    ) -> Result<PipelineResult<B, D>>
    where
        S: LevelSolver<B, D>,
    {
        self.check_schedule()?;
        validate_same_grid("registration", fixed, moving)?;
        validate_mask("registration", fixed.geometry(), mask)?;

        let fixed_pyramid = MultiResolutionPyramid::new(fixed, &self.shrink_factors);
        let moving_pyramid = MultiResolutionPyramid::new(moving, &self.shrink_factors);

        self.progress.start();
        let mut field: Option<DeformationField<B, D>> = None;
        let mut reports = Vec::with_capacity(self.number_of_levels);
        for level in 0..self.number_of_levels {
            let fixed_level = fixed_pyramid.get_level(level);
            let moving_level = moving_pyramid.get_level(level);
            let mask_level = mask.map(|m| MultiResolutionPyramid::build_mask_level(m, &self.shrink_factors[level]));

            let mut start = match (field.take(), initial_field) {
                (Some(previous), _) => previous.resample(fixed_level.geometry()),
                (None, Some(initial)) => initial.resample(fixed_level.geometry()),
                (None, None) => DeformationField::zeros(fixed_level.geometry().clone(), &fixed_level.device()),
            };
            if let Some(mask) = &mask_level {
                start = start.mask(mask);
            }

            info!(
                "Starting level {}/{} with shrink factors {:?}, iters={}",
                level + 1,
                self.number_of_levels,
                self.shrink_factors[level],
                self.iterations_per_level[level]
            );
            info!("  Level size: {:?}", fixed_level.size());
            self.progress.start_level(level, &fixed_level.size());

            let solved = self.solver.solve_level(
                level,
                fixed_level,
                moving_level,
                mask_level.as_ref(),
                start,
                self.iterations_per_level[level],
                &self.progress,
            );
            let (level_field, report) = match solved {
                Ok(solved) => solved,
                Err(error) => {
                    self.progress.error(&error.to_string());
                    return Err(error);
                }
            };
            field = Some(level_field);
            reports.push(report);
        }

        let mut field = field
            .map(|f| f.resample(fixed.geometry()))
            .unwrap_or_else(|| DeformationField::zeros(fixed.geometry().clone(), &fixed.device()));
        if let Some(mask) = mask {
            field = field.mask(mask);
        }
        let warped = match self.interpolation_mode {
            InterpolationMode::Linear => field.warp_image(moving),
            InterpolationMode::NearestNeighbor => field.warp_with(moving, &NearestNeighborInterpolator::new()),
        };
        self.progress.complete();

        Ok(PipelineResult {
            field,
            warped,
            fixed_min: fixed.min_value(),
            moving_min: moving.min_value(),
            reports,
            checkerboard: None,
            normalized_moving: None,
        })
    }
}
