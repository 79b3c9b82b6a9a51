use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor};
use demonwarp_core::filter::GradientFilter;
use demonwarp_core::image::{ForegroundMask, Image};
use demonwarp_core::transform::DeformationField;
use tracing::{debug, info};

use crate::config::{ForceStrategy, RegistrationParameters, UpdateRule};
use crate::error::{RegistrationError, Result};
use crate::progress::ProgressTracker;
use super::force::DemonsForce;
use super::{LevelReport, LevelSolver};

/// Smoothing sigmas at or below this many voxels are skipped.
pub const MIN_SMOOTHING_SIGMA: f64 = 0.1;

/// Per-iteration settings of the Demons loop.
#[derive(Debug, Clone, PartialEq)]
pub struct DemonsSettings {
    /// Longest update vector in voxels; 0 disables the limit.
    pub maximum_update_step_length: f64,
    /// Deformation field smoothing, voxels.
    pub smoothing_sigma: f64,
    /// Update field smoothing, voxels.
    pub update_field_sigma: f64,
    pub intensity_difference_threshold: f64,
    pub force_strategy: ForceStrategy,
    pub update_rule: UpdateRule,
}

impl DemonsSettings {
    pub fn from_parameters(params: &RegistrationParameters) -> Self {
        Self {
            maximum_update_step_length: params.maximum_update_step_length,
            smoothing_sigma: params.smoothing_sigma,
            update_field_sigma: params.update_field_sigma,
            intensity_difference_threshold: params.intensity_difference_threshold,
            force_strategy: params.force_strategy,
            update_rule: params.update_rule,
        }
    }
}

impl Default for DemonsSettings {
    fn default() -> Self {
        Self::from_parameters(&RegistrationParameters::new())
    }
}

/// Where the solver is within a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationState {
    Ready,
    Iterating { level: usize, iteration: usize },
    IterationBudgetExhausted { level: usize },
}

/// Runs a fixed number of Demons iterations per level.
///
/// There is no convergence test: every level uses its whole budget unless
/// the run is cancelled.
#[derive(Debug, Clone)]
pub struct DemonsIterator {
    settings: DemonsSettings,
    force: DemonsForce,
    state: IterationState,
}

impl DemonsIterator {
    pub fn new(settings: DemonsSettings) -> Self {
        let force = DemonsForce::new(settings.force_strategy, settings.intensity_difference_threshold);
        Self {
            settings,
            force,
            state: IterationState::Ready,
        }
    }

    pub fn from_parameters(params: &RegistrationParameters) -> Self {
        Self::new(DemonsSettings::from_parameters(params))
    }

    pub fn settings(&self) -> &DemonsSettings {
        &self.settings
    }

    pub fn state(&self) -> IterationState {
        self.state
    }

    /// One Demons iteration.
    ///
    /// # Returns
    /// The new field, the error before the update and the RMS update length
    /// in voxels.
    pub fn step<B: Backend, const D: usize>(
        &self,
        fixed: &Image<B, D>,
        moving: &Image<B, D>,
        fixed_gradient: Option<&[Tensor<B, D>]>,
        mask: Option<&ForegroundMask<B, D>>,
        field: &DeformationField<B, D>,
    ) -> (DeformationField<B, D>, f64, f64) {
        let warped = field.warp_image(moving);
        let output = self.force.compute(fixed, &warped, fixed_gradient, mask);

        let mut update = self.limit_step(output.update);
        if let Some(mask) = mask {
            update = update.mask(mask);
        }
        if self.settings.update_field_sigma > MIN_SMOOTHING_SIGMA {
            update = update.smooth(self.settings.update_field_sigma);
        }
        let rms_update = rms(&update);

        let mut next = match self.settings.update_rule {
            UpdateRule::Diffeomorphic => field.compose(&update.exponential()),
            UpdateRule::Additive => field.add(&update),
        };
        if self.settings.smoothing_sigma > MIN_SMOOTHING_SIGMA {
            next = next.smooth(self.settings.smoothing_sigma);
        }
        if let Some(mask) = mask {
            next = next.mask(mask);
        }
        (next, output.mse, rms_update)
    }

    /// Shortens every vector longer than the maximum step, in voxels.
    fn limit_step<B: Backend, const D: usize>(&self, update: DeformationField<B, D>) -> DeformationField<B, D> {
        let max_step = self.settings.maximum_update_step_length;
        if max_step <= 0.0 {
            return update;
        }
        let factor = update.voxel_norms().clamp_min(max_step).recip() * max_step as f32;
        let geometry = update.geometry().clone();
        let components = update
            .into_components()
            .into_iter()
            .map(|c| c * factor.clone())
            .collect();
        DeformationField::from_components(components, geometry)
    }
}

impl<B: Backend, const D: usize> LevelSolver<B, D> for DemonsIterator {
    fn solve_level(
        &mut self,
        level: usize,
        fixed: &Image<B, D>,
        moving: &Image<B, D>,
        mask: Option<&ForegroundMask<B, D>>,
        field: DeformationField<B, D>,
        iterations: usize,
        progress: &ProgressTracker,
    ) -> Result<(DeformationField<B, D>, LevelReport)> {
        let mut report = LevelReport::new(level, fixed.size().to_vec());
        let fixed_gradient = self
            .force
            .uses_fixed_gradient()
            .then(|| GradientFilter::new().apply(fixed));

        info!("Level {}: {} iterations on grid {:?}", level, iterations, fixed.size());
        self.state = IterationState::Iterating { level, iteration: 0 };
        let mut field = field;
        for iteration in 1..=iterations {
            if progress.is_cancelled() {
                self.state = IterationState::Ready;
                return Err(RegistrationError::Cancelled { level, iteration });
            }
            self.state = IterationState::Iterating { level, iteration };

            let (next, mse, rms_update) = self.step(fixed, moving, fixed_gradient.as_deref(), mask, &field);
            field = next;

            debug!("Level {} iteration {}: MSE {:.6}, RMS update {:.4}", level, iteration, mse, rms_update);
            progress.update(level, iteration, Some(iterations), mse, rms_update);
            report.mse_history.push(mse);
            report.rms_update_history.push(rms_update);
            report.iterations = iteration;
        }
        self.state = IterationState::IterationBudgetExhausted { level };
        Ok((field, report))
    }
}

fn rms<B: Backend, const D: usize>(field: &DeformationField<B, D>) -> f64 {
    let norms = field.voxel_norms();
    (norms.clone() * norms).mean().into_scalar().elem::<f64>().sqrt()
}
