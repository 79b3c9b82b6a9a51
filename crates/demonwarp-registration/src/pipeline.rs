//! End-to-end registration: preprocessing followed by the multi-resolution solve.

use burn::tensor::backend::Backend;
use demonwarp_core::filter::CheckerboardFilter;
use demonwarp_core::image::{ForegroundMask, Image};
use demonwarp_core::transform::DeformationField;
use tracing::info;

use crate::config::RegistrationParameters;
use crate::demons::{DemonsIterator, LevelSolver};
use crate::error::Result;
use crate::mask::{ForegroundMasker, Maskable};
use crate::multires::{MultiResolutionRegistrator, PipelineResult};
use crate::normalize::{HistogramMatcher, Normalizable};
use crate::preprocess::Preprocessor;
use crate::progress::ProgressTracker;

/// Preprocessor and coarse-to-fine registrator run back to back.
///
/// The parameters are validated once, in the constructor, so a pipeline that
/// exists is always runnable.
pub struct RegistrationPipeline<N = HistogramMatcher, M = ForegroundMasker, S = DemonsIterator> {
    preprocessor: Preprocessor<N, M>,
    registrator: MultiResolutionRegistrator<S>,
    checkerboard_pattern: Option<Vec<usize>>,
    output_normalized: bool,
}

impl RegistrationPipeline {
    /// Histogram matching, BOBF masking and the Demons solver, as configured in `params`.
    ///
    /// # Errors
    /// Any problem [`RegistrationParameters::validate`] finds.
    pub fn new(params: &RegistrationParameters) -> Result<Self> {
        params.validate()?;
        Self::from_parts(
            Preprocessor::from_parameters(params)?,
            MultiResolutionRegistrator::new(DemonsIterator::from_parameters(params), params),
            params,
        )
    }
}

impl<N: Normalizable, M: Maskable, S> RegistrationPipeline<N, M, S> {
    /// Assembles a pipeline from custom stages.
    pub fn from_parts(
        preprocessor: Preprocessor<N, M>,
        registrator: MultiResolutionRegistrator<S>,
        params: &RegistrationParameters,
    ) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            preprocessor,
            registrator,
            checkerboard_pattern: params.checkerboard_pattern.clone(),
            output_normalized: params.output_normalized,
        })
    }

    pub fn with_progress(mut self, progress: ProgressTracker) -> Self {
        self.registrator = self.registrator.with_progress(progress);
        self
    }

    pub fn progress(&self) -> &ProgressTracker {
        self.registrator.progress()
    }

    pub fn preprocessor(&self) -> &Preprocessor<N, M> {
        &self.preprocessor
    }

    pub fn registrator(&self) -> &MultiResolutionRegistrator<S> {
        &self.registrator
    }

    /// Registers `moving` onto `fixed`.
    ///
    /// The moving image may live on any grid; everything after preprocessing
    /// happens on the fixed grid. The two masks are intersected there.
    pub fn run<B: Backend, const D: usize>(
        &mut self,
        fixed: &Image<B, D>,
        moving: &Image<B, D>,
        fixed_mask: Option<&ForegroundMask<B, D>>,
        moving_mask: Option<&ForegroundMask<B, D>>,
        initial_field: Option<&DeformationField<B, D>>,
    ) -> Result<PipelineResult<B, D>>
    where
        S: LevelSolver<B, D>,
    {
        info!("Preprocessing fixed {} and moving {}", fixed.geometry(), moving.geometry());
        let prepared = match self.preprocessor.prepare(fixed, moving, fixed_mask, moving_mask) {
            Ok(prepared) => prepared,
            Err(error) => {
                self.registrator.progress().error(&error.to_string());
                return Err(error);
            }
        };

        let mask = match (&prepared.fixed_mask, &prepared.moving_mask) {
            (Some(f), Some(m)) => Some(f.intersect(m)),
            (Some(only), None) | (None, Some(only)) => Some(only.clone()),
            (None, None) => None,
        };
        if let Some(mask) = &mask {
            info!("Registering within {} mask voxels", mask.count());
        }

        let mut result = self
            .registrator
            .register(&prepared.fixed, &prepared.moving, mask.as_ref(), initial_field)?;
        result.fixed_min = prepared.fixed_min;
        result.moving_min = prepared.moving_min;

        if let Some(pattern) = &self.checkerboard_pattern {
            result.checkerboard = Some(CheckerboardFilter::new(pattern.clone()).apply(&prepared.fixed, &result.warped));
        }
        if self.output_normalized {
            result.normalized_moving = Some(prepared.moving);
        }
        Ok(result)
    }
}
