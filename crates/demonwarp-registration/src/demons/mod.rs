//! Demons iterations on a single pyramid level.
//!
//! A level is solved by repeatedly warping the moving image through the
//! current field, computing an optical-flow force from the intensity
//! difference, and folding the regularized force into the field.

pub mod force;
pub mod iterator;

pub use force::DemonsForce;
pub use iterator::{DemonsIterator, DemonsSettings, IterationState};

use burn::tensor::backend::Backend;
use demonwarp_core::image::{ForegroundMask, Image};
use demonwarp_core::transform::DeformationField;

use crate::error::Result;
use crate::progress::ProgressTracker;

/// Refines a deformation field on one pyramid level.
///
/// The multi-resolution driver only talks to this trait, so any solver that
/// honors the contract can replace the Demons loop.
pub trait LevelSolver<B: Backend, const D: usize> {
    /// # Arguments
    /// * `level` - level index, coarsest is 0
    /// * `fixed`, `moving` - level images on the same grid
    /// * `mask` - optional restriction on that grid
    /// * `field` - starting field on that grid
    /// * `iterations` - iteration budget
    /// * `progress` - receives one report per iteration; checked for cancellation
    ///
    /// # Returns
    /// The refined field, on the same grid, and a summary of the level.
    #[allow(clippy::too_many_arguments)]
    fn solve_level(
        &mut self,
        level: usize,
        fixed: &Image<B, D>,
        moving: &Image<B, D>,
        mask: Option<&ForegroundMask<B, D>>,
        field: DeformationField<B, D>,
        iterations: usize,
        progress: &ProgressTracker,
    ) -> Result<(DeformationField<B, D>, LevelReport)>;
}

/// Summary of one solved level.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelReport {
    pub level: usize,
    /// Grid size in axis order.
    pub size: Vec<usize>,
    /// Iterations actually run.
    pub iterations: usize,
    /// Mean squared difference before each update.
    pub mse_history: Vec<f64>,
    /// RMS update length, in voxels, of each update.
    pub rms_update_history: Vec<f64>,
}

impl LevelReport {
    pub fn new(level: usize, size: Vec<usize>) -> Self {
        Self {
            level,
            size,
            iterations: 0,
            mse_history: Vec::new(),
            rms_update_history: Vec::new(),
        }
    }

    pub fn initial_mse(&self) -> Option<f64> {
        self.mse_history.first().copied()
    }

    pub fn final_mse(&self) -> Option<f64> {
        self.mse_history.last().copied()
    }
}
