use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor};
use demonwarp_core::filter::GradientFilter;
use demonwarp_core::image::{ForegroundMask, Image};
use demonwarp_core::transform::DeformationField;

use crate::config::ForceStrategy;

/// Denominators below this produce no force.
pub const DENOMINATOR_EPSILON: f64 = 1e-9;

/// Thirion's demons force with a selectable gradient.
///
/// For `diff = F - W` and gradient `g`, the update at each voxel is
/// `diff * g / (|g|^2 + diff^2 / K)` where `K` is the mean squared spacing.
/// Voxels with `|diff|` below the threshold, or a denominator below
/// [`DENOMINATOR_EPSILON`], get a zero vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DemonsForce {
    strategy: ForceStrategy,
    intensity_difference_threshold: f64,
}

/// Force field and the matching error of the image pair it came from.
pub struct ForceOutput<B: Backend, const D: usize> {
    pub update: DeformationField<B, D>,
    /// Mean squared difference, over the mask when one is given.
    pub mse: f64,
}

impl DemonsForce {
    pub fn new(strategy: ForceStrategy, intensity_difference_threshold: f64) -> Self {
        Self {
            strategy,
            intensity_difference_threshold,
        }
    }

    pub fn strategy(&self) -> ForceStrategy {
        self.strategy
    }

    /// Whether [`compute`](Self::compute) needs the fixed image gradient.
    pub fn uses_fixed_gradient(&self) -> bool {
        self.strategy != ForceStrategy::WarpedMoving
    }

    /// # Arguments
    /// * `fixed` - fixed image of the level
    /// * `warped` - moving image warped through the current field, same grid
    /// * `fixed_gradient` - gradient of `fixed`; required unless the strategy
    ///   is [`ForceStrategy::WarpedMoving`]
    /// * `mask` - restricts the error measurement
    pub fn compute<B: Backend, const D: usize>(
        &self,
        fixed: &Image<B, D>,
        warped: &Image<B, D>,
        fixed_gradient: Option<&[Tensor<B, D>]>,
        mask: Option<&ForegroundMask<B, D>>,
    ) -> ForceOutput<B, D> {
        let diff = fixed.data().clone() - warped.data().clone();
        let squared = diff.clone() * diff.clone();
        let mse = match mask {
            Some(mask) => {
                let inside = mask.count().max(1) as f64;
                (squared.clone() * mask.data().clone()).sum().into_scalar().elem::<f64>() / inside
            }
            None => squared.clone().mean().into_scalar().elem::<f64>(),
        };

        let gradient = self.gradient(warped, fixed_gradient);
        let normalizer = fixed.spacing().mean_squared();
        let gradient_squared = gradient
            .iter()
            .map(|g| g.clone() * g.clone())
            .reduce(|acc, g2| acc + g2)
            .unwrap_or_else(|| diff.zeros_like());
        let denominator = gradient_squared + squared / normalizer as f32;

        let degenerate = denominator.clone().lower_elem(DENOMINATOR_EPSILON);
        let below_threshold = diff.clone().abs().lower_elem(self.intensity_difference_threshold);
        let ratio = (diff / denominator.mask_fill(degenerate.clone(), 1.0))
            .mask_fill(degenerate, 0.0)
            .mask_fill(below_threshold, 0.0);

        let components = gradient.into_iter().map(|g| ratio.clone() * g).collect();
        ForceOutput {
            update: DeformationField::from_components(components, fixed.geometry().clone()),
            mse,
        }
    }

    fn gradient<B: Backend, const D: usize>(&self, warped: &Image<B, D>, fixed_gradient: Option<&[Tensor<B, D>]>) -> Vec<Tensor<B, D>> {
        let filter = GradientFilter::new();
        match (self.strategy, fixed_gradient) {
            (ForceStrategy::WarpedMoving, _) => filter.apply(warped),
            (ForceStrategy::FixedImage, Some(fixed)) => fixed.to_vec(),
            (ForceStrategy::Symmetric, Some(fixed)) => filter
                .apply(warped)
                .into_iter()
                .zip(fixed)
                .map(|(w, f)| (w + f.clone()) * 0.5)
                .collect(),
            // Without a cached fixed gradient fall back to the warped image alone.
            (_, None) => filter.apply(warped),
        }
    }
}
