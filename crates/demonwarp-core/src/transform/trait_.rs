//! Spatial transforms between physical spaces.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Maps points from one physical space to another.
///
/// When used for resampling, the transform takes points of the output grid
/// to the space of the image being sampled.
pub trait Transform<B: Backend, const D: usize> {
    /// # Arguments
    /// * `points` - `[N, D]` physical points, columns in axis order
    ///
    /// # Returns
    /// `[N, D]` transformed points
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2>;
}

/// Leaves every point where it is. Resampling through it moves data
/// between grids without deforming it.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransform;

impl<B: Backend, const D: usize> Transform<B, D> for IdentityTransform {
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        points
    }
}
