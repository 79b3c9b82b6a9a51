//! Interpolator trait for sampling voxel buffers at continuous indices.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Samples a voxel buffer at continuous indices.
///
/// Indices outside the buffer are clamped to the nearest edge voxel, so
/// sampling never fails; callers that need a fill value for out-of-grid
/// points mask them afterwards.
pub trait Interpolator<B: Backend> {
    /// # Arguments
    /// * `data` - buffer laid out `[z, y, x]` (or `[y, x]`)
    /// * `indices` - `[N, D]` continuous indices, columns in axis order (x, y, z)
    ///
    /// # Returns
    /// `[N]` sampled values
    fn interpolate<const D: usize>(&self, data: &Tensor<B, D>, indices: Tensor<B, 2>) -> Tensor<B, 1>;
}
