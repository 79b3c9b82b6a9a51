use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::image::Image;
use crate::spatial::Direction;

/// Central-difference gradient in physical coordinates.
///
/// Along each grid axis the derivative is `(I[i+1] - I[i-1]) / 2h`, with the
/// edge voxel replicated at the borders (so the one-sided difference is
/// halved there). The per-axis derivatives are then rotated by the image
/// direction, giving one buffer per physical axis.
#[derive(Debug, Clone, Copy, Default)]
pub struct GradientFilter;

impl GradientFilter {
    pub fn new() -> Self {
        Self
    }

    /// # Returns
    /// `D` buffers shaped like the image, component `a` holding `dI/dp_a`.
    ///
    /// # Panics
    /// Panics if the image direction is singular.
    pub fn apply<B: Backend, const D: usize>(&self, image: &Image<B, D>) -> Vec<Tensor<B, D>> {
        let spacing = image.spacing();
        let index_derivatives: Vec<Tensor<B, D>> = (0..D)
            .map(|axis| central_difference(image.data().clone(), D - 1 - axis) * (0.5 / spacing[axis]) as f32)
            .collect();

        let direction = image.direction();
        if direction.approx_eq(&Direction::identity(), 0.0) {
            return index_derivatives;
        }
        let inverse = direction
            .try_inverse()
            .expect("direction matrix must be invertible");
        (0..D)
            .map(|physical| {
                index_derivatives
                    .iter()
                    .enumerate()
                    .map(|(axis, d)| d.clone() * inverse[(axis, physical)] as f32)
                    .reduce(|acc, term| acc + term)
                    .unwrap_or_else(|| image.data().zeros_like())
            })
            .collect()
    }
}

/// `I[i+1] - I[i-1]` along tensor dimension `dim`, edges replicated.
fn central_difference<B: Backend, const D: usize>(data: Tensor<B, D>, dim: usize) -> Tensor<B, D> {
    let n = data.dims()[dim];
    if n < 2 {
        return data.zeros_like();
    }
    let first = data.clone().narrow(dim, 0, 1);
    let last = data.clone().narrow(dim, n - 1, 1);
    let forward = Tensor::cat(vec![data.clone().narrow(dim, 1, n - 1), last], dim);
    let backward = Tensor::cat(vec![first, data.narrow(dim, 0, n - 1)], dim);
    forward - backward
}
