use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

use crate::image::Image;

/// Integer subsampling.
///
/// Keeps every `f`-th voxel along each axis starting at index 0, so an axis
/// of `n` voxels becomes `ceil(n / f)` voxels. The origin is unchanged and
/// the spacing grows by `f`. Factors are in axis order; a single factor
/// applies to every axis and a factor of 1 leaves the axis untouched.
pub struct DownsampleFilter<B: Backend> {
    factors: Vec<usize>,
    _b: std::marker::PhantomData<B>,
}

impl<B: Backend> DownsampleFilter<B> {
    pub fn new(factors: Vec<usize>) -> Self {
        Self {
            factors,
            _b: std::marker::PhantomData,
        }
    }

    /// Factors resolved per axis.
    pub fn axis_factors<const D: usize>(&self) -> [usize; D] {
        std::array::from_fn(|axis| {
            let f = match self.factors.len() {
                0 => 1,
                1 => self.factors[0],
                _ => self.factors.get(axis).copied().unwrap_or(1),
            };
            f.max(1)
        })
    }

    pub fn apply<const D: usize>(&self, image: &Image<B, D>) -> Image<B, D> {
        let factors = self.axis_factors::<D>();
        let device = image.device();
        let mut data = image.data().clone();
        for (axis, &factor) in factors.iter().enumerate() {
            if factor == 1 {
                continue;
            }
            let dim = D - 1 - axis;
            let kept = data.dims()[dim].div_ceil(factor);
            let indices = Tensor::<B, 1, Int>::arange_step(0..(kept * factor) as i64, factor, &device);
            data = data.select(dim, indices);
        }
        Image::from_geometry(data, image.geometry().shrink(&factors))
    }
}
