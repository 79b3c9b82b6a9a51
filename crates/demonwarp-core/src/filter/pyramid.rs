use burn::tensor::backend::Backend;

use crate::image::{ForegroundMask, Image};
use super::downsample::DownsampleFilter;
use super::gaussian::GaussianFilter;

/// Coarse-to-fine image pyramid.
///
/// Level `i` is the input smoothed and subsampled by `shrink_factors[i]`.
/// Levels are listed coarsest first.
pub struct MultiResolutionPyramid<B: Backend, const D: usize> {
    images: Vec<Image<B, D>>,
}

impl<B: Backend, const D: usize> MultiResolutionPyramid<B, D> {
    /// # Arguments
    /// * `input` - full-resolution image
    /// * `shrink_factors` - per level, per axis (a single value broadcasts)
    pub fn new(input: &Image<B, D>, shrink_factors: &[Vec<usize>]) -> Self {
        let images = shrink_factors
            .iter()
            .map(|factors| Self::build_level(input, factors))
            .collect();
        Self { images }
    }

    /// One pyramid level.
    ///
    /// Every axis with factor `f > 1` is smoothed with a Gaussian of
    /// `0.5 * f` voxels before subsampling; axes with `f == 1` are left
    /// untouched. The output has `ceil(n / f)` voxels and `f` times the
    /// spacing along each axis.
    pub fn build_level(image: &Image<B, D>, shrink_factors: &[usize]) -> Image<B, D> {
        let downsample = DownsampleFilter::new(shrink_factors.to_vec());
        let factors = downsample.axis_factors::<D>();
        if factors.iter().all(|&f| f == 1) {
            return image.clone();
        }
        let sigmas = (0..D)
            .map(|axis| {
                let f = factors[axis];
                if f > 1 {
                    0.5 * f as f64 * image.spacing()[axis]
                } else {
                    0.0
                }
            })
            .collect();
        let smoothed = GaussianFilter::new(sigmas).apply(image);
        downsample.apply(&smoothed)
    }

    /// Masks are subsampled without smoothing so they stay binary.
    pub fn build_mask_level(mask: &ForegroundMask<B, D>, shrink_factors: &[usize]) -> ForegroundMask<B, D> {
        let shrunk = DownsampleFilter::new(shrink_factors.to_vec()).apply(mask.image());
        ForegroundMask::from_image(&shrunk)
    }

    pub fn get_level(&self, level: usize) -> &Image<B, D> {
        &self.images[level]
    }

    pub fn levels(&self) -> usize {
        self.images.len()
    }
}
