use burn::tensor::backend::Backend;
use burn::tensor::module::conv1d;
use burn::tensor::ops::ConvOptions;
use burn::tensor::Tensor;
use tracing::debug;

use crate::image::Image;
use crate::spatial::Spacing;

/// Largest kernel the filter will build along one axis.
pub const DEFAULT_MAX_KERNEL_WIDTH: usize = 32;

/// Separable Gaussian smoothing.
///
/// Sigmas are physical (millimetres) and given in axis order; a single value
/// applies to every axis. Each axis is convolved with a normalized 1D kernel
/// truncated at three standard deviations. Borders replicate the edge voxel,
/// so constant images stay constant and displacement fields do not shrink
/// towards zero at the edges.
pub struct GaussianFilter<B: Backend> {
    sigmas: Vec<f64>,
    max_kernel_width: usize,
    _b: std::marker::PhantomData<B>,
}

impl<B: Backend> GaussianFilter<B> {
    pub fn new(sigmas: Vec<f64>) -> Self {
        Self {
            sigmas,
            max_kernel_width: DEFAULT_MAX_KERNEL_WIDTH,
            _b: std::marker::PhantomData,
        }
    }

    /// Same width in voxels along every axis of a grid with the given spacing.
    pub fn from_voxel_sigma<const D: usize>(sigma: f64, spacing: &Spacing<D>) -> Self {
        Self::new((0..D).map(|axis| sigma * spacing[axis]).collect())
    }

    /// Caps the kernel width (`2 * radius + 1`).
    pub fn with_max_kernel_width(mut self, width: usize) -> Self {
        self.max_kernel_width = width.max(1);
        self
    }

    pub fn apply<const D: usize>(&self, image: &Image<B, D>) -> Image<B, D> {
        image.with_data(self.apply_tensor(image.data().clone(), image.spacing()))
    }

    /// Smooths a `[z, y, x]` buffer whose voxels have the given spacing.
    pub fn apply_tensor<const D: usize>(&self, input: Tensor<B, D>, spacing: &Spacing<D>) -> Tensor<B, D> {
        let mut data = input;
        for axis in 0..D {
            let sigma = self.sigma(axis);
            if sigma <= 1e-6 {
                continue;
            }
            let voxel_sigma = sigma / spacing[axis];
            let wanted = (3.0 * voxel_sigma).ceil() as usize;
            let radius = wanted.min((self.max_kernel_width.saturating_sub(1)) / 2);
            if radius < wanted {
                debug!("Gaussian kernel along axis {} truncated to radius {} (sigma {:.2} voxels)", axis, radius, voxel_sigma);
            }
            if radius == 0 {
                continue;
            }
            let kernel = gaussian_kernel(voxel_sigma, radius);
            data = convolve_along(data, &kernel, D - 1 - axis);
        }
        data
    }

    fn sigma(&self, axis: usize) -> f64 {
        match self.sigmas.len() {
            0 => 0.0,
            1 => self.sigmas[0],
            _ => self.sigmas.get(axis).copied().unwrap_or(0.0),
        }
    }
}

/// Normalized samples of `exp(-x^2 / 2 sigma^2)` for `x` in `-radius..=radius`.
fn gaussian_kernel(sigma: f64, radius: usize) -> Vec<f32> {
    let two_sigma2 = 2.0 * sigma * sigma;
    let raw: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-x * x / two_sigma2).exp()
        })
        .collect();
    let sum: f64 = raw.iter().sum();
    raw.into_iter().map(|v| (v / sum) as f32).collect()
}

/// Convolves every line of `input` along tensor dimension `dim`.
fn convolve_along<B: Backend, const D: usize>(input: Tensor<B, D>, kernel: &[f32], dim: usize) -> Tensor<B, D> {
    let device = input.device();
    let radius = kernel.len() / 2;

    // Bring the target dimension last, then fold the rest into a batch.
    let swapped = input.swap_dims(dim, D - 1);
    let swapped_dims = swapped.dims();
    let length = swapped_dims[D - 1];
    let batch = swapped_dims.iter().product::<usize>() / length;
    let lines = swapped.reshape([batch, 1, length]);

    let first = lines.clone().narrow(2, 0, 1).repeat_dim(2, radius);
    let last = lines.clone().narrow(2, length - 1, 1).repeat_dim(2, radius);
    let padded = Tensor::cat(vec![first, lines, last], 2);

    let weights = Tensor::<B, 1>::from_floats(kernel, &device).reshape([1, 1, kernel.len()]);
    let smoothed = conv1d(padded, weights, None, ConvOptions::new([1], [0], [1], 1));

    smoothed.reshape(swapped_dims).swap_dims(dim, D - 1)
}
