//! Nearest-neighbour interpolation.

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

use crate::image::axis_strides;
use super::trait_::Interpolator;

/// Picks the voxel closest to each index. Used for label and mask buffers,
/// where blending values would invent labels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestNeighborInterpolator;

impl NearestNeighborInterpolator {
    pub fn new() -> Self {
        Self
    }
}

impl<B: Backend> Interpolator<B> for NearestNeighborInterpolator {
    fn interpolate<const D: usize>(&self, data: &Tensor<B, D>, indices: Tensor<B, 2>) -> Tensor<B, 1> {
        let shape = data.dims();
        let strides = axis_strides(shape);
        let flat = data.clone().reshape([shape.iter().product::<usize>()]);

        let mut offset: Option<Tensor<B, 1, Int>> = None;
        for axis in 0..D {
            let max_index = (shape[D - 1 - axis] - 1) as f64;
            let rounded = indices
                .clone()
                .narrow(1, axis, 1)
                .squeeze::<1>(1)
                .round()
                .clamp(0.0, max_index)
                .int();
            let term = rounded * strides[axis] as i32;
            offset = Some(match offset {
                Some(acc) => acc + term,
                None => term,
            });
        }

        match offset {
            Some(offset) => flat.gather(0, offset),
            None => flat,
        }
    }
}
