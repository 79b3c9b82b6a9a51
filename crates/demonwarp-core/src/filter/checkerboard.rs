use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor, TensorData};

use crate::image::Image;

/// Interleaves two images on the same grid in a checkerboard.
///
/// Each axis is cut into `pattern[a]` checkers of `size / pattern` voxels
/// (a single value applies to every axis). Checkers whose summed index is
/// even show the first image, the others the second.
pub struct CheckerboardFilter {
    pattern: Vec<usize>,
}

impl CheckerboardFilter {
    pub fn new(pattern: Vec<usize>) -> Self {
        Self { pattern }
    }

    /// # Panics
    /// Panics if the images live on different grids.
    pub fn apply<B: Backend, const D: usize>(&self, first: &Image<B, D>, second: &Image<B, D>) -> Image<B, D> {
        assert!(
            first.geometry().matches(second.geometry()),
            "checkerboard inputs must share a grid"
        );
        let size = first.size();
        let pattern: [usize; D] = std::array::from_fn(|axis| {
            let p = match self.pattern.len() {
                0 => 1,
                1 => self.pattern[0],
                _ => self.pattern.get(axis).copied().unwrap_or(1),
            };
            p.clamp(1, size[axis].max(1))
        });

        let selector: Vec<bool> = first
            .geometry()
            .index_grid::<B>(&first.device())
            .into_data()
            .iter::<f32>()
            .collect::<Vec<_>>()
            .chunks(D)
            .map(|index| {
                let parity: usize = (0..D)
                    .map(|axis| index[axis] as usize * pattern[axis] / size[axis])
                    .sum();
                parity % 2 == 1
            })
            .collect();
        let use_second = Tensor::<B, D, burn::tensor::Bool>::from_data(
            TensorData::new(selector, Shape::new(first.shape())),
            &first.device(),
        );
        first.with_data(first.data().clone().mask_where(use_second, second.data().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use crate::image::ImageGeometry;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_two_by_two_checkerboard() {
        let device = Default::default();
        let geometry = ImageGeometry::<2>::with_size([4, 4]);
        let zeros = Image::<TestBackend, 2>::from_vec(vec![0.0; 16], geometry.clone(), &device);
        let ones = Image::<TestBackend, 2>::from_vec(vec![1.0; 16], geometry, &device);
        let board = CheckerboardFilter::new(vec![2]).apply(&zeros, &ones).to_vec();
        #[rustfmt::skip]
        let expected = vec![
            0.0, 0.0, 1.0, 1.0,
            0.0, 0.0, 1.0, 1.0,
            1.0, 1.0, 0.0, 0.0,
            1.0, 1.0, 0.0, 0.0,
        ];
        assert_eq!(board, expected);
    }

    #[test]
    fn test_pattern_of_one_returns_first() {
        let device = Default::default();
        let geometry = ImageGeometry::<3>::with_size([3, 2, 2]);
        let a = Image::<TestBackend, 3>::from_vec(vec![5.0; 12], geometry.clone(), &device);
        let b = Image::<TestBackend, 3>::from_vec(vec![9.0; 12], geometry, &device);
        assert_eq!(CheckerboardFilter::new(vec![1]).apply(&a, &b).to_vec(), vec![5.0; 12]);
    }
}
