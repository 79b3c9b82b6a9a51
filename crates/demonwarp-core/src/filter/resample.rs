//! Resampling onto a target grid.

use std::marker::PhantomData;

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::image::{Image, ImageGeometry};
use crate::interpolation::Interpolator;
use crate::transform::Transform;

/// Resamples an image onto a target grid.
///
/// Every target voxel centre is mapped through `transform` into the physical
/// space of the input, converted to a continuous input index and
/// interpolated. The transform therefore maps output space to input space.
///
/// Without a default pixel value, samples beyond the input grid take the
/// nearest edge value. With one, any sample more than half a voxel outside
/// the input grid is set to it.
pub struct ResampleImageFilter<B, T, I, const D: usize>
where
    B: Backend,
    T: Transform<B, D>,
    I: Interpolator<B>,
{
    output: ImageGeometry<D>,
    transform: T,
    interpolator: I,
    default_pixel_value: Option<f64>,
    _phantom: PhantomData<B>,
}

impl<B, T, I, const D: usize> ResampleImageFilter<B, T, I, D>
where
    B: Backend,
    T: Transform<B, D>,
    I: Interpolator<B>,
{
    pub fn new(output: ImageGeometry<D>, transform: T, interpolator: I) -> Self {
        Self {
            output,
            transform,
            interpolator,
            default_pixel_value: None,
            _phantom: PhantomData,
        }
    }

    /// Output on the grid of `reference`.
    pub fn new_from_reference(reference: &Image<B, D>, transform: T, interpolator: I) -> Self {
        Self::new(reference.geometry().clone(), transform, interpolator)
    }

    /// Value for samples that fall outside the input grid.
    pub fn with_default_pixel_value(mut self, value: f64) -> Self {
        self.default_pixel_value = Some(value);
        self
    }

    pub fn output_geometry(&self) -> &ImageGeometry<D> {
        &self.output
    }

    pub fn apply(&self, input: &Image<B, D>) -> Image<B, D> {
        let device = input.device();
        let output_points = self.output.physical_grid::<B>(&device);
        let input_points = self.transform.transform_points(output_points);
        let input_indices = input.world_to_index_tensor(input_points);

        let mut values = self.interpolator.interpolate(input.data(), input_indices.clone());
        if let Some(fill) = self.default_pixel_value {
            values = values.mask_fill(outside_grid(input_indices, input.size()), fill as f32);
        }

        Image::from_geometry(values.reshape(self.output.shape()), self.output.clone())
    }
}

/// `true` for rows of `indices` more than half a voxel outside `size`.
fn outside_grid<B: Backend, const D: usize>(
    indices: Tensor<B, 2>,
    size: [usize; D],
) -> Tensor<B, 1, burn::tensor::Bool> {
    let [count, _] = indices.dims();
    let device = indices.device();
    let mut outside = Tensor::<B, 1>::zeros([count], &device);
    for (axis, &extent) in size.iter().enumerate() {
        let coord = indices.clone().narrow(1, axis, 1).squeeze::<1>(1);
        let below = coord.clone().lower_elem(-0.5).float();
        let above = coord.greater_elem(extent as f64 - 0.5).float();
        outside = outside + below + above;
    }
    outside.greater_elem(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use crate::interpolation::{LinearInterpolator, NearestNeighborInterpolator};
    use crate::spatial::{Direction, Point, Spacing, Vector};
    use crate::transform::{IdentityTransform, TranslationTransform};

    type TestBackend = NdArray<f32>;

    fn square() -> Image<TestBackend, 2> {
        let mut values = vec![0.0; 100];
        for (x, y) in [(4, 4), (5, 4), (4, 5), (5, 5)] {
            values[y * 10 + x] = 1.0;
        }
        Image::from_vec(values, ImageGeometry::with_size([10, 10]), &Default::default())
    }

    #[test]
    fn test_resample_translation_2d() {
        let image = square();
        // Output x samples input x - (2, 1): the square moves by (+2, +1).
        let transform = TranslationTransform::new(Vector::new([-2.0, -1.0]));
        let result = ResampleImageFilter::new_from_reference(&image, transform, LinearInterpolator::new()).apply(&image);
        let values = result.to_vec();
        for (x, y) in [(6, 5), (7, 5), (6, 6), (7, 6)] {
            assert!(values[y * 10 + x] > 0.9);
        }
        assert!(values[44] < 0.1);
    }

    #[test]
    fn test_resample_onto_coarser_grid() {
        let image = square();
        let coarse = ImageGeometry::new([5, 5], Point::new([0.5, 0.5]), Spacing::uniform(2.0), Direction::identity());
        let result = ResampleImageFilter::new(coarse.clone(), IdentityTransform, LinearInterpolator::new()).apply(&image);
        assert_eq!(result.geometry(), &coarse);
        // Coarse voxel (2, 2) is the physical point (4.5, 4.5): centre of the square.
        assert!((result.to_vec()[12] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_default_value_outside_grid() {
        let image = square();
        let shifted = ImageGeometry::new([10, 10], Point::new([5.0, 0.0]), Spacing::uniform(1.0), Direction::identity());
        let result = ResampleImageFilter::new(shifted, IdentityTransform, NearestNeighborInterpolator::new())
            .with_default_pixel_value(-7.0)
            .apply(&image)
            .to_vec();
        // Output x = 4 is input x = 9 (inside); output x = 5 is input x = 10 (outside).
        assert_eq!(result[4], 0.0);
        assert_eq!(result[5], -7.0);
    }
}
