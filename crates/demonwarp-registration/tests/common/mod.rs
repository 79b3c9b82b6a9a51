#![allow(dead_code)]

use burn_ndarray::NdArray;
use demonwarp_core::filter::{GaussianFilter, ResampleImageFilter};
use demonwarp_core::image::{ForegroundMask, Image, ImageGeometry};
use demonwarp_core::interpolation::LinearInterpolator;
use demonwarp_core::spatial::Vector;
use demonwarp_core::transform::TranslationTransform;
use demonwarp_registration::RegistrationParameters;

pub type Backend = NdArray<f32>;

/// Ball of radius `radius` around the grid centre with a Gaussian intensity profile.
pub fn ball<const D: usize>(size: [usize; D], radius: f32) -> Image<Backend, D> {
    let geometry = ImageGeometry::with_size(size);
    let centre: [f32; D] = std::array::from_fn(|axis| (size[axis] as f32 - 1.0) / 2.0);
    let values = (0..geometry.num_voxels())
        .map(|linear| {
            let r2 = distance_squared(linear, &size, &centre);
            100.0 * (-2.0 * r2 / (radius * radius)).exp()
        })
        .collect();
    Image::from_vec(values, geometry, &Default::default())
}

/// Solid sphere of intensity 100 blurred by a 3-tap Gaussian along each axis.
pub fn blurred_sphere<const D: usize>(size: [usize; D], radius: f32) -> Image<Backend, D> {
    let solid = ball_mask(size, radius).image().clone();
    let solid = solid.with_data(solid.data().clone() * 100.0);
    GaussianFilter::new(vec![0.5]).with_max_kernel_width(3).apply(&solid)
}

/// Voxels within `radius` of the grid centre.
pub fn ball_mask<const D: usize>(size: [usize; D], radius: f32) -> ForegroundMask<Backend, D> {
    let geometry = ImageGeometry::with_size(size);
    let centre: [f32; D] = std::array::from_fn(|axis| (size[axis] as f32 - 1.0) / 2.0);
    let values = (0..geometry.num_voxels())
        .map(|linear| if distance_squared(linear, &size, &centre) <= radius * radius { 1.0 } else { 0.0 })
        .collect();
    ForegroundMask::from_vec(values, geometry, &Default::default())
}

/// `image` moved by `shift` physical units.
pub fn shifted<const D: usize>(image: &Image<Backend, D>, shift: [f64; D]) -> Image<Backend, D> {
    let offset = Vector::new(shift.map(|s| -s));
    ResampleImageFilter::new_from_reference(image, TranslationTransform::new(offset), LinearInterpolator::new())
        .apply(image)
}

/// A short schedule for small test volumes.
pub fn quick_parameters(iterations: Vec<usize>) -> RegistrationParameters {
    let levels = iterations.len();
    let shrink_factors = (0..levels).map(|level| vec![1 << (levels - 1 - level)]).collect();
    RegistrationParameters::new()
        .with_number_of_levels(levels)
        .with_shrink_factors(shrink_factors)
        .with_iterations_per_level(iterations)
}

fn distance_squared<const D: usize>(linear: usize, size: &[usize; D], centre: &[f32; D]) -> f32 {
    let mut rest = linear;
    let mut r2 = 0.0;
    for axis in 0..D {
        let index = rest % size[axis];
        rest /= size[axis];
        let d = index as f32 - centre[axis];
        r2 += d * d;
    }
    r2
}
