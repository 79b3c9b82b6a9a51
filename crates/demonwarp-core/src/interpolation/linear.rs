//! Linear interpolation (bilinear in 2D, trilinear in 3D).

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

use crate::image::axis_strides;
use super::trait_::Interpolator;

/// N-linear interpolator with edge clamping.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearInterpolator;

impl LinearInterpolator {
    pub fn new() -> Self {
        Self
    }
}

/// Lower/upper neighbour indices and the fractional weight along one axis.
struct AxisSamples<B: Backend> {
    lower: Tensor<B, 1, Int>,
    upper: Tensor<B, 1, Int>,
    weight: Tensor<B, 1>,
}

impl<B: Backend> Interpolator<B> for LinearInterpolator {
    fn interpolate<const D: usize>(&self, data: &Tensor<B, D>, indices: Tensor<B, 2>) -> Tensor<B, 1> {
        let shape = data.dims();
        let strides = axis_strides(shape);
        let [count, _] = indices.dims();
        let device = indices.device();
        let flat = data.clone().reshape([shape.iter().product::<usize>()]);

        let axes: Vec<AxisSamples<B>> = (0..D)
            .map(|axis| {
                let extent = shape[D - 1 - axis];
                let max_index = (extent - 1) as f64;
                let coord = indices.clone().narrow(1, axis, 1).squeeze::<1>(1);
                let floor = coord.clone().floor();
                AxisSamples {
                    lower: floor.clone().clamp(0.0, max_index).int(),
                    upper: (floor.clone() + 1.0).clamp(0.0, max_index).int(),
                    weight: coord - floor,
                }
            })
            .collect();

        // Accumulate the 2^D corner contributions.
        let mut result = Tensor::<B, 1>::zeros([count], &device);
        for corner in 0..(1usize << D) {
            let mut offset: Option<Tensor<B, 1, Int>> = None;
            let mut weight: Option<Tensor<B, 1>> = None;
            for (axis, samples) in axes.iter().enumerate() {
                let high = (corner >> axis) & 1 == 1;
                let (index, w) = if high {
                    (samples.upper.clone(), samples.weight.clone())
                } else {
                    (samples.lower.clone(), samples.weight.clone().neg() + 1.0)
                };
                let term = index * strides[axis] as i32;
                offset = Some(match offset {
                    Some(acc) => acc + term,
                    None => term,
                });
                weight = Some(match weight {
                    Some(acc) => acc * w,
                    None => w,
                });
            }
            if let (Some(offset), Some(weight)) = (offset, weight) {
                result = result + flat.clone().gather(0, offset) * weight;
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_bilinear_midpoint() {
        let device = Default::default();
        let data = Tensor::<TestBackend, 2>::from_floats([[0.0, 1.0], [2.0, 3.0]], &device);
        let indices = Tensor::<TestBackend, 2>::from_floats([[0.5, 0.5], [1.0, 0.0], [0.0, 1.0]], &device);
        let values = LinearInterpolator::new().interpolate(&data, indices).into_data().to_vec::<f32>().unwrap();
        assert!((values[0] - 1.5).abs() < 1e-6);
        assert!((values[1] - 1.0).abs() < 1e-6);
        assert!((values[2] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_trilinear_reproduces_linear_ramp() {
        let device = Default::default();
        // f(x, y, z) = x + 10 y + 100 z on a 3x3x3 grid.
        let mut values = Vec::new();
        for z in 0..3 {
            for y in 0..3 {
                for x in 0..3 {
                    values.push((x + 10 * y + 100 * z) as f32);
                }
            }
        }
        let data = Tensor::<TestBackend, 1>::from_floats(values.as_slice(), &device).reshape([3, 3, 3]);
        let indices = Tensor::<TestBackend, 2>::from_floats([[0.25, 1.5, 0.75], [2.0, 2.0, 2.0]], &device);
        let sampled = LinearInterpolator::new().interpolate(&data, indices).into_data().to_vec::<f32>().unwrap();
        assert!((sampled[0] - (0.25 + 15.0 + 75.0)).abs() < 1e-4);
        assert!((sampled[1] - 222.0).abs() < 1e-4);
    }

    #[test]
    fn test_out_of_grid_samples_clamp_to_edge() {
        let device = Default::default();
        let data = Tensor::<TestBackend, 2>::from_floats([[1.0, 2.0], [3.0, 4.0]], &device);
        let indices = Tensor::<TestBackend, 2>::from_floats([[-3.0, 0.0], [5.0, 1.0]], &device);
        let values = LinearInterpolator::new().interpolate(&data, indices).into_data().to_vec::<f32>().unwrap();
        assert!((values[0] - 1.0).abs() < 1e-6);
        assert!((values[1] - 4.0).abs() < 1e-6);
    }
}
