use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor, TensorData};

/// Continuous indices of every voxel of a tensor with the given shape.
///
/// Returns `[N, D]` where row `n` is the voxel at flat offset `n` of a
/// row-major buffer and the columns are in axis order (x, y, z), i.e. the
/// reverse of the tensor dimensions.
pub fn generate_grid<B: Backend, const D: usize>(shape: [usize; D], device: &B::Device) -> Tensor<B, 2> {
    let total: usize = shape.iter().product();
    let mut values = Vec::with_capacity(total * D);
    let mut index = [0usize; D];
    for _ in 0..total {
        // Column `a` is tensor dimension `D - 1 - a`.
        for axis in 0..D {
            values.push(index[D - 1 - axis] as f32);
        }
        for dim in (0..D).rev() {
            index[dim] += 1;
            if index[dim] < shape[dim] {
                break;
            }
            index[dim] = 0;
        }
    }
    Tensor::from_data(TensorData::new(values, Shape::new([total, D])), device)
}

/// Row-major strides of a tensor shape, in axis order (x stride first).
pub fn axis_strides<const D: usize>(shape: [usize; D]) -> [usize; D] {
    let mut strides = [1usize; D];
    for axis in 1..D {
        strides[axis] = strides[axis - 1] * shape[D - axis];
    }
    strides
}
