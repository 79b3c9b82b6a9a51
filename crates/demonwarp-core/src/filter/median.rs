use burn::tensor::backend::Backend;
use rayon::prelude::*;

use crate::image::{axis_strides, Image};

/// Median over a box neighborhood.
///
/// The neighborhood spans `2 * radius + 1` voxels along each axis; a single
/// radius applies to every axis. Voxels beyond the border take the value of
/// the nearest edge voxel. Runs on the host, one voxel per rayon task.
pub struct MedianFilter {
    radius: Vec<usize>,
}

impl MedianFilter {
    pub fn new(radius: Vec<usize>) -> Self {
        Self { radius }
    }

    pub fn axis_radius<const D: usize>(&self) -> [usize; D] {
        std::array::from_fn(|axis| match self.radius.len() {
            0 => 0,
            1 => self.radius[0],
            _ => self.radius.get(axis).copied().unwrap_or(0),
        })
    }

    pub fn apply<B: Backend, const D: usize>(&self, image: &Image<B, D>) -> Image<B, D> {
        let radius = self.axis_radius::<D>();
        if radius.iter().all(|&r| r == 0) {
            return image.clone();
        }
        let values = image.to_vec();
        let filtered = median_filter(&values, image.size(), radius);
        Image::from_vec(filtered, image.geometry().clone(), &image.device())
    }
}

/// Median-filters a row-major buffer with the given per-axis size and radius.
pub(crate) fn median_filter<const D: usize>(values: &[f32], size: [usize; D], radius: [usize; D]) -> Vec<f32> {
    let strides = axis_strides(reverse(size));
    let window: usize = radius.iter().map(|r| 2 * r + 1).product();

    (0..values.len())
        .into_par_iter()
        .map_init(
            || Vec::with_capacity(window),
            |neighborhood, flat| {
                let center = unravel(flat, &size, &strides);
                neighborhood.clear();
                let mut offset = [0isize; D];
                for axis in 0..D {
                    offset[axis] = -(radius[axis] as isize);
                }
                loop {
                    let mut index = 0;
                    for axis in 0..D {
                        let c = (center[axis] as isize + offset[axis]).clamp(0, size[axis] as isize - 1);
                        index += c as usize * strides[axis];
                    }
                    neighborhood.push(values[index]);

                    let mut axis = 0;
                    while axis < D {
                        offset[axis] += 1;
                        if offset[axis] <= radius[axis] as isize {
                            break;
                        }
                        offset[axis] = -(radius[axis] as isize);
                        axis += 1;
                    }
                    if axis == D {
                        break;
                    }
                }
                let mid = neighborhood.len() / 2;
                let (_, median, _) = neighborhood.select_nth_unstable_by(mid, f32::total_cmp);
                *median
            },
        )
        .collect()
}

fn unravel<const D: usize>(flat: usize, size: &[usize; D], strides: &[usize; D]) -> [usize; D] {
    std::array::from_fn(|axis| (flat / strides[axis]) % size[axis])
}

fn reverse<const D: usize>(dims: [usize; D]) -> [usize; D] {
    std::array::from_fn(|i| dims[D - 1 - i])
}
