//! Foreground masking.

use std::collections::VecDeque;

use burn::tensor::backend::Backend;
use demonwarp_core::filter::MedianFilter;
use demonwarp_core::image::{axis_strides, ForegroundMask, Image};
use rayon::prelude::*;
use tracing::debug;

use crate::config::{MaskCleanup, RegistrationParameters};
use crate::error::{RegistrationError, Result};

/// Restricts images to a foreground region.
pub trait Maskable {
    /// Sets every voxel outside `mask` to `background`, or to the image
    /// minimum when no background is given.
    fn apply_mask<B: Backend, const D: usize>(
        &self,
        image: &Image<B, D>,
        mask: &ForegroundMask<B, D>,
        background: Option<f32>,
    ) -> Result<Image<B, D>>;

    /// Removes speckles and disconnected islands from a mask.
    fn clean_mask<B: Backend, const D: usize>(&self, mask: &ForegroundMask<B, D>) -> Result<ForegroundMask<B, D>>;
}

/// Masking with optional flood-fill cleanup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForegroundMasker {
    cleanup: Option<MaskCleanup>,
}

impl ForegroundMasker {
    pub fn new(cleanup: Option<MaskCleanup>) -> Self {
        Self { cleanup }
    }

    pub fn from_parameters(params: &RegistrationParameters) -> Self {
        Self::new(params.mask_cleanup.clone())
    }

    pub fn cleanup(&self) -> Option<&MaskCleanup> {
        self.cleanup.as_ref()
    }
}

impl Maskable for ForegroundMasker {
    fn apply_mask<B: Backend, const D: usize>(
        &self,
        image: &Image<B, D>,
        mask: &ForegroundMask<B, D>,
        background: Option<f32>,
    ) -> Result<Image<B, D>> {
        if !image.geometry().matches(mask.geometry()) {
            return Err(RegistrationError::mask_geometry_mismatch(
                "masking",
                image.geometry(),
                mask.geometry(),
            ));
        }
        let background = background.unwrap_or_else(|| image.min_value() as f32);
        Ok(image.with_data(image.data().clone().mask_fill(mask.background(), background)))
    }

    /// Without a configured [`MaskCleanup`] the mask is returned unchanged.
    ///
    /// Otherwise a voxel is a candidate when its whole `radius` neighborhood
    /// lies in `[lower, upper]`; the face-connected candidate region holding
    /// `seed` is kept, median filtered and thresholded at one half.
    fn clean_mask<B: Backend, const D: usize>(&self, mask: &ForegroundMask<B, D>) -> Result<ForegroundMask<B, D>> {
        let Some(cleanup) = &self.cleanup else {
            return Ok(mask.clone());
        };
        let size = mask.geometry().size();
        let seed = resolve_seed(&cleanup.seed, &size)?;
        let radius: [usize; D] = broadcast(&cleanup.radius, 0);
        let values = mask.image().to_vec();

        let candidates = candidate_voxels(&values, size, radius, cleanup.lower, cleanup.upper);
        let strides = axis_strides(reverse(size));
        let seed_offset: usize = (0..D).map(|axis| seed[axis] * strides[axis]).sum();
        if !candidates[seed_offset] {
            return Err(RegistrationError::invalid_configuration(format!(
                "mask cleanup seed {:?} is not inside the [{}, {}] band",
                seed, cleanup.lower, cleanup.upper
            )));
        }

        let region = flood_fill(&candidates, size, seed_offset);
        let kept = region.iter().filter(|&&v| v == 1.0).count();
        debug!("Mask cleanup kept {} of {} voxels", kept, values.len());

        let region_image = Image::from_vec(region, mask.geometry().clone(), &mask.image().device());
        let smoothed = MedianFilter::new(cleanup.median_radius.clone()).apply(&region_image);
        Ok(ForegroundMask::from_image(&smoothed))
    }
}

fn resolve_seed<const D: usize>(seed: &[usize], size: &[usize; D]) -> Result<[usize; D]> {
    if seed.len() != D {
        return Err(RegistrationError::invalid_configuration(format!(
            "mask cleanup seed needs {} coordinates, got {:?}",
            D, seed
        )));
    }
    if seed.iter().zip(size).any(|(&s, &n)| s >= n) {
        return Err(RegistrationError::invalid_configuration(format!(
            "mask cleanup seed {:?} lies outside the grid {:?}",
            seed, size
        )));
    }
    Ok(std::array::from_fn(|axis| seed[axis]))
}

/// Voxels whose full neighborhood lies in `[lower, upper]`. Borders replicate.
fn candidate_voxels<const D: usize>(values: &[f32], size: [usize; D], radius: [usize; D], lower: f32, upper: f32) -> Vec<bool> {
    let strides = axis_strides(reverse(size));
    let in_band: Vec<bool> = values.par_iter().map(|&v| v >= lower && v <= upper).collect();
    (0..values.len())
        .into_par_iter()
        .map(|flat| {
            let center: [usize; D] = std::array::from_fn(|axis| (flat / strides[axis]) % size[axis]);
            let mut offset: [isize; D] = std::array::from_fn(|axis| -(radius[axis] as isize));
            loop {
                let index: usize = (0..D)
                    .map(|axis| {
                        let c = (center[axis] as isize + offset[axis]).clamp(0, size[axis] as isize - 1);
                        c as usize * strides[axis]
                    })
                    .sum();
                if !in_band[index] {
                    return false;
                }
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
                    return true;
                }
            }
        })
        .collect()
}

/// Face-connected component of `candidates` containing `seed`, as 0/1 values.
fn flood_fill<const D: usize>(candidates: &[bool], size: [usize; D], seed: usize) -> Vec<f32> {
    let strides = axis_strides(reverse(size));
    let mut region = vec![0.0f32; candidates.len()];
    let mut queue = VecDeque::from([seed]);
    region[seed] = 1.0;
    while let Some(flat) = queue.pop_front() {
        for axis in 0..D {
            let coordinate = (flat / strides[axis]) % size[axis];
            let mut neighbors = [None, None];
            if coordinate > 0 {
                neighbors[0] = Some(flat - strides[axis]);
            }
            if coordinate + 1 < size[axis] {
                neighbors[1] = Some(flat + strides[axis]);
            }
            for neighbor in neighbors.into_iter().flatten() {
                if candidates[neighbor] && region[neighbor] == 0.0 {
                    region[neighbor] = 1.0;
                    queue.push_back(neighbor);
                }
            }
        }
    }
    region
}

fn broadcast<const D: usize>(values: &[usize], fallback: usize) -> [usize; D] {
    std::array::from_fn(|axis| match values.len() {
        0 => fallback,
        1 => values[0],
        _ => values.get(axis).copied().unwrap_or(fallback),
    })
}

fn reverse<const D: usize>(dims: [usize; D]) -> [usize; D] {
    std::array::from_fn(|i| dims[D - 1 - i])
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use demonwarp_core::image::ImageGeometry;

    type TestBackend = NdArray<f32>;

    fn two_blobs() -> ForegroundMask<TestBackend, 2> {
        // A 5x5 block at (2..7, 2..7) and a 3x3 block at (12..15, 12..15) on 16x16.
        let mut values = vec![0.0; 256];
        for y in 0..16 {
            for x in 0..16 {
                if (2..7).contains(&x) && (2..7).contains(&y) || (12..15).contains(&x) && (12..15).contains(&y) {
                    values[y * 16 + x] = 1.0;
                }
            }
        }
        ForegroundMask::from_vec(values, ImageGeometry::with_size([16, 16]), &Default::default())
    }

    #[test]
    fn test_apply_mask_uses_minimum_by_default() {
        let device = Default::default();
        let geometry = ImageGeometry::<2>::with_size([2, 2]);
        let image = Image::<TestBackend, 2>::from_vec(vec![5.0, 2.0, 9.0, 7.0], geometry.clone(), &device);
        let mask = ForegroundMask::from_vec(vec![1.0, 1.0, 0.0, 1.0], geometry, &device);
        let masker = ForegroundMasker::default();
        assert_eq!(masker.apply_mask(&image, &mask, None).unwrap().to_vec(), vec![5.0, 2.0, 2.0, 7.0]);
        assert_eq!(masker.apply_mask(&image, &mask, Some(-1.0)).unwrap().to_vec(), vec![5.0, 2.0, -1.0, 7.0]);
    }

    #[test]
    fn test_apply_mask_rejects_other_grid() {
        let device = Default::default();
        let image = Image::<TestBackend, 2>::from_vec(vec![0.0; 4], ImageGeometry::with_size([2, 2]), &device);
        let mask = ForegroundMask::full(ImageGeometry::with_size([2, 3]), &device);
        let result = ForegroundMasker::default().apply_mask(&image, &mask, None);
        assert!(matches!(result, Err(RegistrationError::MaskGeometryMismatch { .. })));
    }

    #[test]
    fn test_cleanup_keeps_seeded_component() {
        let masker = ForegroundMasker::new(Some(MaskCleanup::new(vec![4, 4]).with_radius(vec![0]).with_median_radius(vec![0])));
        let cleaned = masker.clean_mask(&two_blobs()).unwrap();
        assert_eq!(cleaned.count(), 25);
        let values = cleaned.image().to_vec();
        assert_eq!(values[13 * 16 + 13], 0.0);
        assert_eq!(values[4 * 16 + 4], 1.0);
    }

    #[test]
    fn test_cleanup_erodes_before_filling() {
        // Radius 1 shrinks the 5x5 block to its 3x3 core; the median keeps it.
        let masker = ForegroundMasker::new(Some(MaskCleanup::new(vec![4, 4]).with_median_radius(vec![0])));
        assert_eq!(masker.clean_mask(&two_blobs()).unwrap().count(), 9);
    }

    #[test]
    fn test_cleanup_seed_errors() {
        let outside = ForegroundMasker::new(Some(MaskCleanup::new(vec![20, 0])));
        assert!(matches!(outside.clean_mask(&two_blobs()), Err(RegistrationError::InvalidConfiguration(_))));
        let background = ForegroundMasker::new(Some(MaskCleanup::new(vec![0, 0])));
        assert!(matches!(background.clean_mask(&two_blobs()), Err(RegistrationError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_no_cleanup_is_identity() {
        let mask = two_blobs();
        let cleaned = ForegroundMasker::default().clean_mask(&mask).unwrap();
        assert_eq!(cleaned.image().to_vec(), mask.image().to_vec());
    }
}
