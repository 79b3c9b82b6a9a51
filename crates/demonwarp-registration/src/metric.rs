//! Similarity measures and deformation field diagnostics.

use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor};
use demonwarp_core::filter::GradientFilter;
use demonwarp_core::image::{ForegroundMask, Image};
use demonwarp_core::spatial::Direction;
use demonwarp_core::transform::DeformationField;
use rayon::prelude::*;

use crate::error::Result;
use crate::validation::{validate_mask, validate_same_grid};

/// Mean squared intensity difference, over the mask when one is given.
pub fn mean_squared_error<B: Backend, const D: usize>(
    fixed: &Image<B, D>,
    moving: &Image<B, D>,
    mask: Option<&ForegroundMask<B, D>>,
) -> Result<f64> {
    check_grids("mean squared error", fixed, moving, mask)?;
    let diff = fixed.data().clone() - moving.data().clone();
    let squared = diff.clone() * diff;
    Ok(weighted_mean(squared, mask))
}

/// Pearson correlation of the intensities, in `[-1, 1]`.
///
/// Returns 0 when either image is constant over the region.
pub fn normalized_cross_correlation<B: Backend, const D: usize>(
    fixed: &Image<B, D>,
    moving: &Image<B, D>,
    mask: Option<&ForegroundMask<B, D>>,
) -> Result<f64> {
    check_grids("normalized cross correlation", fixed, moving, mask)?;
    let f_mean = weighted_mean(fixed.data().clone(), mask);
    let m_mean = weighted_mean(moving.data().clone(), mask);
    let f = fixed.data().clone() - f_mean as f32;
    let m = moving.data().clone() - m_mean as f32;

    let cross = weighted_mean(f.clone() * m.clone(), mask);
    let f_var = weighted_mean(f.clone() * f, mask);
    let m_var = weighted_mean(m.clone() * m, mask);
    let denominator = (f_var * m_var).sqrt();
    if denominator <= f64::EPSILON {
        return Ok(0.0);
    }
    Ok(cross / denominator)
}

fn weighted_mean<B: Backend, const D: usize>(values: Tensor<B, D>, mask: Option<&ForegroundMask<B, D>>) -> f64 {
    match mask {
        Some(mask) => {
            let count = mask.count().max(1) as f64;
            (values * mask.data().clone()).sum().into_scalar().elem::<f64>() / count
        }
        None => values.mean().into_scalar().elem::<f64>(),
    }
}

fn check_grids<B: Backend, const D: usize>(
    stage: &str,
    fixed: &Image<B, D>,
    moving: &Image<B, D>,
    mask: Option<&ForegroundMask<B, D>>,
) -> Result<()> {
    validate_same_grid(stage, fixed, moving)?;
    validate_mask(stage, fixed.geometry(), mask)
}

/// Summary of a deformation field's size and regularity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldStatistics {
    /// Longest displacement, physical units.
    pub max_norm: f64,
    /// Mean displacement length, physical units.
    pub mean_norm: f64,
    /// Mean squared Frobenius norm of the displacement gradient.
    pub harmonic_energy: f64,
    /// Smallest Jacobian determinant of `x -> x + u(x)`.
    pub min_jacobian: f64,
    pub max_jacobian: f64,
    /// Share of voxels with a non-positive Jacobian determinant.
    pub folded_fraction: f64,
}

impl FieldStatistics {
    pub fn compute<B: Backend, const D: usize>(field: &DeformationField<B, D>) -> Self {
        let norms = field.physical_norms();
        let max_norm = norms.clone().max().into_scalar().elem::<f64>();
        let mean_norm = norms.mean().into_scalar().elem::<f64>();

        // derivatives[c][p] = d u_c / d x_p
        let gradient = GradientFilter::new();
        let derivatives: Vec<Vec<Vec<f32>>> = (0..D)
            .map(|c| {
                gradient
                    .apply(&field.component_image(c))
                    .into_iter()
                    .map(|d| d.into_data().iter::<f32>().collect())
                    .collect()
            })
            .collect();

        let count = field.geometry().num_voxels();
        let (energy, min_jacobian, max_jacobian, folded) = (0..count)
            .into_par_iter()
            .map(|voxel| {
                let mut jacobian = Direction::<D>::identity();
                let mut energy = 0.0;
                for (c, rows) in derivatives.iter().enumerate() {
                    for (p, values) in rows.iter().enumerate() {
                        let d = values[voxel] as f64;
                        energy += d * d;
                        jacobian[(c, p)] += d;
                    }
                }
                let det = jacobian.determinant();
                (energy, det, det, usize::from(det <= 0.0))
            })
            .reduce(
                || (0.0, f64::INFINITY, f64::NEG_INFINITY, 0),
                |a, b| (a.0 + b.0, a.1.min(b.1), a.2.max(b.2), a.3 + b.3),
            );

        let count = count.max(1) as f64;
        Self {
            max_norm,
            mean_norm,
            harmonic_energy: energy / count,
            min_jacobian,
            max_jacobian,
            folded_fraction: folded as f64 / count,
        }
    }
}
