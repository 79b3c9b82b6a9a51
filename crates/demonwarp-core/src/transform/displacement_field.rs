//! Dense deformation fields.
//!
//! A [`DeformationField`] stores one physical displacement vector per voxel of
//! a grid. Component `a` is a buffer on that grid holding the displacement
//! along physical axis `a`. Warping an image `M` through a field `u` samples
//! `M(x + u(x))` at every grid point `x`.

use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor};
use tracing::debug;

use crate::filter::{GaussianFilter, ResampleImageFilter};
use crate::image::{ForegroundMask, Image, ImageGeometry};
use crate::interpolation::{Interpolator, LinearInterpolator};
use super::trait_::{IdentityTransform, Transform};

/// Upper bound on squaring steps when exponentiating a velocity field.
pub const MAX_SQUARING_STEPS: u32 = 20;

#[derive(Debug, Clone)]
pub struct DeformationField<B: Backend, const D: usize> {
    components: Vec<Tensor<B, D>>,
    geometry: ImageGeometry<D>,
}

impl<B: Backend, const D: usize> DeformationField<B, D> {
    /// Identity deformation on a grid.
    pub fn zeros(geometry: ImageGeometry<D>, device: &B::Device) -> Self {
        let components = (0..D).map(|_| Tensor::zeros(geometry.shape(), device)).collect();
        Self { components, geometry }
    }

    /// # Panics
    /// Panics unless there are exactly `D` components, each shaped like the grid.
    pub fn from_components(components: Vec<Tensor<B, D>>, geometry: ImageGeometry<D>) -> Self {
        assert_eq!(components.len(), D, "a deformation field needs one component per axis");
        for component in &components {
            assert_eq!(component.dims(), geometry.shape(), "component does not match the field grid");
        }
        Self { components, geometry }
    }

    /// Builds a field from `[N, D]` per-voxel vectors in row-major voxel order.
    pub fn from_vectors(vectors: Tensor<B, 2>, geometry: ImageGeometry<D>) -> Self {
        let shape = geometry.shape();
        let components = (0..D)
            .map(|axis| vectors.clone().narrow(1, axis, 1).reshape(shape))
            .collect();
        Self { components, geometry }
    }

    pub fn geometry(&self) -> &ImageGeometry<D> {
        &self.geometry
    }

    pub fn components(&self) -> &[Tensor<B, D>] {
        &self.components
    }

    pub fn component(&self, axis: usize) -> &Tensor<B, D> {
        &self.components[axis]
    }

    pub fn into_components(self) -> Vec<Tensor<B, D>> {
        self.components
    }

    /// Component `axis` as a scalar image on the field grid.
    pub fn component_image(&self, axis: usize) -> Image<B, D> {
        Image::from_geometry(self.components[axis].clone(), self.geometry.clone())
    }

    pub fn device(&self) -> B::Device {
        self.components[0].device()
    }

    /// Per-voxel vectors, `[N, D]`.
    pub fn vectors(&self) -> Tensor<B, 2> {
        let count = self.geometry.num_voxels();
        let columns = self
            .components
            .iter()
            .map(|c| c.clone().reshape([count]))
            .collect::<Vec<_>>();
        Tensor::stack(columns, 1)
    }

    /// Physical positions `x + u(x)` of every grid point, `[N, D]`.
    pub fn sample_points(&self) -> Tensor<B, 2> {
        self.geometry.physical_grid::<B>(&self.device()) + self.vectors()
    }

    /// Linearly interpolated displacement at arbitrary physical points.
    /// Points beyond the grid take the displacement of the nearest edge voxel.
    pub fn displacement_at(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let indices = self.geometry.world_to_index_tensor(points);
        let interpolator = LinearInterpolator::new();
        let columns = self
            .components
            .iter()
            .map(|c| interpolator.interpolate(c, indices.clone()))
            .collect::<Vec<_>>();
        Tensor::stack(columns, 1)
    }

    /// Samples `moving` at `x + u(x)` for every voxel `x` of the field grid.
    pub fn warp_image(&self, moving: &Image<B, D>) -> Image<B, D> {
        self.warp_with(moving, &LinearInterpolator::new())
    }

    /// Like [`warp_image`](Self::warp_image) with a caller-chosen interpolator.
    pub fn warp_with<I: Interpolator<B>>(&self, moving: &Image<B, D>, interpolator: &I) -> Image<B, D> {
        let indices = moving.world_to_index_tensor(self.sample_points());
        let values = interpolator.interpolate(moving.data(), indices);
        Image::from_geometry(values.reshape(self.geometry.shape()), self.geometry.clone())
    }

    /// Moves the field onto another grid by trilinear interpolation.
    ///
    /// Displacements are physical, so values are carried over unscaled.
    pub fn resample(&self, target: &ImageGeometry<D>) -> Self {
        if self.geometry.matches(target) {
            return self.clone();
        }
        let filter = ResampleImageFilter::new(target.clone(), IdentityTransform, LinearInterpolator::new());
        let components = (0..D)
            .map(|axis| filter.apply(&self.component_image(axis)).into_data())
            .collect();
        Self { components, geometry: target.clone() }
    }

    /// `self ∘ inner`: the field that first follows `inner`, then `self`.
    ///
    /// `(self ∘ inner)(x) = inner(x) + self(x + inner(x))`, evaluated on the
    /// grid of `inner`.
    pub fn compose(&self, inner: &Self) -> Self {
        let followed = self.displacement_at(inner.sample_points());
        Self::from_vectors(inner.vectors() + followed, inner.geometry.clone())
    }

    /// Exponential of a stationary velocity field by scaling and squaring.
    ///
    /// The field is halved until its largest vector is below half a voxel,
    /// then composed with itself as many times.
    pub fn exponential(&self) -> Self {
        let max_norm = self.max_voxel_norm();
        let steps = (2.0 + max_norm.log2()).ceil().clamp(0.0, MAX_SQUARING_STEPS as f64) as u32;
        if steps == 0 {
            return self.clone();
        }
        debug!("Exponentiating field with max norm {:.3} voxels in {} squaring steps", max_norm, steps);
        let mut result = self.scale(1.0 / (1u64 << steps) as f64);
        for _ in 0..steps {
            result = result.compose(&result);
        }
        result
    }

    /// # Panics
    /// Panics if the fields live on different grids.
    pub fn add(&self, other: &Self) -> Self {
        assert!(self.geometry.matches(&other.geometry), "fields must share a grid to be added");
        let components = self
            .components
            .iter()
            .zip(&other.components)
            .map(|(a, b)| a.clone() + b.clone())
            .collect();
        Self { components, geometry: self.geometry.clone() }
    }

    pub fn scale(&self, factor: f64) -> Self {
        let components = self
            .components
            .iter()
            .map(|c| c.clone() * factor as f32)
            .collect();
        Self { components, geometry: self.geometry.clone() }
    }

    /// Zeroes every vector outside the mask.
    ///
    /// # Panics
    /// Panics if the mask lives on another grid.
    pub fn mask(&self, mask: &ForegroundMask<B, D>) -> Self {
        assert!(self.geometry.matches(mask.geometry()), "mask must share the field grid");
        let components = self
            .components
            .iter()
            .map(|c| c.clone() * mask.data().clone())
            .collect();
        Self { components, geometry: self.geometry.clone() }
    }

    /// Gaussian smoothing of every component; `sigma` is in voxels.
    pub fn smooth(&self, sigma: f64) -> Self {
        let spacing = *self.geometry.spacing();
        let filter = GaussianFilter::<B>::from_voxel_sigma(sigma, &spacing);
        let components = self
            .components
            .iter()
            .map(|c| filter.apply_tensor(c.clone(), &spacing))
            .collect();
        Self { components, geometry: self.geometry.clone() }
    }

    /// Displacements expressed in voxel units along the grid axes.
    ///
    /// # Panics
    /// Panics if the grid direction is singular.
    pub fn index_components(&self) -> Vec<Tensor<B, D>> {
        let inverse = self
            .geometry
            .direction()
            .try_inverse()
            .expect("direction matrix must be invertible");
        let spacing = self.geometry.spacing();
        (0..D)
            .map(|axis| {
                let mut acc: Option<Tensor<B, D>> = None;
                for (i, component) in self.components.iter().enumerate() {
                    let coefficient = inverse[(axis, i)] / spacing[axis];
                    if coefficient == 0.0 {
                        continue;
                    }
                    let term = component.clone() * coefficient as f32;
                    acc = Some(match acc {
                        Some(sum) => sum + term,
                        None => term,
                    });
                }
                acc.unwrap_or_else(|| self.components[axis].zeros_like())
            })
            .collect()
    }

    /// Vector lengths in voxel units.
    pub fn voxel_norms(&self) -> Tensor<B, D> {
        norms(self.index_components())
    }

    /// Vector lengths in physical units.
    pub fn physical_norms(&self) -> Tensor<B, D> {
        norms(self.components.clone())
    }

    pub fn max_voxel_norm(&self) -> f64 {
        self.voxel_norms().max().into_scalar().elem::<f64>()
    }

    pub fn max_physical_norm(&self) -> f64 {
        self.physical_norms().max().into_scalar().elem::<f64>()
    }
}

fn norms<B: Backend, const D: usize>(components: Vec<Tensor<B, D>>) -> Tensor<B, D> {
    let mut squares = components.into_iter().map(|c| c.clone() * c);
    match squares.next() {
        Some(first) => squares.fold(first, |acc, sq| acc + sq).sqrt(),
        None => Tensor::empty([0; D], &Default::default()),
    }
}

/// Evaluates `p + u(p)` for arbitrary physical points `p`.
///
/// Use it with [`ResampleImageFilter`] to warp an image onto a grid other
/// than the field's own.
#[derive(Debug, Clone)]
pub struct DisplacementFieldTransform<B: Backend, const D: usize> {
    field: DeformationField<B, D>,
}

impl<B: Backend, const D: usize> DisplacementFieldTransform<B, D> {
    pub fn new(field: DeformationField<B, D>) -> Self {
        Self { field }
    }

    pub fn field(&self) -> &DeformationField<B, D> {
        &self.field
    }
}

impl<B: Backend, const D: usize> Transform<B, D> for DisplacementFieldTransform<B, D> {
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        points.clone() + self.field.displacement_at(points)
    }
}
