//! Binary foreground masks.

use burn::tensor::backend::Backend;
use burn::tensor::{Bool, ElementConversion, Tensor};

use super::geometry::ImageGeometry;
use super::image::Image;

/// Binary image restricting processing to a foreground region.
///
/// Stored as an image whose voxels are exactly `0.0` (background) or `1.0`
/// (foreground) so that it can multiply other buffers on the same grid.
#[derive(Debug, Clone)]
pub struct ForegroundMask<B: Backend, const D: usize> {
    image: Image<B, D>,
}

impl<B: Backend, const D: usize> ForegroundMask<B, D> {
    /// Every voxel with a value above `0.5` becomes foreground.
    pub fn from_image(image: &Image<B, D>) -> Self {
        let binary = image.data().clone().greater_elem(0.5).float();
        Self { image: image.with_data(binary) }
    }

    /// A mask covering the whole grid.
    pub fn full(geometry: ImageGeometry<D>, device: &B::Device) -> Self {
        let data = Tensor::ones(geometry.shape(), device);
        Self { image: Image::from_geometry(data, geometry) }
    }

    pub fn from_vec(values: Vec<f32>, geometry: ImageGeometry<D>, device: &B::Device) -> Self {
        Self::from_image(&Image::from_vec(values, geometry, device))
    }

    pub fn image(&self) -> &Image<B, D> {
        &self.image
    }

    /// `1.0` inside, `0.0` outside.
    pub fn data(&self) -> &Tensor<B, D> {
        self.image.data()
    }

    pub fn geometry(&self) -> &ImageGeometry<D> {
        self.image.geometry()
    }

    /// `true` at background voxels.
    pub fn background(&self) -> Tensor<B, D, Bool> {
        self.image.data().clone().lower_elem(0.5)
    }

    /// Number of foreground voxels.
    pub fn count(&self) -> usize {
        self.image.data().clone().sum().into_scalar().elem::<f64>().round() as usize
    }

    /// Voxels that are foreground in both masks.
    ///
    /// # Panics
    /// Panics if the masks live on different grids.
    pub fn intersect(&self, other: &Self) -> Self {
        assert!(
            self.geometry().matches(other.geometry()),
            "masks must share a grid to be intersected"
        );
        let data = self.data().clone() * other.data().clone();
        Self { image: self.image.with_data(data) }
    }
}
