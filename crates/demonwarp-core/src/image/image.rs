//! Scalar images with physical geometry.
//!
//! An [`Image`] pairs a voxel buffer with the [`ImageGeometry`] that places it
//! in physical space. Images are treated as values: every filter returns a new
//! image and never mutates its input.

use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Shape, Tensor, TensorData};

use crate::spatial::{Direction, Point, Spacing};
use super::geometry::ImageGeometry;

/// Scalar image on a regular grid.
///
/// # Type Parameters
/// * `B` - tensor backend holding the voxel buffer
/// * `D` - spatial dimensionality (2 or 3)
///
/// The buffer is a `Tensor<B, D>` laid out `[z, y, x]` (x varies fastest);
/// geometry arrays are in axis order (x, y, z).
///
/// # Examples
/// ```rust
/// use demonwarp_core::Image;
/// use demonwarp_core::spatial::{Direction, Point, Spacing};
/// use burn::tensor::Tensor;
/// use burn_ndarray::NdArray;
///
/// let device = Default::default();
/// let data = Tensor::<NdArray<f32>, 3>::zeros([4, 6, 8], &device);
/// let image = Image::new(data, Point::origin(), Spacing::uniform(1.0), Direction::identity());
/// assert_eq!(image.size(), [8, 6, 4]);
/// ```
#[derive(Debug, Clone)]
pub struct Image<B: Backend, const D: usize> {
    data: Tensor<B, D>,
    geometry: ImageGeometry<D>,
}

impl<B: Backend, const D: usize> Image<B, D> {
    /// Creates an image; the size is taken from the tensor dimensions.
    pub fn new(data: Tensor<B, D>, origin: Point<D>, spacing: Spacing<D>, direction: Direction<D>) -> Self {
        let geometry = ImageGeometry::from_shape(data.dims(), origin, spacing, direction);
        Self { data, geometry }
    }

    /// Creates an image on an existing grid.
    ///
    /// # Panics
    /// Panics if the tensor dimensions disagree with the geometry.
    pub fn from_geometry(data: Tensor<B, D>, geometry: ImageGeometry<D>) -> Self {
        assert_eq!(
            data.dims(),
            geometry.shape(),
            "voxel buffer shape does not match the image grid"
        );
        Self { data, geometry }
    }

    /// Creates an image from a row-major buffer (x fastest).
    ///
    /// # Panics
    /// Panics if `values.len()` differs from the number of voxels.
    pub fn from_vec(values: Vec<f32>, geometry: ImageGeometry<D>, device: &B::Device) -> Self {
        assert_eq!(values.len(), geometry.num_voxels(), "buffer length must equal voxel count");
        let data = Tensor::from_data(TensorData::new(values, Shape::new(geometry.shape())), device);
        Self { data, geometry }
    }

    /// Same grid, new buffer.
    pub fn with_data(&self, data: Tensor<B, D>) -> Self {
        Self::from_geometry(data, self.geometry.clone())
    }

    pub fn data(&self) -> &Tensor<B, D> {
        &self.data
    }

    pub fn into_data(self) -> Tensor<B, D> {
        self.data
    }

    pub fn geometry(&self) -> &ImageGeometry<D> {
        &self.geometry
    }

    pub fn origin(&self) -> &Point<D> {
        self.geometry.origin()
    }

    pub fn spacing(&self) -> &Spacing<D> {
        self.geometry.spacing()
    }

    pub fn direction(&self) -> &Direction<D> {
        self.geometry.direction()
    }

    /// Tensor dimensions, `[z, y, x]`.
    pub fn shape(&self) -> [usize; D] {
        self.data.dims()
    }

    /// Voxel counts in axis order, `[x, y, z]`.
    pub fn size(&self) -> [usize; D] {
        self.geometry.size()
    }

    pub fn device(&self) -> B::Device {
        self.data.device()
    }

    /// Copies the voxel buffer to the host in row-major order.
    pub fn to_vec(&self) -> Vec<f32> {
        self.data.clone().into_data().iter::<f32>().collect()
    }

    pub fn min_value(&self) -> f64 {
        self.data.clone().min().into_scalar().elem::<f64>()
    }

    pub fn max_value(&self) -> f64 {
        self.data.clone().max().into_scalar().elem::<f64>()
    }

    pub fn mean_value(&self) -> f64 {
        self.data.clone().mean().into_scalar().elem::<f64>()
    }

    /// See [`ImageGeometry::physical_point_to_index`].
    pub fn transform_physical_point_to_continuous_index(&self, point: &Point<D>) -> Point<D> {
        self.geometry.physical_point_to_index(point)
    }

    /// See [`ImageGeometry::index_to_physical_point`].
    pub fn transform_continuous_index_to_physical_point(&self, index: &Point<D>) -> Point<D> {
        self.geometry.index_to_physical_point(index)
    }

    /// See [`ImageGeometry::world_to_index_tensor`].
    pub fn world_to_index_tensor(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        self.geometry.world_to_index_tensor(points)
    }

    /// See [`ImageGeometry::index_to_world_tensor`].
    pub fn index_to_world_tensor(&self, indices: Tensor<B, 2>) -> Tensor<B, 2> {
        self.geometry.index_to_world_tensor(indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type Backend = NdArray<f32>;

    fn ramp() -> Image<Backend, 3> {
        let geometry = ImageGeometry::new([4, 3, 2], Point::new([1.0, 2.0, 3.0]), Spacing::new([0.5, 1.0, 2.0]), Direction::identity());
        Image::from_vec((0..24).map(|v| v as f32).collect(), geometry, &Default::default())
    }

    #[test]
    fn test_image_creation() {
        let image = ramp();
        assert_eq!(image.shape(), [2, 3, 4]);
        assert_eq!(image.size(), [4, 3, 2]);
        assert_eq!(image.origin(), &Point::new([1.0, 2.0, 3.0]));
        assert_eq!(image.spacing(), &Spacing::new([0.5, 1.0, 2.0]));
        assert_eq!(image.direction(), &Direction::identity());
    }

    #[test]
    fn test_buffer_is_x_fastest() {
        let image = ramp();
        let values = image.to_vec();
        assert_eq!(values.len(), 24);
        // Voxel (x=1, y=2, z=1) sits at 1 * 12 + 2 * 4 + 1.
        let slab = image.data().clone().slice([1..2, 2..3, 1..2]);
        assert_eq!(slab.into_scalar(), values[21]);
    }

    #[test]
    fn test_intensity_statistics() {
        let image = ramp();
        assert_eq!(image.min_value(), 0.0);
        assert_eq!(image.max_value(), 23.0);
        assert!((image.mean_value() - 11.5).abs() < 1e-6);
    }

    #[test]
    fn test_physical_roundtrip() {
        let image = ramp();
        let point = Point::new([2.25, 3.5, 4.0]);
        let index = image.transform_physical_point_to_continuous_index(&point);
        assert!((index[0] - 2.5).abs() < 1e-12);
        assert!((index[1] - 1.5).abs() < 1e-12);
        assert!((index[2] - 0.5).abs() < 1e-12);
        let back = image.transform_continuous_index_to_physical_point(&index);
        assert!(point.distance(&back) < 1e-12);
    }

    #[test]
    #[should_panic]
    fn test_from_geometry_rejects_wrong_shape() {
        let device = Default::default();
        let data = Tensor::<Backend, 2>::zeros([3, 4], &device);
        let _ = Image::from_geometry(data, ImageGeometry::with_size([3, 4]));
    }
}
