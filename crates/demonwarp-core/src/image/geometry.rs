//! Voxel grid geometry.
//!
//! An [`ImageGeometry`] describes where a regular voxel grid sits in physical
//! space: how many voxels it has along each axis, the spacing between them,
//! the physical position of voxel zero and the orientation of the axes.
//!
//! `size` is stored in axis order (x, y, z). Voxel buffers are tensors laid
//! out `[z, y, x]`, so [`ImageGeometry::shape`] returns the reversed size.

use std::fmt;

use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor, TensorData};

use crate::spatial::{Direction, Point, Spacing};
use super::grid::generate_grid;

/// Absolute tolerance used when comparing origins, spacings and directions.
pub const GEOMETRY_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct ImageGeometry<const D: usize> {
    size: [usize; D],
    origin: Point<D>,
    spacing: Spacing<D>,
    direction: Direction<D>,
}

impl<const D: usize> ImageGeometry<D> {
    pub fn new(size: [usize; D], origin: Point<D>, spacing: Spacing<D>, direction: Direction<D>) -> Self {
        Self { size, origin, spacing, direction }
    }

    /// Unit spacing, zero origin and identity direction.
    pub fn with_size(size: [usize; D]) -> Self {
        Self::new(size, Point::origin(), Spacing::uniform(1.0), Direction::identity())
    }

    /// Builds a geometry from a tensor shape (`[z, y, x]` order).
    pub fn from_shape(shape: [usize; D], origin: Point<D>, spacing: Spacing<D>, direction: Direction<D>) -> Self {
        Self::new(reverse(shape), origin, spacing, direction)
    }

    pub fn size(&self) -> [usize; D] {
        self.size
    }

    pub fn origin(&self) -> &Point<D> {
        &self.origin
    }

    pub fn spacing(&self) -> &Spacing<D> {
        &self.spacing
    }

    pub fn direction(&self) -> &Direction<D> {
        &self.direction
    }

    /// Tensor dimensions of a buffer on this grid.
    pub fn shape(&self) -> [usize; D] {
        reverse(self.size)
    }

    pub fn num_voxels(&self) -> usize {
        self.size.iter().product()
    }

    /// True when the grids are interchangeable: identical sizes and
    /// origin, spacing and direction equal within [`GEOMETRY_TOLERANCE`].
    pub fn matches(&self, other: &Self) -> bool {
        self.size == other.size
            && (self.origin - other.origin).0.amax() <= GEOMETRY_TOLERANCE
            && (self.spacing - other.spacing).0.amax() <= GEOMETRY_TOLERANCE
            && self.direction.approx_eq(&other.direction, GEOMETRY_TOLERANCE)
    }

    /// True for a non-empty grid with positive spacing and an invertible direction.
    pub fn is_valid(&self) -> bool {
        self.size.iter().all(|&n| n > 0)
            && self.spacing.is_valid()
            && self.direction.determinant().abs() > GEOMETRY_TOLERANCE
    }

    /// Geometry of the grid obtained by keeping every `f`-th voxel along each
    /// axis: `ceil(n / f)` voxels, spacing scaled by `f`, same origin.
    pub fn shrink(&self, factors: &[usize; D]) -> Self {
        let size = std::array::from_fn(|axis| {
            let f = factors[axis].max(1);
            self.size[axis].div_ceil(f)
        });
        let clamped = std::array::from_fn(|axis| factors[axis].max(1));
        Self::new(size, self.origin, self.spacing.shrunk(&clamped), self.direction)
    }

    /// Continuous index of a physical point:
    /// `index = diag(1/spacing) * direction^-1 * (point - origin)`.
    ///
    /// # Panics
    /// Panics if the direction matrix is singular.
    pub fn physical_point_to_index(&self, point: &Point<D>) -> Point<D> {
        let rotated = self.inverse_direction() * (*point - self.origin);
        Point::new(std::array::from_fn(|axis| rotated[axis] / self.spacing[axis]))
    }

    /// Physical position of a continuous index:
    /// `point = origin + direction * diag(spacing) * index`.
    pub fn index_to_physical_point(&self, index: &Point<D>) -> Point<D> {
        let scaled = (*index - Point::origin()).component_mul(&self.spacing);
        self.origin + self.direction * scaled
    }

    /// Maps a batch of physical points `[N, D]` to continuous indices `[N, D]`.
    ///
    /// # Panics
    /// Panics if the direction matrix is singular.
    pub fn world_to_index_tensor<B: Backend>(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = points.device();
        let inverse = self.inverse_direction();
        // index_row = (p - o)_row * M with M[r][c] = inverse[c][r] / spacing[c]
        let matrix = square_matrix::<B, D>(&device, |r, c| inverse[(c, r)] / self.spacing[c]);
        (points - self.origin_row::<B>(&device)).matmul(matrix)
    }

    /// Maps a batch of continuous indices `[N, D]` to physical points `[N, D]`.
    pub fn index_to_world_tensor<B: Backend>(&self, indices: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = indices.device();
        // point_row = o + index_row * M with M[r][c] = spacing[r] * direction[c][r]
        let matrix = square_matrix::<B, D>(&device, |r, c| self.spacing[r] * self.direction[(c, r)]);
        indices.matmul(matrix) + self.origin_row::<B>(&device)
    }

    /// Continuous indices of every voxel, `[N, D]`, x fastest.
    pub fn index_grid<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2> {
        generate_grid::<B, D>(self.shape(), device)
    }

    /// Physical positions of every voxel, `[N, D]`, x fastest.
    pub fn physical_grid<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2> {
        self.index_to_world_tensor(self.index_grid::<B>(device))
    }

    fn inverse_direction(&self) -> Direction<D> {
        self.direction
            .try_inverse()
            .expect("direction matrix must be invertible")
    }

    fn origin_row<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2> {
        let values: Vec<f32> = (0..D).map(|axis| self.origin[axis] as f32).collect();
        Tensor::from_data(TensorData::new(values, Shape::new([1, D])), device)
    }
}

impl<const D: usize> fmt::Display for ImageGeometry<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "size {:?}, spacing {:?}, origin {:?}",
            self.size,
            self.spacing.to_array(),
            self.origin.to_array()
        )
    }
}

fn reverse<const D: usize>(dims: [usize; D]) -> [usize; D] {
    std::array::from_fn(|i| dims[D - 1 - i])
}

fn square_matrix<B: Backend, const D: usize>(
    device: &B::Device,
    entry: impl Fn(usize, usize) -> f64,
) -> Tensor<B, 2> {
    let mut values = Vec::with_capacity(D * D);
    for r in 0..D {
        for c in 0..D {
            values.push(entry(r, c) as f32);
        }
    }
    Tensor::from_data(TensorData::new(values, Shape::new([D, D])), device)
}
