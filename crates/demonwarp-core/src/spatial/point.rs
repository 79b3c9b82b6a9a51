//! Positions in physical space.

use nalgebra::Point as NaPoint;
use super::Vector;

/// A position in D-dimensional physical space (millimetres for medical data).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point<const D: usize>(pub NaPoint<f64, D>);

impl<const D: usize> Point<D> {
    pub fn new(coords: [f64; D]) -> Self {
        Self(NaPoint::from(coords))
    }

    pub fn origin() -> Self {
        Self(NaPoint::origin())
    }

    /// Coordinates as a plain array in axis order.
    pub fn to_array(&self) -> [f64; D] {
        std::array::from_fn(|axis| self.0.coords[axis])
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Self) -> f64 {
        (self.0.coords - other.0.coords).norm()
    }
}

impl<const D: usize> Default for Point<D> {
    fn default() -> Self {
        Self::origin()
    }
}

impl<const D: usize> From<[f64; D]> for Point<D> {
    fn from(coords: [f64; D]) -> Self {
        Self::new(coords)
    }
}

impl<const D: usize> std::ops::Index<usize> for Point<D> {
    type Output = f64;

    fn index(&self, axis: usize) -> &f64 {
        &self.0.coords[axis]
    }
}

impl<const D: usize> std::ops::IndexMut<usize> for Point<D> {
    fn index_mut(&mut self, axis: usize) -> &mut f64 {
        &mut self.0.coords[axis]
    }
}

impl<const D: usize> std::ops::Sub for Point<D> {
    type Output = Vector<D>;

    fn sub(self, other: Self) -> Vector<D> {
        Vector(self.0 - other.0)
    }
}

impl<const D: usize> std::ops::Add<Vector<D>> for Point<D> {
    type Output = Self;

    fn add(self, offset: Vector<D>) -> Self {
        Self(self.0 + offset.0)
    }
}
