//! Displacement vectors in physical space.

use nalgebra::SVector;

/// A D-dimensional vector of physical quantities.
///
/// Used for offsets between points and, through the [`Spacing`](super::Spacing)
/// alias, for per-axis voxel spacing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vector<const D: usize>(pub SVector<f64, D>);

impl<const D: usize> Vector<D> {
    pub fn new(components: [f64; D]) -> Self {
        Self(SVector::from(components))
    }

    pub fn zeros() -> Self {
        Self(SVector::zeros())
    }

    /// Builds a vector from the first D entries of a slice, broadcasting a
    /// single entry to every axis.
    ///
    /// # Panics
    /// Panics if the slice is empty or has a length other than 1 or D.
    pub fn broadcast(components: &[f64]) -> Self {
        assert!(
            components.len() == 1 || components.len() == D,
            "expected 1 or {} components, got {}",
            D,
            components.len()
        );
        Self(SVector::from_fn(|axis, _| {
            components[if components.len() == 1 { 0 } else { axis }]
        }))
    }

    pub fn to_array(&self) -> [f64; D] {
        std::array::from_fn(|axis| self.0[axis])
    }

    pub fn norm(&self) -> f64 {
        self.0.norm()
    }

    /// Component-wise product.
    pub fn component_mul(&self, other: &Self) -> Self {
        Self(self.0.component_mul(&other.0))
    }
}

impl<const D: usize> std::ops::Index<usize> for Vector<D> {
    type Output = f64;

    fn index(&self, axis: usize) -> &f64 {
        &self.0[axis]
    }
}

impl<const D: usize> std::ops::IndexMut<usize> for Vector<D> {
    fn index_mut(&mut self, axis: usize) -> &mut f64 {
        &mut self.0[axis]
    }
}

impl<const D: usize> std::ops::Add for Vector<D> {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self(self.0 + other.0)
    }
}

impl<const D: usize> std::ops::Sub for Vector<D> {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self(self.0 - other.0)
    }
}

impl<const D: usize> std::ops::Mul<f64> for Vector<D> {
    type Output = Self;

    fn mul(self, scalar: f64) -> Self {
        Self(self.0 * scalar)
    }
}

impl<const D: usize> std::ops::Neg for Vector<D> {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_broadcast() {
        assert_eq!(Vector::<3>::broadcast(&[2.0]), Vector::new([2.0, 2.0, 2.0]));
        assert_eq!(Vector::<2>::broadcast(&[1.0, 3.0]), Vector::new([1.0, 3.0]));
    }

    #[test]
    #[should_panic]
    fn test_vector_broadcast_rejects_wrong_length() {
        let _ = Vector::<3>::broadcast(&[1.0, 2.0]);
    }

    #[test]
    fn test_vector_arithmetic() {
        let a = Vector::<3>::new([1.0, 2.0, 2.0]);
        let b = Vector::<3>::new([4.0, 5.0, 6.0]);
        assert_eq!(a + b, Vector::new([5.0, 7.0, 8.0]));
        assert_eq!(b - a, Vector::new([3.0, 3.0, 4.0]));
        assert_eq!(a * 2.0, Vector::new([2.0, 4.0, 4.0]));
        assert_eq!(-a, Vector::new([-1.0, -2.0, -2.0]));
        assert_eq!(a.component_mul(&b), Vector::new([4.0, 10.0, 12.0]));
        assert!((a.norm() - 3.0).abs() < 1e-12);
    }
}
