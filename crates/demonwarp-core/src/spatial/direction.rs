//! Image orientation.

use nalgebra::SMatrix;
use super::Vector;

/// Orientation matrix of an image grid.
///
/// Column `a` holds the physical direction of grid axis `a`. Images are
/// expected to carry orthonormal directions, but nothing here assumes it:
/// index/physical mappings use a full inverse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Direction<const D: usize>(pub SMatrix<f64, D, D>);

impl<const D: usize> Direction<D> {
    pub fn identity() -> Self {
        Self(SMatrix::identity())
    }

    pub fn try_inverse(&self) -> Option<Self> {
        self.0.try_inverse().map(Self)
    }

    pub fn transpose(&self) -> Self {
        Self(self.0.transpose())
    }

    /// Determinant by Gaussian elimination with partial pivoting.
    ///
    /// Works for any `D`, which lets the same routine serve both image
    /// directions and per-voxel Jacobians.
    pub fn determinant(&self) -> f64 {
        let mut m = self.0;
        let mut det = 1.0;
        for col in 0..D {
            let pivot = (col..D)
                .max_by(|&a, &b| m[(a, col)].abs().total_cmp(&m[(b, col)].abs()))
                .unwrap_or(col);
            if m[(pivot, col)] == 0.0 {
                return 0.0;
            }
            if pivot != col {
                m.swap_rows(pivot, col);
                det = -det;
            }
            let p = m[(col, col)];
            det *= p;
            for row in (col + 1)..D {
                let factor = m[(row, col)] / p;
                for k in col..D {
                    let v = m[(col, k)];
                    m[(row, k)] -= factor * v;
                }
            }
        }
        det
    }

    /// True when `M * M^T` is the identity within `1e-6`.
    pub fn is_orthogonal(&self) -> bool {
        let product = self.0 * self.0.transpose();
        (product - SMatrix::<f64, D, D>::identity()).amax() < 1e-6
    }

    /// Entry-wise comparison with an absolute tolerance.
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        (self.0 - other.0).amax() <= tolerance
    }
}

impl<const D: usize> Default for Direction<D> {
    fn default() -> Self {
        Self::identity()
    }
}

impl<const D: usize> std::ops::Index<(usize, usize)> for Direction<D> {
    type Output = f64;

    fn index(&self, index: (usize, usize)) -> &f64 {
        &self.0[index]
    }
}

impl<const D: usize> std::ops::IndexMut<(usize, usize)> for Direction<D> {
    fn index_mut(&mut self, index: (usize, usize)) -> &mut f64 {
        &mut self.0[index]
    }
}

impl<const D: usize> std::ops::Mul<Vector<D>> for Direction<D> {
    type Output = Vector<D>;

    fn mul(self, vector: Vector<D>) -> Vector<D> {
        Vector(self.0 * vector.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rotation_z(angle: f64) -> Direction<3> {
        let (s, c) = angle.sin_cos();
        Direction(SMatrix::<f64, 3, 3>::new(c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0))
    }

    #[test]
    fn test_determinant_matches_nalgebra() {
        let m = Direction(SMatrix::<f64, 3, 3>::new(2.0, 1.0, 0.5, 0.0, 3.0, 1.0, 4.0, 0.0, 1.0));
        assert!((m.determinant() - m.0.determinant()).abs() < 1e-9);
        assert!((rotation_z(0.3).determinant() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_singular_determinant_is_zero() {
        let m = Direction(SMatrix::<f64, 2, 2>::new(1.0, 2.0, 2.0, 4.0));
        assert!(m.determinant().abs() < 1e-12);
        assert!(m.try_inverse().is_none());
    }

    #[test]
    fn test_orthogonality() {
        assert!(Direction::<3>::identity().is_orthogonal());
        assert!(rotation_z(1.1).is_orthogonal());
        let mut skew = Direction::<3>::identity();
        skew[(0, 1)] = 0.5;
        assert!(!skew.is_orthogonal());
    }

    #[test]
    fn test_rotation_applies_to_vectors() {
        let v = rotation_z(std::f64::consts::FRAC_PI_2) * Vector::new([1.0, 0.0, 0.0]);
        assert!(v[0].abs() < 1e-12);
        assert!((v[1] - 1.0).abs() < 1e-12);
    }
}
