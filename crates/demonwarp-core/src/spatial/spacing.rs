//! Voxel spacing.

use super::Vector;

/// Physical distance between neighbouring voxels along each axis.
pub type Spacing<const D: usize> = Vector<D>;

impl<const D: usize> Spacing<D> {
    pub fn uniform(value: f64) -> Self {
        Self::broadcast(&[value])
    }

    pub fn min_spacing(&self) -> f64 {
        self.0.min()
    }

    pub fn max_spacing(&self) -> f64 {
        self.0.max()
    }

    /// Mean of the squared spacings. The Demons force uses this as the
    /// intensity-to-distance normalizer.
    pub fn mean_squared(&self) -> f64 {
        if D == 0 {
            return 1.0;
        }
        self.0.norm_squared() / D as f64
    }

    /// Spacing after shrinking each axis by an integer factor.
    pub fn shrunk(&self, factors: &[usize; D]) -> Self {
        let mut out = *self;
        for axis in 0..D {
            out[axis] *= factors[axis] as f64;
        }
        out
    }

    /// True when every component is finite and strictly positive.
    pub fn is_valid(&self) -> bool {
        self.0.iter().all(|s| s.is_finite() && *s > 0.0)
    }
}
