//! Validation utilities for registration inputs.
//!
//! Each check names the stage it runs in so that errors say where a bad
//! input was caught.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use demonwarp_core::image::{ForegroundMask, Image, ImageGeometry};

use crate::error::{RegistrationError, Result};

/// Validate that a grid is non-empty with positive spacing and an invertible direction.
pub fn validate_geometry<const D: usize>(stage: &str, name: &str, geometry: &ImageGeometry<D>) -> Result<()> {
    if geometry.is_valid() {
        return Ok(());
    }
    Err(RegistrationError::geometry_mismatch(
        stage,
        format!("{} image grid is unusable: {}", name, geometry),
    ))
}

/// Validate that two images share a grid.
pub fn validate_same_grid<B: Backend, const D: usize>(stage: &str, fixed: &Image<B, D>, moving: &Image<B, D>) -> Result<()> {
    if fixed.geometry().matches(moving.geometry()) {
        return Ok(());
    }
    Err(RegistrationError::geometry_mismatch(
        stage,
        format!("fixed grid ({}) differs from moving grid ({})", fixed.geometry(), moving.geometry()),
    ))
}

/// Validate that an optional mask lies on the given grid.
pub fn validate_mask<B: Backend, const D: usize>(
    stage: &str,
    geometry: &ImageGeometry<D>,
    mask: Option<&ForegroundMask<B, D>>,
) -> Result<()> {
    match mask {
        Some(mask) if !mask.geometry().matches(geometry) => {
            Err(RegistrationError::mask_geometry_mismatch(stage, geometry, mask.geometry()))
        }
        _ => Ok(()),
    }
}

/// True when every element is finite.
pub fn is_finite<B: Backend, const D: usize>(tensor: &Tensor<B, D>) -> bool {
    tensor.clone().into_data().iter::<f32>().all(f32::is_finite)
}

/// Validate that an image holds no NaN or infinite intensity.
pub fn validate_finite<B: Backend, const D: usize>(stage: &str, name: &str, image: &Image<B, D>) -> Result<()> {
    if is_finite(image.data()) {
        return Ok(());
    }
    Err(RegistrationError::NonFiniteIntensity {
        stage: stage.to_string(),
        image: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use demonwarp_core::spatial::{Direction, Point, Spacing};

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_validate_geometry() {
        assert!(validate_geometry("test", "fixed", &ImageGeometry::<3>::with_size([2, 2, 2])).is_ok());
        let flat = ImageGeometry::new([2, 2], Point::origin(), Spacing::new([1.0, 0.0]), Direction::identity());
        let err = validate_geometry("test", "fixed", &flat).unwrap_err();
        assert!(err.to_string().contains("fixed image grid is unusable"));
    }

    #[test]
    fn test_validate_same_grid() {
        let device = Default::default();
        let a = Image::<TestBackend, 2>::from_vec(vec![0.0; 4], ImageGeometry::with_size([2, 2]), &device);
        let b = Image::<TestBackend, 2>::from_vec(vec![0.0; 4], ImageGeometry::with_size([4, 1]), &device);
        assert!(validate_same_grid("test", &a, &a).is_ok());
        assert!(matches!(validate_same_grid("test", &a, &b), Err(RegistrationError::GeometryMismatch { .. })));
    }

    #[test]
    fn test_validate_mask() {
        let device = Default::default();
        let grid = ImageGeometry::<2>::with_size([2, 2]);
        let mask = ForegroundMask::<TestBackend, 2>::full(ImageGeometry::with_size([2, 3]), &device);
        assert!(validate_mask::<TestBackend, 2>("test", &grid, None).is_ok());
        assert!(matches!(
            validate_mask("test", &grid, Some(&mask)),
            Err(RegistrationError::MaskGeometryMismatch { .. })
        ));
    }

    #[test]
    fn test_is_finite() {
        let device = Default::default();
        let good = Tensor::<TestBackend, 1>::from_floats([1.0, 2.0], &device);
        let bad = Tensor::<TestBackend, 1>::from_floats([1.0, f32::NAN], &device);
        assert!(is_finite(&good));
        assert!(!is_finite(&bad));
    }

    #[test]
    fn test_validate_finite() {
        let device = Default::default();
        let grid = ImageGeometry::<2>::with_size([2, 2]);
        let good = Image::<TestBackend, 2>::from_vec(vec![0.0, 1.0, 2.0, 3.0], grid.clone(), &device);
        let bad = Image::<TestBackend, 2>::from_vec(vec![0.0, f32::INFINITY, 2.0, 3.0], grid, &device);
        assert!(validate_finite("test", "fixed", &good).is_ok());
        assert_eq!(
            validate_finite("test", "moving", &bad),
            Err(RegistrationError::NonFiniteIntensity { stage: "test".into(), image: "moving".into() })
        );
    }
}
