use burn::tensor::Tensor;
use burn_ndarray::NdArray;
use demonwarp_core::filter::ResampleImageFilter;
use demonwarp_core::image::{Image, ImageGeometry};
use demonwarp_core::interpolation::LinearInterpolator;
use demonwarp_core::spatial::{Direction, Point, Spacing, Vector};
use demonwarp_core::transform::{DeformationField, DisplacementFieldTransform, TranslationTransform};
use proptest::prelude::*;

type Backend = NdArray<f32>;

fn blob(geometry: ImageGeometry<3>) -> Image<Backend, 3> {
    let [nx, ny, nz] = geometry.size();
    let mut values = Vec::with_capacity(nx * ny * nz);
    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                let d2 = (x as f32 - 7.0).powi(2) + (y as f32 - 8.0).powi(2) + (z as f32 - 6.0).powi(2);
                values.push(100.0 * (-d2 / 18.0).exp());
            }
        }
    }
    Image::from_vec(values, geometry, &Default::default())
}

/// Smooth swirl around the grid centre, at most `amplitude` long.
fn swirl(geometry: ImageGeometry<2>, amplitude: f32) -> DeformationField<Backend, 2> {
    let [nx, ny] = geometry.size();
    let (cx, cy) = (nx as f32 / 2.0, ny as f32 / 2.0);
    let mut ux = Vec::with_capacity(nx * ny);
    let mut uy = Vec::with_capacity(nx * ny);
    for y in 0..ny {
        for x in 0..nx {
            let (dx, dy) = (x as f32 - cx, y as f32 - cy);
            let falloff = amplitude * (-(dx * dx + dy * dy) / 40.0).exp();
            ux.push(-dy / cx * falloff);
            uy.push(dx / cy * falloff);
        }
    }
    let device = Default::default();
    let shape = geometry.shape();
    let components = vec![
        Tensor::<Backend, 1>::from_floats(ux.as_slice(), &device).reshape(shape),
        Tensor::<Backend, 1>::from_floats(uy.as_slice(), &device).reshape(shape),
    ];
    DeformationField::from_components(components, geometry)
}

#[test]
fn test_constant_field_warp_matches_translation_resample() {
    let geometry = ImageGeometry::new([16, 16, 12], Point::new([-3.0, 2.0, 0.5]), Spacing::new([1.0, 1.5, 2.0]), Direction::identity());
    let image = blob(geometry.clone());
    let device = Default::default();

    let shift = [1.25f32, -0.5, 0.75];
    let components = shift
        .iter()
        .map(|&v| Tensor::<Backend, 3>::full(geometry.shape(), v, &device))
        .collect();
    let field = DeformationField::from_components(components, geometry.clone());
    let warped = field.warp_image(&image).to_vec();

    let translation = TranslationTransform::new(Vector::new([1.25, -0.5, 0.75]));
    let resampled = ResampleImageFilter::new_from_reference(&image, translation, LinearInterpolator::new())
        .apply(&image)
        .to_vec();
    for (a, b) in warped.iter().zip(&resampled) {
        assert!((a - b).abs() < 1e-3);
    }
}

#[test]
fn test_field_transform_resamples_like_warp() {
    let geometry = ImageGeometry::<2>::with_size([20, 20]);
    let field = swirl(geometry.clone(), 1.5);
    let image = Image::<Backend, 2>::from_vec(
        (0..400).map(|i| ((i % 20) as f32 * 0.3).sin() + (i / 20) as f32 * 0.1).collect(),
        geometry,
        &Default::default(),
    );
    let warped = field.warp_image(&image).to_vec();
    let transform = DisplacementFieldTransform::new(field);
    let resampled = ResampleImageFilter::new_from_reference(&image, transform, LinearInterpolator::new())
        .apply(&image)
        .to_vec();
    for (a, b) in warped.iter().zip(&resampled) {
        assert!((a - b).abs() < 1e-4);
    }
}

#[test]
fn test_exponential_of_negated_velocity_inverts() {
    let geometry = ImageGeometry::<2>::with_size([24, 24]);
    let velocity = swirl(geometry, 2.0);
    let forward = velocity.exponential();
    let backward = velocity.scale(-1.0).exponential();
    let residual = forward.compose(&backward);
    // Interior only: edge replication breaks exact inversion at the border.
    let norms = residual.physical_norms().into_data().to_vec::<f32>().unwrap();
    for y in 4..20 {
        for x in 4..20 {
            assert!(norms[y * 24 + x] < 0.05, "residual {} at ({x}, {y})", norms[y * 24 + x]);
        }
    }
}

proptest! {
    #[test]
    fn test_scaled_field_norms_scale(
        amplitude in 0.1f32..3.0,
        factor in 0.1f64..4.0
    ) {
        let field = swirl(ImageGeometry::<2>::with_size([12, 12]), amplitude);
        let scaled = field.scale(factor);
        let expected = field.max_physical_norm() * factor;
        prop_assert!((scaled.max_physical_norm() - expected).abs() < 1e-4 * expected.max(1.0));
    }

    #[test]
    fn test_resample_to_same_grid_is_identity(amplitude in 0.0f32..2.0) {
        let geometry = ImageGeometry::<2>::with_size([10, 10]);
        let field = swirl(geometry.clone(), amplitude);
        let resampled = field.resample(&geometry);
        prop_assert_eq!(
            resampled.vectors().into_data().to_vec::<f32>().unwrap(),
            field.vectors().into_data().to_vec::<f32>().unwrap()
        );
    }
}
