mod common;

use std::sync::Arc;

use common::{ball_mask, blurred_sphere, shifted};
use demonwarp_registration::{
    normalized_cross_correlation, FieldStatistics, HistoryCallback, ProgressTracker, RegistrationParameters,
    RegistrationPipeline,
};

const SIZE: usize = 64;
const RADIUS: f32 = 16.0;
const SHIFT: f64 = 2.0;

#[test]
fn test_translated_sphere_is_recovered() {
    let fixed = blurred_sphere([SIZE; 3], RADIUS);
    let moving = shifted(&fixed, [SHIFT, 0.0, 0.0]);

    let params = RegistrationParameters::new()
        .with_number_of_levels(3)
        .with_shrink_factors(vec![vec![4], vec![2], vec![1]])
        .with_iterations_per_level(vec![50, 30, 10]);
    let history = Arc::new(HistoryCallback::new());
    let mut pipeline = RegistrationPipeline::new(&params)
        .unwrap()
        .with_progress(ProgressTracker::new().with_callback(history.clone()));

    let result = pipeline.run(&fixed, &moving, None, None, None).unwrap();

    let sphere = ball_mask([SIZE; 3], RADIUS).image().to_vec();
    let ux = result.field.component_image(0).to_vec();
    let (sum, count) = ux
        .iter()
        .zip(&sphere)
        .filter(|(_, m)| **m > 0.5)
        .fold((0.0f64, 0usize), |(sum, count), (u, _)| (sum + *u as f64, count + 1));
    let mean_ux = sum / count as f64;
    assert!((mean_ux - SHIFT).abs() < 0.15 * SHIFT, "mean u_x over the sphere is {}", mean_ux);

    let ncc = normalized_cross_correlation(&fixed, &result.warped, None).unwrap();
    assert!(ncc > 0.9, "NCC {}", ncc);

    let stats = FieldStatistics::compute(&result.field);
    assert_eq!(stats.folded_fraction, 0.0);

    assert_eq!(history.level_history(0).len(), 50);
    assert_eq!(history.level_history(2).len(), 10);
    let reports = &result.reports;
    assert!(reports[2].final_mse().unwrap() < reports[0].initial_mse().unwrap());
}
