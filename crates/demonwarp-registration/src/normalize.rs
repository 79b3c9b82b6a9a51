//! Intensity normalization by histogram matching.

use burn::tensor::backend::Backend;
use demonwarp_core::image::Image;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::config::RegistrationParameters;
use crate::error::{RegistrationError, Result};

/// Maps the intensities of one image onto the distribution of another.
pub trait Normalizable {
    /// Returns `target` with intensities remapped to match `reference`.
    /// Geometry is unchanged.
    fn normalize<B: Backend, const D: usize>(&self, reference: &Image<B, D>, target: &Image<B, D>) -> Result<Image<B, D>>;
}

/// Piecewise-linear histogram matching.
///
/// Both images are summarized by `match_points` equally spaced quantiles of
/// their histograms, anchored at a lower bound (the minimum, or the mean when
/// thresholding) and the maximum. Target intensities are mapped linearly
/// between corresponding quantiles. Below the lower anchor the mapping runs
/// from the target minimum to the reference minimum; above the maximum it
/// continues with the slope of the last segment.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramMatcher {
    histogram_levels: usize,
    match_points: usize,
    threshold_at_mean: bool,
}

impl HistogramMatcher {
    pub fn new(histogram_levels: usize, match_points: usize, threshold_at_mean: bool) -> Result<Self> {
        if histogram_levels == 0 {
            return Err(RegistrationError::invalid_histogram("number of histogram levels must be positive"));
        }
        if match_points == 0 {
            return Err(RegistrationError::invalid_histogram("number of match points must be positive"));
        }
        Ok(Self {
            histogram_levels,
            match_points,
            threshold_at_mean,
        })
    }

    pub fn from_parameters(params: &RegistrationParameters) -> Result<Self> {
        Self::new(
            params.number_of_histogram_levels,
            params.number_of_match_points,
            params.threshold_at_mean_intensity,
        )
    }

    pub fn histogram_levels(&self) -> usize {
        self.histogram_levels
    }

    pub fn match_points(&self) -> usize {
        self.match_points
    }

    /// Matches two host buffers. Returns `None` when either distribution
    /// has zero width above its lower bound.
    pub fn match_values(&self, reference: &[f32], target: &[f32]) -> Option<Vec<f32>> {
        let reference = Distribution::new(reference, self.threshold_at_mean)?;
        let target_dist = Distribution::new(target, self.threshold_at_mean)?;

        let reference_table = reference.quantile_table(self.histogram_levels, self.match_points);
        let target_table = target_dist.quantile_table(self.histogram_levels, self.match_points);
        let mapping = Mapping::new(&target_dist, &target_table, &reference, &reference_table);

        Some(target.par_iter().map(|&v| mapping.apply(v as f64) as f32).collect())
    }
}

impl Normalizable for HistogramMatcher {
    fn normalize<B: Backend, const D: usize>(&self, reference: &Image<B, D>, target: &Image<B, D>) -> Result<Image<B, D>> {
        let reference_values = reference.to_vec();
        let target_values = target.to_vec();
        match self.match_values(&reference_values, &target_values) {
            Some(matched) => {
                debug!(
                    "Histogram matched {} voxels with {} levels and {} match points",
                    matched.len(),
                    self.histogram_levels,
                    self.match_points
                );
                Ok(Image::from_vec(matched, target.geometry().clone(), &target.device()))
            }
            None => {
                warn!("Histogram matching skipped: an image has constant intensity above its lower bound");
                Ok(target.clone())
            }
        }
    }
}

/// Intensity range summary of one image.
struct Distribution<'a> {
    values: &'a [f32],
    min: f64,
    max: f64,
    lower: f64,
}

impl<'a> Distribution<'a> {
    fn new(values: &'a [f32], threshold_at_mean: bool) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let (min, max, sum) = values
            .par_iter()
            .fold(
                || (f64::INFINITY, f64::NEG_INFINITY, 0.0f64),
                |(lo, hi, sum), &v| (lo.min(v as f64), hi.max(v as f64), sum + v as f64),
            )
            .reduce(
                || (f64::INFINITY, f64::NEG_INFINITY, 0.0f64),
                |a, b| (a.0.min(b.0), a.1.max(b.1), a.2 + b.2),
            );
        let mean = sum / values.len() as f64;
        let lower = if threshold_at_mean { mean } else { min };
        if !(max - lower > f64::EPSILON * max.abs().max(1.0)) {
            return None;
        }
        Some(Self { values, min, max, lower })
    }

    /// Bin counts over `[lower, max]`; values below `lower` are ignored.
    fn histogram(&self, levels: usize) -> Vec<u64> {
        let width = (self.max - self.lower) / levels as f64;
        let lower = self.lower;
        self.values
            .par_iter()
            .fold(
                || vec![0u64; levels],
                |mut bins, &v| {
                    let v = v as f64;
                    if v >= lower {
                        let bin = (((v - lower) / width) as usize).min(levels - 1);
                        bins[bin] += 1;
                    }
                    bins
                },
            )
            .reduce(
                || vec![0u64; levels],
                |mut a, b| {
                    for (x, y) in a.iter_mut().zip(b) {
                        *x += y;
                    }
                    a
                },
            )
    }

    /// `[lower, q_1, .., q_n, max]` with `q_j` the `j / (n + 1)` quantile.
    fn quantile_table(&self, levels: usize, match_points: usize) -> Vec<f64> {
        let bins = self.histogram(levels);
        let total: u64 = bins.iter().sum();
        let width = (self.max - self.lower) / levels as f64;

        let mut table = Vec::with_capacity(match_points + 2);
        table.push(self.lower);
        for j in 1..=match_points {
            let wanted = total as f64 * j as f64 / (match_points + 1) as f64;
            let mut cumulative = 0.0;
            let mut value = self.max;
            for (bin, &count) in bins.iter().enumerate() {
                let next = cumulative + count as f64;
                if count > 0 && next >= wanted {
                    let fraction = (wanted - cumulative) / count as f64;
                    value = self.lower + (bin as f64 + fraction) * width;
                    break;
                }
                cumulative = next;
            }
            table.push(value);
        }
        table.push(self.max);
        table
    }
}

/// Piecewise-linear intensity mapping between two quantile tables.
struct Mapping {
    source: Vec<f64>,
    destination: Vec<f64>,
    source_min: f64,
    destination_min: f64,
    lower_slope: f64,
    upper_slope: f64,
}

impl Mapping {
    fn new(source: &Distribution<'_>, source_table: &[f64], destination: &Distribution<'_>, destination_table: &[f64]) -> Self {
        let n = source_table.len();
        let lower_slope = slope(source.min, source.lower, destination.min, destination.lower);
        let upper_slope = slope(
            source_table[n - 2],
            source_table[n - 1],
            destination_table[n - 2],
            destination_table[n - 1],
        );
        Self {
            source: source_table.to_vec(),
            destination: destination_table.to_vec(),
            source_min: source.min,
            destination_min: destination.min,
            lower_slope,
            upper_slope,
        }
    }

    fn apply(&self, v: f64) -> f64 {
        let n = self.source.len();
        if v < self.source[0] {
            return self.destination_min + (v - self.source_min) * self.lower_slope;
        }
        if v >= self.source[n - 1] {
            return self.destination[n - 1] + (v - self.source[n - 1]) * self.upper_slope;
        }
        // Quantiles may repeat; the first segment that contains `v` wins.
        let segment = self.source.windows(2).position(|w| v < w[1]).unwrap_or(n - 2);
        let (x0, x1) = (self.source[segment], self.source[segment + 1]);
        let (y0, y1) = (self.destination[segment], self.destination[segment + 1]);
        if x1 - x0 <= f64::EPSILON {
            y0
        } else {
            y0 + (v - x0) * (y1 - y0) / (x1 - x0)
        }
    }
}

fn slope(x0: f64, x1: f64, y0: f64, y1: f64) -> f64 {
    if (x1 - x0).abs() <= f64::EPSILON {
        1.0
    } else {
        (y1 - y0) / (x1 - x0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use demonwarp_core::image::ImageGeometry;
    use proptest::prelude::*;

    type TestBackend = NdArray<f32>;

    fn ramp(n: usize, scale: f32, offset: f32) -> Vec<f32> {
        (0..n).map(|i| offset + scale * i as f32).collect()
    }

    #[test]
    fn test_rejects_zero_configuration() {
        assert!(matches!(HistogramMatcher::new(0, 7, true), Err(RegistrationError::InvalidHistogramConfig(_))));
        assert!(matches!(HistogramMatcher::new(64, 0, true), Err(RegistrationError::InvalidHistogramConfig(_))));
    }

    #[test]
    fn test_linear_rescale_is_recovered() {
        let matcher = HistogramMatcher::new(1024, 7, false).unwrap();
        let reference = ramp(1000, 2.0, 10.0);
        let target = ramp(1000, 1.0, 0.0);
        let matched = matcher.match_values(&reference, &target).unwrap();
        for (m, r) in matched.iter().zip(&reference) {
            assert!((m - r).abs() < 2.0, "{} vs {}", m, r);
        }
    }

    #[test]
    fn test_constant_image_is_identity() {
        let device = Default::default();
        let geometry = ImageGeometry::<2>::with_size([4, 4]);
        let reference = Image::<TestBackend, 2>::from_vec(ramp(16, 1.0, 0.0), geometry.clone(), &device);
        let constant = Image::<TestBackend, 2>::from_vec(vec![3.0; 16], geometry, &device);
        let matcher = HistogramMatcher::new(64, 5, true).unwrap();
        assert_eq!(matcher.normalize(&reference, &constant).unwrap().to_vec(), vec![3.0; 16]);
        assert_eq!(matcher.normalize(&constant, &reference).unwrap().to_vec(), reference.to_vec());
    }

    #[test]
    fn test_below_mean_values_follow_lower_segment() {
        let matcher = HistogramMatcher::new(256, 3, true).unwrap();
        let reference = ramp(100, 1.0, 100.0);
        let target = ramp(100, 1.0, 0.0);
        let matched = matcher.match_values(&reference, &target).unwrap();
        // Minimum maps to minimum, and the mapping is monotone.
        assert!((matched[0] - 100.0).abs() < 1e-3);
        assert!(matched.windows(2).all(|w| w[1] >= w[0]));
    }

    proptest! {
        #[test]
        fn test_matching_to_itself_is_idempotent(
            values in proptest::collection::vec(0.0f32..1000.0, 50..300),
            threshold in any::<bool>()
        ) {
            let matcher = HistogramMatcher::new(1024, 7, threshold).unwrap();
            if let Some(matched) = matcher.match_values(&values, &values) {
                for (m, v) in matched.iter().zip(&values) {
                    prop_assert!((m - v).abs() < 1e-2 * v.abs().max(1.0));
                }
            }
        }
    }
}
