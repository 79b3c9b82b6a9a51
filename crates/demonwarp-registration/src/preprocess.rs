//! Input preparation ahead of registration.

use burn::tensor::backend::Backend;
use demonwarp_core::filter::{MedianFilter, ResampleImageFilter};
use demonwarp_core::image::{ForegroundMask, Image};
use demonwarp_core::interpolation::{LinearInterpolator, NearestNeighborInterpolator};
use demonwarp_core::transform::IdentityTransform;
use tracing::info;

use crate::config::RegistrationParameters;
use crate::error::Result;
use crate::mask::{ForegroundMasker, Maskable};
use crate::normalize::{HistogramMatcher, Normalizable};
use crate::validation::{validate_finite, validate_geometry, validate_mask};

/// Images ready for registration: both on the fixed grid.
#[derive(Debug, Clone)]
pub struct PreparedImages<B: Backend, const D: usize> {
    pub fixed: Image<B, D>,
    pub moving: Image<B, D>,
    /// Minimum of the fixed input before any filtering.
    pub fixed_min: f64,
    /// Minimum of the moving input before any filtering.
    pub moving_min: f64,
    pub fixed_mask: Option<ForegroundMask<B, D>>,
    /// Moving mask, moved onto the fixed grid.
    pub moving_mask: Option<ForegroundMask<B, D>>,
}

/// Filters, aligns, normalizes and masks a fixed/moving pair.
#[derive(Debug, Clone)]
pub struct Preprocessor<N = HistogramMatcher, M = ForegroundMasker> {
    normalizer: N,
    masker: M,
    use_histogram_matching: bool,
    median_filter_radius: Vec<usize>,
    mask_background: Option<f32>,
}

impl Preprocessor {
    /// Histogram matching and masking as configured in `params`.
    pub fn from_parameters(params: &RegistrationParameters) -> Result<Self> {
        Self::new(
            HistogramMatcher::from_parameters(params)?,
            ForegroundMasker::from_parameters(params),
            params,
        )
    }
}

impl<N: Normalizable, M: Maskable> Preprocessor<N, M> {
    pub fn new(normalizer: N, masker: M, params: &RegistrationParameters) -> Result<Self> {
        params.validate_histogram()?;
        Ok(Self {
            normalizer,
            masker,
            use_histogram_matching: params.use_histogram_matching,
            median_filter_radius: params.median_filter_radius.clone(),
            mask_background: params.mask_background,
        })
    }

    pub fn normalizer(&self) -> &N {
        &self.normalizer
    }

    pub fn masker(&self) -> &M {
        &self.masker
    }

    /// Runs every preparation step.
    ///
    /// 1. Validate grids and intensities, record the input minima.
    /// 2. Median filter both images when a radius is configured.
    /// 3. Clean the masks on their own grids.
    /// 4. Move the moving image (linear) and its mask (nearest) onto the fixed grid.
    /// 5. Histogram match moving to fixed when enabled.
    /// 6. Apply the masks.
    pub fn prepare<B: Backend, const D: usize>(
        &self,
        fixed: &Image<B, D>,
        moving: &Image<B, D>,
        fixed_mask: Option<&ForegroundMask<B, D>>,
        moving_mask: Option<&ForegroundMask<B, D>>,
    ) -> Result<PreparedImages<B, D>> {
        validate_geometry("preprocessing", "fixed", fixed.geometry())?;
        validate_geometry("preprocessing", "moving", moving.geometry())?;
        validate_mask("preprocessing", fixed.geometry(), fixed_mask)?;
        validate_mask("preprocessing", moving.geometry(), moving_mask)?;
        validate_finite("preprocessing", "fixed", fixed)?;
        validate_finite("preprocessing", "moving", moving)?;

        let fixed_min = fixed.min_value();
        let moving_min = moving.min_value();

        let (mut fixed_image, mut moving_image) = (fixed.clone(), moving.clone());
        if self.median_filter_radius.iter().any(|&r| r > 0) {
            info!("Median filtering inputs with radius {:?}", self.median_filter_radius);
            let median = MedianFilter::new(self.median_filter_radius.clone());
            fixed_image = median.apply(&fixed_image);
            moving_image = median.apply(&moving_image);
        }

        let fixed_mask = fixed_mask.map(|m| self.masker.clean_mask(m)).transpose()?;
        let mut moving_mask = moving_mask.map(|m| self.masker.clean_mask(m)).transpose()?;

        if !moving_image.geometry().matches(fixed.geometry()) {
            info!("Resampling moving image onto the fixed grid ({})", fixed.geometry());
            moving_image = ResampleImageFilter::new(fixed.geometry().clone(), IdentityTransform, LinearInterpolator::new())
                .with_default_pixel_value(moving_image.min_value())
                .apply(&moving_image);
            moving_mask = moving_mask.map(|mask| {
                let resampled = ResampleImageFilter::new(fixed.geometry().clone(), IdentityTransform, NearestNeighborInterpolator::new())
                    .with_default_pixel_value(0.0)
                    .apply(mask.image());
                ForegroundMask::from_image(&resampled)
            });
        }

        if self.use_histogram_matching {
            info!("Matching moving histogram to fixed");
            moving_image = self.normalizer.normalize(&fixed_image, &moving_image)?;
        }

        if let Some(mask) = &fixed_mask {
            fixed_image = self.masker.apply_mask(&fixed_image, mask, self.mask_background)?;
        }
        if let Some(mask) = &moving_mask {
            moving_image = self.masker.apply_mask(&moving_image, mask, self.mask_background)?;
        }

        Ok(PreparedImages {
            fixed: fixed_image,
            moving: moving_image,
            fixed_min,
            moving_min,
            fixed_mask,
            moving_mask,
        })
    }
}
