//! Image filters.
//!
//! Every filter takes images by reference and returns new ones.

pub mod gaussian;
pub mod downsample;
pub mod pyramid;
pub mod resample;
pub mod gradient;
pub mod median;
pub mod checkerboard;

pub use gaussian::GaussianFilter;
pub use resample::ResampleImageFilter;
pub use pyramid::MultiResolutionPyramid;
pub use downsample::DownsampleFilter;
pub use gradient::GradientFilter;
pub use median::MedianFilter;
pub use checkerboard::CheckerboardFilter;
