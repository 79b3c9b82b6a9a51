//! Multi-resolution Demons deformable registration.
//!
//! The pipeline runs in two phases. [`Preprocessor`] puts a fixed/moving
//! pair on one grid (median filter, mask cleanup, resampling, histogram
//! matching, masking), then [`MultiResolutionRegistrator`] drives a
//! [`LevelSolver`] (by default [`DemonsIterator`]) from the coarsest pyramid
//! level to the finest. [`RegistrationPipeline`] wires both together.

pub mod config;
pub mod demons;
pub mod error;
pub mod mask;
pub mod metric;
pub mod multires;
pub mod normalize;
pub mod pipeline;
pub mod preprocess;
pub mod progress;
pub mod validation;

pub use config::{ForceStrategy, InterpolationMode, MaskCleanup, RegistrationParameters, UpdateRule};
pub use demons::{DemonsForce, DemonsIterator, DemonsSettings, IterationState, LevelReport, LevelSolver};
pub use error::{RegistrationError, Result};
pub use mask::{ForegroundMasker, Maskable};
pub use metric::{mean_squared_error, normalized_cross_correlation, FieldStatistics};
pub use multires::{MultiResolutionRegistrator, PipelineResult};
pub use normalize::{HistogramMatcher, Normalizable};
pub use pipeline::RegistrationPipeline;
pub use preprocess::{PreparedImages, Preprocessor};
pub use progress::{
    CancellationToken, ConsoleProgressCallback, HistoryCallback, ProgressCallback, ProgressInfo, ProgressTracker,
};
