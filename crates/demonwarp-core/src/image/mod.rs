//! Images, grid geometry and foreground masks.

pub mod image;
pub mod geometry;
pub mod grid;
pub mod mask;

pub use image::Image;
pub use geometry::{ImageGeometry, GEOMETRY_TOLERANCE};
pub use grid::{axis_strides, generate_grid};
pub use mask::ForegroundMask;
