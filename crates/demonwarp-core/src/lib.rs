//! Image model for deformable registration.
//!
//! Scalar images with physical geometry, foreground masks, dense
//! deformation fields, interpolators and the filters a registration
//! pipeline is built from. All voxel data lives in burn tensors so the
//! same code runs on any backend.

pub mod image;
pub mod spatial;
pub mod transform;
pub mod interpolation;
pub mod filter;

pub use image::{ForegroundMask, Image, ImageGeometry};
pub use spatial::{Point, Vector, Spacing, Direction};
pub use transform::DeformationField;
