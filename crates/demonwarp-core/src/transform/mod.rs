//! Transform types and operations.
//!
//! Transforms map physical points between spaces. Dense deformation fields
//! live here as well, together with the transform that evaluates them at
//! arbitrary points.

pub mod trait_;
pub mod translation;
pub mod displacement_field;

pub use trait_::{IdentityTransform, Transform};
pub use translation::TranslationTransform;
pub use displacement_field::{DeformationField, DisplacementFieldTransform, MAX_SQUARING_STEPS};
