//! Rigid translation.

use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor, TensorData};

use crate::spatial::Vector;
use super::trait_::Transform;

/// Shifts every point by a fixed physical offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranslationTransform<const D: usize> {
    offset: Vector<D>,
}

impl<const D: usize> TranslationTransform<D> {
    pub fn new(offset: Vector<D>) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> &Vector<D> {
        &self.offset
    }

    pub fn inverse(&self) -> Self {
        Self::new(-self.offset)
    }
}

impl<B: Backend, const D: usize> Transform<B, D> for TranslationTransform<D> {
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let values: Vec<f32> = self.offset.to_array().iter().map(|&v| v as f32).collect();
        let row = Tensor::from_data(TensorData::new(values, Shape::new([1, D])), &points.device());
        points + row
    }
}
