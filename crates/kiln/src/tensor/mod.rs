//! Plain `f32` tensors exchanged with an inference session.
//!
//! The worker never does tensor math itself. It wraps the caller's vector into a
//! rank-1 tensor named [`constant::INPUT_NAME`], hands it to the session and reads
//! the tensor named [`constant::OUTPUT_NAME`] back out.

pub mod constant;

use std::collections::HashMap;

/// Named tensors going into, or coming out of, a session run.
pub type NamedTensors = HashMap<String, Tensor>;

/// A dense, row-major `f32` tensor.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    data: Vec<f32>,
    shape: Vec<usize>,
}

impl Tensor {
    /// Build a rank-1 tensor whose only dimension is the length of `data`.
    pub fn vector(data: Vec<f32>) -> Self {
        let shape = vec![data.len()];
        Self { data, shape }
    }

    /// Build a tensor with an explicit shape.
    ///
    /// Returns `None` when the element count implied by `shape` does not match `data`.
    pub fn with_shape(data: Vec<f32>, shape: Vec<usize>) -> Option<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return None;
        }
        Some(Self { data, shape })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Flatten into the underlying element buffer.
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }
}
