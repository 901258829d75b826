//! Training samples.
//!
//! A batch is an ordered slice of [`Sample`]s. Lengths are not enforced at construction:
//! the network checks every sample against its own topology before training.

use crate::{Error, Result};

/// One `(input, target)` training pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub input: Vec<f32>,
    pub target: Vec<f32>,
}

impl Sample {
    pub fn new(input: impl Into<Vec<f32>>, target: impl Into<Vec<f32>>) -> Self {
        Self {
            input: input.into(),
            target: target.into(),
        }
    }
}

/// Pair up per-sample input and target rows, keeping their order.
pub fn samples_from_rows(inputs: &[Vec<f32>], targets: &[Vec<f32>]) -> Result<Vec<Sample>> {
    if inputs.len() != targets.len() {
        return Err(Error::ShapeMismatch(format!(
            "inputs/targets length mismatch: {} vs {}",
            inputs.len(),
            targets.len()
        )));
    }

    Ok(inputs
        .iter()
        .zip(targets)
        .map(|(x, y)| Sample::new(x.clone(), y.clone()))
        .collect())
}
