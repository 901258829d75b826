use rand::Rng;
use rand::distributions::{Distribution, Uniform};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Activation, Error, Result};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
/// Parameter initialization scheme.
pub enum Init {
    /// Every value is `0.0`.
    #[default]
    Zeros,
    /// Uniform in `[-limit, limit]`.
    Uniform { limit: f32 },
    /// Xavier/Glorot uniform: `limit = sqrt(6 / (in_dim + out_dim))`.
    Xavier,
    /// He/Kaiming uniform: `limit = sqrt(6 / in_dim)`.
    He,
}

impl Init {
    /// Validate initializer parameters.
    pub fn validate(self) -> Result<()> {
        if let Init::Uniform { limit } = self {
            if !(limit.is_finite() && limit > 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "uniform init limit must be finite and > 0, got {limit}"
                )));
            }
        }
        Ok(())
    }

    /// Weight initializer matched to an activation.
    pub fn for_activation(activation: Activation) -> Self {
        match activation {
            Activation::Sigmoid => Init::Xavier,
            Activation::ReLU => Init::He,
        }
    }

    fn limit(self, in_dim: usize, out_dim: usize) -> Option<f32> {
        match self {
            Init::Zeros => None,
            Init::Uniform { limit } => Some(limit),
            Init::Xavier => Some((6.0 / (in_dim + out_dim) as f32).sqrt()),
            Init::He => Some((6.0 / in_dim as f32).sqrt()),
        }
    }

    /// Overwrite `values` according to this scheme.
    pub(crate) fn fill<R: Rng + ?Sized>(
        self,
        values: &mut [f32],
        in_dim: usize,
        out_dim: usize,
        rng: &mut R,
    ) {
        match self.limit(in_dim, out_dim) {
            None => values.fill(0.0),
            Some(limit) => {
                let dist = Uniform::new_inclusive(-limit, limit);
                for v in values.iter_mut() {
                    *v = dist.sample(rng);
                }
            }
        }
    }
}

/// One affine transform: `z = W x + b`.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    in_dim: usize,
    out_dim: usize,
    /// Row-major matrix with shape (out_dim, in_dim).
    weights: Vec<f32>,
    biases: Vec<f32>,
}

impl Layer {
    /// A zero-initialized layer.
    #[inline]
    pub fn new(in_dim: usize, out_dim: usize) -> Self {
        Self {
            in_dim,
            out_dim,
            weights: vec![0.0; in_dim * out_dim],
            biases: vec![0.0; out_dim],
        }
    }

    pub fn new_with_rng<R: Rng + ?Sized>(
        in_dim: usize,
        out_dim: usize,
        weight_init: Init,
        bias_init: Init,
        rng: &mut R,
    ) -> Result<Self> {
        if in_dim == 0 || out_dim == 0 {
            return Err(Error::InvalidTopology(format!(
                "layer dims must be > 0, got in_dim={in_dim} out_dim={out_dim}"
            )));
        }
        weight_init.validate()?;
        bias_init.validate()?;

        let mut layer = Self::new(in_dim, out_dim);
        layer.init(weight_init, bias_init, rng);
        Ok(layer)
    }

    /// Build a layer from explicit parameters.
    pub fn from_parts(
        in_dim: usize,
        out_dim: usize,
        weights: Vec<f32>,
        biases: Vec<f32>,
    ) -> Result<Self> {
        if in_dim == 0 || out_dim == 0 {
            return Err(Error::InvalidTopology(format!(
                "layer dims must be > 0, got in_dim={in_dim} out_dim={out_dim}"
            )));
        }
        if weights.len() != in_dim * out_dim {
            return Err(Error::ShapeMismatch(format!(
                "weights length {} does not match out_dim * in_dim ({out_dim} * {in_dim})",
                weights.len()
            )));
        }
        if biases.len() != out_dim {
            return Err(Error::ShapeMismatch(format!(
                "biases length {} does not match out_dim {out_dim}",
                biases.len()
            )));
        }
        Ok(Self {
            in_dim,
            out_dim,
            weights,
            biases,
        })
    }

    pub(crate) fn init<R: Rng + ?Sized>(
        &mut self,
        weight_init: Init,
        bias_init: Init,
        rng: &mut R,
    ) {
        weight_init.fill(&mut self.weights, self.in_dim, self.out_dim, rng);
        bias_init.fill(&mut self.biases, self.in_dim, self.out_dim, rng);
    }

    #[inline]
    pub fn in_dim(&self) -> usize {
        self.in_dim
    }

    #[inline]
    pub fn out_dim(&self) -> usize {
        self.out_dim
    }

    #[inline]
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    #[inline]
    pub fn biases(&self) -> &[f32] {
        &self.biases
    }

    #[inline]
    pub(crate) fn weights_mut(&mut self) -> &mut [f32] {
        &mut self.weights
    }

    #[inline]
    pub(crate) fn biases_mut(&mut self) -> &mut [f32] {
        &mut self.biases
    }

    /// Weights feeding output unit `j` (length `in_dim`).
    #[inline]
    pub fn row(&self, j: usize) -> &[f32] {
        let start = j * self.in_dim;
        &self.weights[start..start + self.in_dim]
    }

    /// Number of scalars held by this layer (weights + biases).
    #[inline]
    pub fn param_count(&self) -> usize {
        self.weights.len() + self.biases.len()
    }

    /// Forward pass for a single sample.
    ///
    /// Computes `outputs = activation(W * inputs + b)`.
    ///
    /// Shape contract:
    /// - `inputs.len() == self.in_dim`
    /// - `outputs.len() == self.out_dim`
    #[inline]
    pub fn forward(&self, inputs: &[f32], outputs: &mut [f32], activation: Activation) {
        debug_assert_eq!(inputs.len(), self.in_dim);
        debug_assert_eq!(outputs.len(), self.out_dim);

        for (o, out) in outputs.iter_mut().enumerate() {
            let mut sum = self.biases[o];
            for (&w, &x) in self.row(o).iter().zip(inputs) {
                sum += w * x;
            }
            *out = activation.forward(sum);
        }
    }

    /// Computes `W^T * deltas` into `d_inputs` (overwrite semantics).
    ///
    /// Shape contract:
    /// - `deltas.len() == self.out_dim`
    /// - `d_inputs.len() == self.in_dim`
    #[inline]
    pub fn backprop(&self, deltas: &[f32], d_inputs: &mut [f32]) {
        debug_assert_eq!(deltas.len(), self.out_dim);
        debug_assert_eq!(d_inputs.len(), self.in_dim);

        d_inputs.fill(0.0);
        for (o, &d) in deltas.iter().enumerate() {
            for (acc, &w) in d_inputs.iter_mut().zip(self.row(o)) {
                *acc += w * d;
            }
        }
    }

    /// Plain SGD update from this layer's error signal:
    ///
    /// - `W[j][k] -= lr * deltas[j] * inputs[k]`
    /// - `b[j] -= lr * deltas[j]`
    #[inline]
    pub fn sgd_step(&mut self, inputs: &[f32], deltas: &[f32], lr: f32) {
        debug_assert_eq!(inputs.len(), self.in_dim);
        debug_assert_eq!(deltas.len(), self.out_dim);

        for (o, &d) in deltas.iter().enumerate() {
            let row = o * self.in_dim;
            let step = lr * d;
            for (w, &x) in self.weights[row..row + self.in_dim].iter_mut().zip(inputs) {
                *w -= step * x;
            }
            self.biases[o] -= step;
        }
    }
}
