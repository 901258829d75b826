//! Parameter storage.
//!
//! `LayerStore` owns every layer's weights and biases plus the learning rate. It only
//! does shape bookkeeping and the flat parameter view used by persistence; the math
//! lives in [`crate::mlp`].
//!
//! Flat layout (shared by [`LayerStore::export_parameters`], [`LayerStore::import_parameters`]
//! and the binary formats): every layer's weights in layer order, row-major within a layer,
//! followed by every layer's biases in layer order.

use rand::Rng;

use crate::{Error, Init, Layer, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct LayerStore {
    layers: Vec<Layer>,
    learning_rate: f32,
}

pub(crate) fn validate_widths(widths: &[usize]) -> Result<()> {
    if widths.len() < 2 {
        return Err(Error::InvalidTopology(format!(
            "widths must include input and output dims, got {} width(s)",
            widths.len()
        )));
    }
    if let Some(idx) = widths.iter().position(|&w| w == 0) {
        return Err(Error::InvalidTopology(format!(
            "all widths must be > 0, width {idx} is 0"
        )));
    }
    Ok(())
}

pub(crate) fn validate_learning_rate(learning_rate: f32) -> Result<()> {
    if !(learning_rate.is_finite() && learning_rate > 0.0) {
        return Err(Error::InvalidConfig(format!(
            "learning rate must be finite and > 0, got {learning_rate}"
        )));
    }
    Ok(())
}

impl LayerStore {
    /// One layer per consecutive pair of `widths`, initialized from `rng`.
    pub fn new<R: Rng + ?Sized>(
        widths: &[usize],
        learning_rate: f32,
        weight_init: Init,
        bias_init: Init,
        rng: &mut R,
    ) -> Result<Self> {
        validate_widths(widths)?;
        validate_learning_rate(learning_rate)?;
        weight_init.validate()?;
        bias_init.validate()?;

        let mut layers = Vec::with_capacity(widths.len() - 1);
        for w in widths.windows(2) {
            layers.push(Layer::new_with_rng(w[0], w[1], weight_init, bias_init, rng)?);
        }
        Ok(Self {
            layers,
            learning_rate,
        })
    }

    /// All-zero parameters. No randomness involved.
    pub fn zeros(widths: &[usize], learning_rate: f32) -> Result<Self> {
        validate_widths(widths)?;
        validate_learning_rate(learning_rate)?;

        let layers = widths.windows(2).map(|w| Layer::new(w[0], w[1])).collect();
        Ok(Self {
            layers,
            learning_rate,
        })
    }

    /// Assemble a store from existing layers, checking that they chain.
    pub fn from_layers(layers: Vec<Layer>, learning_rate: f32) -> Result<Self> {
        if layers.is_empty() {
            return Err(Error::InvalidTopology(
                "store must have at least one layer".to_owned(),
            ));
        }
        validate_learning_rate(learning_rate)?;
        for (i, pair) in layers.windows(2).enumerate() {
            if pair[1].in_dim() != pair[0].out_dim() {
                return Err(Error::ShapeMismatch(format!(
                    "layer {} in_dim {} does not match layer {i} out_dim {}",
                    i + 1,
                    pair[1].in_dim(),
                    pair[0].out_dim()
                )));
            }
        }
        let store = Self {
            layers,
            learning_rate,
        };
        validate_widths(&store.widths())?;
        Ok(store)
    }

    /// Re-initialize every parameter in place. Topology is unchanged.
    pub fn reset<R: Rng + ?Sized>(
        &mut self,
        weight_init: Init,
        bias_init: Init,
        rng: &mut R,
    ) -> Result<()> {
        weight_init.validate()?;
        bias_init.validate()?;
        for layer in &mut self.layers {
            layer.init(weight_init, bias_init, rng);
        }
        Ok(())
    }

    #[inline]
    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    pub fn set_learning_rate(&mut self, learning_rate: f32) -> Result<()> {
        validate_learning_rate(learning_rate)?;
        self.learning_rate = learning_rate;
        Ok(())
    }

    #[inline]
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    #[inline]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    #[inline]
    pub(crate) fn layers_mut(&mut self) -> &mut [Layer] {
        &mut self.layers
    }

    #[inline]
    pub fn layer(&self, idx: usize) -> Option<&Layer> {
        self.layers.get(idx)
    }

    #[inline]
    pub fn input_dim(&self) -> usize {
        self.layers[0].in_dim()
    }

    #[inline]
    pub fn output_dim(&self) -> usize {
        self.layers[self.layers.len() - 1].out_dim()
    }

    /// Declared widths, input first: `[in, hidden.., out]`.
    pub fn widths(&self) -> Vec<usize> {
        let mut widths = Vec::with_capacity(self.layers.len() + 1);
        widths.push(self.input_dim());
        widths.extend(self.layers.iter().map(Layer::out_dim));
        widths
    }

    /// Total number of weights and biases.
    pub fn param_count(&self) -> usize {
        self.layers.iter().map(Layer::param_count).sum()
    }

    /// Flat copy of every parameter: all weights (layer order, row-major), then all biases.
    pub fn export_parameters(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.param_count());
        for layer in &self.layers {
            out.extend_from_slice(layer.weights());
        }
        for layer in &self.layers {
            out.extend_from_slice(layer.biases());
        }
        out
    }

    /// Overwrite every parameter from a flat sequence in export order.
    ///
    /// The length is checked before anything is written. Topology is never changed, so a
    /// sequence from a different topology with the same total length is accepted.
    pub fn import_parameters(&mut self, params: &[f32]) -> Result<()> {
        let expected = self.param_count();
        if params.len() != expected {
            return Err(Error::ShapeMismatch(format!(
                "parameter count {} does not match topology {:?} ({expected} parameters)",
                params.len(),
                self.widths()
            )));
        }

        let mut offset = 0;
        for layer in &mut self.layers {
            let w = layer.weights_mut();
            w.copy_from_slice(&params[offset..offset + w.len()]);
            offset += w.len();
        }
        for layer in &mut self.layers {
            let b = layer.biases_mut();
            b.copy_from_slice(&params[offset..offset + b.len()]);
            offset += b.len();
        }
        Ok(())
    }
}
