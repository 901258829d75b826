//! Model serialization/deserialization (feature: `serde`).
//!
//! This module defines a versioned JSON format for `Mlp`, an alternative to the
//! binary formats in [`crate::persist`] for inspection and interchange.
//!
//! The JSON shape is its own set of types rather than the in-memory structs, so the
//! file format stays put when internals move. Loading goes through the same shape
//! checks as [`LayerStore::from_layers`] and rejects non-finite parameters.

use serde::{Deserialize, Serialize};

use crate::{Activation, Error, Layer, LayerStore, Mlp, Result};

use std::path::Path;

pub const MODEL_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedMlp {
    pub format_version: u32,
    pub activation: SerializedActivation,
    pub learning_rate: f32,
    pub layers: Vec<SerializedLayer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedLayer {
    pub in_dim: usize,
    pub out_dim: usize,
    /// Row-major (out_dim, in_dim).
    pub weights: Vec<f32>,
    pub biases: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerializedActivation {
    Sigmoid,
    Relu,
}

impl From<Activation> for SerializedActivation {
    fn from(value: Activation) -> Self {
        match value {
            Activation::Sigmoid => SerializedActivation::Sigmoid,
            Activation::ReLU => SerializedActivation::Relu,
        }
    }
}

impl From<SerializedActivation> for Activation {
    fn from(value: SerializedActivation) -> Self {
        match value {
            SerializedActivation::Sigmoid => Activation::Sigmoid,
            SerializedActivation::Relu => Activation::ReLU,
        }
    }
}

impl SerializedMlp {
    /// Header checks; layer shapes are checked while the store is rebuilt.
    pub fn validate(&self) -> Result<()> {
        if self.format_version != MODEL_FORMAT_VERSION {
            return Err(Error::InvalidData(format!(
                "unsupported model format_version {}; expected {MODEL_FORMAT_VERSION}",
                self.format_version
            )));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::InvalidData(format!(
                "learning_rate must be finite and > 0, got {}",
                self.learning_rate
            )));
        }
        let non_finite = self
            .layers
            .iter()
            .flat_map(|l| l.weights.iter().chain(&l.biases))
            .any(|v| !v.is_finite());
        if non_finite {
            return Err(Error::InvalidData(
                "parameters must all be finite".to_owned(),
            ));
        }
        Ok(())
    }
}

impl From<&Mlp> for SerializedMlp {
    fn from(model: &Mlp) -> Self {
        Self {
            format_version: MODEL_FORMAT_VERSION,
            activation: model.activation().into(),
            learning_rate: model.learning_rate(),
            layers: model
                .store()
                .layers()
                .iter()
                .map(SerializedLayer::from)
                .collect(),
        }
    }
}

impl From<&Layer> for SerializedLayer {
    fn from(layer: &Layer) -> Self {
        Self {
            in_dim: layer.in_dim(),
            out_dim: layer.out_dim(),
            weights: layer.weights().to_vec(),
            biases: layer.biases().to_vec(),
        }
    }
}

impl TryFrom<SerializedMlp> for Mlp {
    type Error = Error;

    fn try_from(value: SerializedMlp) -> std::result::Result<Self, Self::Error> {
        value.validate()?;

        let layers = value
            .layers
            .into_iter()
            .enumerate()
            .map(|(i, l)| {
                Layer::from_parts(l.in_dim, l.out_dim, l.weights, l.biases)
                    .map_err(|e| Error::InvalidData(format!("layer {i}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        let store = LayerStore::from_layers(layers, value.learning_rate)
            .map_err(|e| Error::InvalidData(e.to_string()))?;
        Ok(Mlp::new(store, value.activation.into()))
    }
}

impl Mlp {
    /// Serialize the model to a pretty-printed JSON string.
    pub fn to_json_string_pretty(&self) -> Result<String> {
        let ser = SerializedMlp::from(self);
        serde_json::to_string_pretty(&ser)
            .map_err(|e| Error::InvalidData(format!("failed to serialize model: {e}")))
    }

    /// Parse a model from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let ser: SerializedMlp = serde_json::from_str(s)
            .map_err(|e| Error::InvalidData(format!("failed to parse model json: {e}")))?;
        ser.try_into()
    }

    /// Save the model to a JSON file (pretty-printed).
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let s = self.to_json_string_pretty()?;
        let p = path.as_ref();
        std::fs::write(p, s)
            .map_err(|e| Error::persistence(format!("failed to write {}", p.display()), e))?;
        Ok(())
    }

    /// Load a model from a JSON file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let p = path.as_ref();
        let s = std::fs::read_to_string(p)
            .map_err(|e| Error::persistence(format!("failed to read {}", p.display()), e))?;
        Self::from_json_str(&s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_model() -> Mlp {
        let l1 = Layer::from_parts(
            2,
            3,
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            vec![0.1, 0.2, 0.3],
        )
        .unwrap();
        let l2 = Layer::from_parts(3, 1, vec![7.0, 8.0, 9.0], vec![0.4]).unwrap();
        Mlp::new(
            LayerStore::from_layers(vec![l1, l2], 0.5).unwrap(),
            Activation::ReLU,
        )
    }

    #[test]
    fn json_roundtrips() {
        let mlp = sample_model();
        let json = mlp.to_json_string_pretty().unwrap();
        assert!(json.contains("\"activation\": \"relu\""));

        let loaded = Mlp::from_json_str(&json).unwrap();
        assert_eq!(loaded, mlp);
        assert_eq!(loaded.to_json_string_pretty().unwrap(), json);
    }

    #[test]
    fn rejects_unknown_version() {
        let bad = r#"{"format_version":999,"activation":"sigmoid","learning_rate":0.1,"layers":[]}"#;
        let err = Mlp::from_json_str(bad).unwrap_err();
        assert!(format!("{err}").contains("format_version"));
    }

    #[test]
    fn rejects_empty_and_non_finite_models() {
        let mut ser = SerializedMlp::from(&sample_model());
        ser.layers[0].biases[1] = f32::NAN;
        assert!(matches!(Mlp::try_from(ser), Err(Error::InvalidData(_))));

        let mut ser = SerializedMlp::from(&sample_model());
        ser.layers.clear();
        assert!(matches!(Mlp::try_from(ser), Err(Error::InvalidData(_))));
    }

    #[test]
    fn rejects_broken_chain() {
        let mut ser = SerializedMlp::from(&sample_model());
        ser.layers[1].in_dim = 2;
        ser.layers[1].weights.truncate(2);
        let err = Mlp::try_from(ser).unwrap_err();
        assert!(format!("{err}").contains("in_dim"));
    }
}
