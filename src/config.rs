//! Network configuration.
//!
//! `NetworkConfig` collects everything needed to construct an [`Mlp`]: topology,
//! learning rate, activation and initializers, plus an optional seed. With the `serde`
//! feature it can be read from a JSON file; absent fields take their defaults.
//!
//! # Example
//!
//! ```json
//! {
//!   "widths": [4, 64, 32, 3],
//!   "learning_rate": 0.01,
//!   "activation": "sigmoid",
//!   "weight_init": { "kind": "uniform", "limit": 0.5 },
//!   "seed": 42
//! }
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Activation, Init, LayerStore, Mlp, Result};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkConfig {
    /// Layer widths, input first. At least two entries.
    pub widths: Vec<usize>,
    pub learning_rate: f32,
    pub activation: Activation,
    /// Weight initializer; `None` picks one from the activation.
    pub weight_init: Option<Init>,
    pub bias_init: Init,
    /// Seed for initialization; `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            widths: vec![4, 64, 32, 3],
            learning_rate: 0.01,
            activation: Activation::Sigmoid,
            weight_init: None,
            bias_init: Init::Zeros,
            seed: None,
        }
    }
}

impl NetworkConfig {
    pub fn weight_init(&self) -> Init {
        self.weight_init
            .unwrap_or_else(|| Init::for_activation(self.activation))
    }

    /// Build using `seed`, or OS entropy when no seed is set.
    pub fn build(&self) -> Result<Mlp> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.build_with_rng(&mut rng)
    }

    /// Build using the provided RNG; `seed` is ignored.
    pub fn build_with_rng<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Mlp> {
        let store = LayerStore::new(
            &self.widths,
            self.learning_rate,
            self.weight_init(),
            self.bias_init,
            rng,
        )?;
        Ok(Mlp::new(store, self.activation))
    }

    /// All-zero parameters with this topology, ready to receive a snapshot.
    pub fn build_zeroed(&self) -> Result<Mlp> {
        let store = LayerStore::zeros(&self.widths, self.learning_rate)?;
        Ok(Mlp::new(store, self.activation))
    }
}

/// Load a `NetworkConfig` from a JSON file.
#[cfg(feature = "serde")]
pub fn load_config<P: AsRef<std::path::Path>>(path: P) -> Result<NetworkConfig> {
    use crate::Error;

    let p = path.as_ref();
    let s = std::fs::read_to_string(p)
        .map_err(|e| Error::persistence(format!("failed to read {}", p.display()), e))?;
    serde_json::from_str(&s)
        .map_err(|e| Error::InvalidConfig(format!("failed to parse {}: {e}", p.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn default_builds() {
        let cfg = NetworkConfig {
            seed: Some(0),
            ..NetworkConfig::default()
        };
        let mlp = cfg.build().unwrap();
        assert_eq!(mlp.widths(), vec![4, 64, 32, 3]);
        assert_eq!(mlp.activation(), Activation::Sigmoid);
        assert_eq!(cfg.weight_init(), Init::Xavier);
    }

    #[test]
    fn same_seed_same_parameters() {
        let cfg = NetworkConfig {
            widths: vec![3, 5, 2],
            seed: Some(11),
            ..NetworkConfig::default()
        };
        assert_eq!(
            cfg.build().unwrap().export_parameters(),
            cfg.build().unwrap().export_parameters()
        );
    }

    #[test]
    fn bad_topology_is_reported() {
        let cfg = NetworkConfig {
            widths: vec![3],
            ..NetworkConfig::default()
        };
        assert!(matches!(cfg.build(), Err(Error::InvalidTopology(_))));
        assert!(matches!(cfg.build_zeroed(), Err(Error::InvalidTopology(_))));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn parses_partial_json() {
        let cfg: NetworkConfig = serde_json::from_str(
            r#"{
                "widths": [2, 2, 1],
                "learning_rate": 0.5,
                "activation": "relu",
                "weight_init": { "kind": "uniform", "limit": 0.5 }
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.widths, vec![2, 2, 1]);
        assert_eq!(cfg.activation, Activation::ReLU);
        assert_eq!(cfg.weight_init(), Init::Uniform { limit: 0.5 });
        assert_eq!(cfg.bias_init, Init::Zeros);
        assert_eq!(cfg.seed, None);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn load_config_reports_missing_file() {
        let err = load_config("/no/such/config.json").unwrap_err();
        assert!(matches!(err, Error::Persistence { .. }));
    }
}
