//! A small dense feed-forward network for reconstructing image pixels.
//!
//! `pixel-mlp` is a from-scratch multilayer perceptron: a stack of fully connected layers
//! with a single activation (sigmoid or ReLU), trained by plain online SGD on squared error.
//! Pixels go in as short fixed-width vectors and come back out as corrected values.
//!
//! # Layout
//!
//! - [`LayerStore`] owns weights, biases and the learning rate, and exposes the flat
//!   parameter view used by persistence.
//! - [`Mlp`] is the engine: forward pass, backprop, parameter updates, train/predict.
//! - [`persist`] reads and writes snapshots: a legacy headerless `f32` stream and a
//!   framed format that records the topology.
//! - [`pixels`] turns rasters into samples and writes predictions back.
//!
//! # Panics vs `Result`
//!
//! - Low-level hot path (panics on misuse): [`Mlp::backward`], [`Mlp::apply_deltas`].
//!   Shape mismatches there are programmer error and trip `assert!`.
//! - Everything else validates shapes and returns [`Result`], raising errors before any
//!   parameter is modified.
//!
//! # Data layout
//!
//! - Scalars are `f32`.
//! - Layer weights are row-major with shape `(out_dim, in_dim)`.
//! - Randomness is always injected (a seed or an `Rng`); there is no global generator.
//!
//! # Quick start
//!
//! ```rust
//! use pixel_mlp::{Activation, Mlp, Sample};
//!
//! # fn main() -> pixel_mlp::Result<()> {
//! let batch = vec![
//!     Sample::new([0.0, 0.0], [0.0]),
//!     Sample::new([0.0, 1.0], [1.0]),
//!     Sample::new([1.0, 0.0], [1.0]),
//!     Sample::new([1.0, 1.0], [0.0]),
//! ];
//!
//! let mut mlp = Mlp::new_with_seed(&[2, 4, 1], 0.5, Activation::Sigmoid, 0)?;
//! let report = mlp.train(&batch, 100)?;
//! assert_eq!(report.epoch_losses.len(), 100);
//!
//! let y = mlp.predict(&[1.0, 0.0])?;
//! assert_eq!(y.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! # Custom training loops
//!
//! Allocate buffers once and reuse them across steps:
//!
//! ```rust
//! use pixel_mlp::{Activation, Mlp};
//!
//! # fn main() -> pixel_mlp::Result<()> {
//! let mut mlp = Mlp::new_with_seed(&[3, 8, 2], 1e-2, Activation::ReLU, 0)?;
//! let mut trainer = mlp.trainer();
//! let x = [0.1_f32, -0.2, 0.3];
//! let t = [0.0_f32, 1.0];
//!
//! mlp.forward_into(&x, &mut trainer.cache)?;
//! let _sq_err = mlp.backward(&trainer.cache, &t, &mut trainer.deltas);
//! mlp.apply_deltas(&x, &trainer.cache, &trainer.deltas);
//! # Ok(())
//! # }
//! ```

pub mod activation;
pub mod blend;
pub mod config;
pub mod data;
pub mod error;
pub mod layer;
pub mod mlp;
pub mod persist;
pub mod pixels;
pub mod store;
pub mod train;

#[cfg(feature = "serde")]
pub mod serde_model;

pub use activation::Activation;
pub use blend::Blend;
pub use config::NetworkConfig;
pub use data::{Sample, samples_from_rows};
pub use error::{Error, Result};
pub use layer::{Init, Layer};
pub use mlp::{Activations, Deltas, Mlp, Trainer};
pub use persist::Format;
pub use pixels::{CorruptionMask, Raster};
pub use store::LayerStore;
pub use train::{TrainConfig, TrainReport};
