use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::{Activation, Error, Init, LayerStore, Result};

/// A stack of dense layers sharing one activation function.
#[derive(Debug, Clone, PartialEq)]
pub struct Mlp {
    store: LayerStore,
    activation: Activation,
    // Average squared error of the most recent training epoch.
    last_loss: Option<f32>,
}

/// Per-layer outputs of one forward pass (the activation cache).
///
/// Entry `i` holds the post-activation output of layer `i`; the last entry is the
/// network output. Reuse one instance across samples to avoid allocating.
#[derive(Debug, Clone)]
pub struct Activations {
    layer_outputs: Vec<Vec<f32>>,
}

/// Per-layer error signals (`dL/dz`) for one sample (overwrite semantics).
#[derive(Debug, Clone)]
pub struct Deltas {
    deltas: Vec<Vec<f32>>,
}

/// Reusable buffers for training a specific `Mlp`.
#[derive(Debug, Clone)]
pub struct Trainer {
    pub cache: Activations,
    pub deltas: Deltas,
}

impl Mlp {
    pub fn new(store: LayerStore, activation: Activation) -> Self {
        Self {
            store,
            activation,
            last_loss: None,
        }
    }

    /// Build with the activation's default weight init and zero biases, seeded.
    pub fn new_with_seed(
        widths: &[usize],
        learning_rate: f32,
        activation: Activation,
        seed: u64,
    ) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::new_with_rng(widths, learning_rate, activation, &mut rng)
    }

    pub fn new_with_rng<R: Rng + ?Sized>(
        widths: &[usize],
        learning_rate: f32,
        activation: Activation,
        rng: &mut R,
    ) -> Result<Self> {
        let store = LayerStore::new(
            widths,
            learning_rate,
            Init::for_activation(activation),
            Init::Zeros,
            rng,
        )?;
        Ok(Self::new(store, activation))
    }

    #[inline]
    pub fn input_dim(&self) -> usize {
        self.store.input_dim()
    }

    #[inline]
    pub fn output_dim(&self) -> usize {
        self.store.output_dim()
    }

    #[inline]
    pub fn num_layers(&self) -> usize {
        self.store.num_layers()
    }

    pub fn widths(&self) -> Vec<usize> {
        self.store.widths()
    }

    #[inline]
    pub fn activation(&self) -> Activation {
        self.activation
    }

    #[inline]
    pub fn learning_rate(&self) -> f32 {
        self.store.learning_rate()
    }

    #[inline]
    pub fn store(&self) -> &LayerStore {
        &self.store
    }

    #[inline]
    pub fn store_mut(&mut self) -> &mut LayerStore {
        &mut self.store
    }

    /// Average squared error of the last completed training epoch, if any.
    #[inline]
    pub fn last_loss(&self) -> Option<f32> {
        self.last_loss
    }

    pub(crate) fn set_last_loss(&mut self, loss: f32) {
        self.last_loss = Some(loss);
    }

    pub fn export_parameters(&self) -> Vec<f32> {
        self.store.export_parameters()
    }

    pub fn import_parameters(&mut self, params: &[f32]) -> Result<()> {
        self.store.import_parameters(params)
    }

    pub fn activations(&self) -> Activations {
        Activations::new(self)
    }

    pub fn deltas(&self) -> Deltas {
        Deltas::new(self)
    }

    /// Convenience constructor: allocate all training buffers.
    #[inline]
    pub fn trainer(&self) -> Trainer {
        Trainer::new(self)
    }

    pub(crate) fn check_input(&self, input: &[f32]) -> Result<()> {
        if input.len() != self.input_dim() {
            return Err(Error::ShapeMismatch(format!(
                "input len {} does not match model input_dim {}",
                input.len(),
                self.input_dim()
            )));
        }
        Ok(())
    }

    pub(crate) fn check_target(&self, target: &[f32]) -> Result<()> {
        if target.len() != self.output_dim() {
            return Err(Error::ShapeMismatch(format!(
                "target len {} does not match model output_dim {}",
                target.len(),
                self.output_dim()
            )));
        }
        Ok(())
    }

    /// Forward pass for a single sample, returning the full activation cache.
    pub fn forward(&self, input: &[f32]) -> Result<Activations> {
        let mut cache = self.activations();
        self.forward_into(input, &mut cache)?;
        Ok(cache)
    }

    /// Forward pass into a reusable cache; returns the final output slice.
    ///
    /// For each layer: `activation(W * previous + b)`.
    pub fn forward_into<'a>(
        &self,
        input: &[f32],
        cache: &'a mut Activations,
    ) -> Result<&'a [f32]> {
        self.check_input(input)?;
        if !cache.fits(self) {
            return Err(Error::ShapeMismatch(
                "activation cache was built for a different topology".to_owned(),
            ));
        }

        for (idx, layer) in self.store.layers().iter().enumerate() {
            if idx == 0 {
                layer.forward(input, &mut cache.layer_outputs[0], self.activation);
            } else {
                // Borrow the previous output immutably and the current output mutably.
                let (left, right) = cache.layer_outputs.split_at_mut(idx);
                layer.forward(&left[idx - 1], &mut right[0], self.activation);
            }
        }

        Ok(cache.output())
    }

    /// Final-layer output for `input`.
    pub fn predict(&self, input: &[f32]) -> Result<Vec<f32>> {
        let cache = self.forward(input)?;
        Ok(cache.output().to_vec())
    }

    /// Shape-safe, non-allocating inference.
    pub fn predict_into(
        &self,
        input: &[f32],
        cache: &mut Activations,
        out: &mut [f32],
    ) -> Result<()> {
        if out.len() != self.output_dim() {
            return Err(Error::ShapeMismatch(format!(
                "out len {} does not match model output_dim {}",
                out.len(),
                self.output_dim()
            )));
        }
        let y = self.forward_into(input, cache)?;
        out.copy_from_slice(y);
        Ok(())
    }

    /// Computes every layer's error signal from a cache filled by `forward_into`.
    ///
    /// - output layer: `delta = (y - target) * f'(y)`
    /// - hidden layer `i`: `delta_i = (W_{i+1}^T * delta_{i+1}) * f'(y_i)`
    ///
    /// Returns the sample's squared error `sum((y - target)^2)`.
    ///
    /// Low-level hot path: shapes are asserted, not returned as errors.
    pub fn backward(&self, cache: &Activations, target: &[f32], deltas: &mut Deltas) -> f32 {
        assert!(cache.fits(self), "activation cache does not match model");
        assert!(deltas.fits(self), "delta buffers do not match model");
        assert_eq!(
            target.len(),
            self.output_dim(),
            "target len {} does not match model output_dim {}",
            target.len(),
            self.output_dim()
        );

        let act = self.activation;
        let last = self.num_layers() - 1;

        let mut sq_err = 0.0_f32;
        let output = &cache.layer_outputs[last];
        for ((d, &y), &t) in deltas.deltas[last].iter_mut().zip(output).zip(target) {
            let diff = y - t;
            sq_err += diff * diff;
            *d = diff * act.grad_from_output(y);
        }

        let layers = self.store.layers();
        for idx in (0..last).rev() {
            let (left, right) = deltas.deltas.split_at_mut(idx + 1);
            let current = &mut left[idx];
            layers[idx + 1].backprop(&right[0], current);
            for (d, &y) in current.iter_mut().zip(&cache.layer_outputs[idx]) {
                *d *= act.grad_from_output(y);
            }
        }

        sq_err
    }

    /// Applies `W -= lr * delta * previous^T` and `b -= lr * delta` to every layer.
    ///
    /// `input` and `cache` must be the ones `deltas` were computed from.
    pub fn apply_deltas(&mut self, input: &[f32], cache: &Activations, deltas: &Deltas) {
        assert_eq!(
            input.len(),
            self.input_dim(),
            "input len {} does not match model input_dim {}",
            input.len(),
            self.input_dim()
        );
        assert!(cache.fits(self), "activation cache does not match model");
        assert!(deltas.fits(self), "delta buffers do not match model");

        let lr = self.store.learning_rate();
        for (idx, layer) in self.store.layers_mut().iter_mut().enumerate() {
            let layer_input: &[f32] = if idx == 0 {
                input
            } else {
                &cache.layer_outputs[idx - 1]
            };
            layer.sgd_step(layer_input, &deltas.deltas[idx], lr);
        }
    }

    /// One online SGD step (forward, backward, update). Returns the squared error.
    pub fn train_step(
        &mut self,
        input: &[f32],
        target: &[f32],
        trainer: &mut Trainer,
    ) -> Result<f32> {
        self.check_target(target)?;
        self.forward_into(input, &mut trainer.cache)?;
        let sq_err = self.backward(&trainer.cache, target, &mut trainer.deltas);
        self.apply_deltas(input, &trainer.cache, &trainer.deltas);
        Ok(sq_err)
    }
}

impl Trainer {
    pub fn new(mlp: &Mlp) -> Self {
        Self {
            cache: Activations::new(mlp),
            deltas: Deltas::new(mlp),
        }
    }
}

impl Activations {
    pub fn new(mlp: &Mlp) -> Self {
        let layer_outputs = mlp
            .store
            .layers()
            .iter()
            .map(|layer| vec![0.0; layer.out_dim()])
            .collect();
        Self { layer_outputs }
    }

    fn fits(&self, mlp: &Mlp) -> bool {
        self.layer_outputs.len() == mlp.num_layers()
            && self
                .layer_outputs
                .iter()
                .zip(mlp.store.layers())
                .all(|(out, layer)| out.len() == layer.out_dim())
    }

    /// Number of cached layer outputs.
    #[inline]
    pub fn len(&self) -> usize {
        self.layer_outputs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.layer_outputs.is_empty()
    }

    /// Output of layer `idx`.
    #[inline]
    pub fn layer(&self, idx: usize) -> &[f32] {
        &self.layer_outputs[idx]
    }

    #[inline]
    pub fn output(&self) -> &[f32] {
        // Never empty: a network has at least one layer.
        &self.layer_outputs[self.layer_outputs.len() - 1]
    }
}

impl Deltas {
    pub fn new(mlp: &Mlp) -> Self {
        let deltas = mlp
            .store
            .layers()
            .iter()
            .map(|layer| vec![0.0; layer.out_dim()])
            .collect();
        Self { deltas }
    }

    fn fits(&self, mlp: &Mlp) -> bool {
        self.deltas.len() == mlp.num_layers()
            && self
                .deltas
                .iter()
                .zip(mlp.store.layers())
                .all(|(d, layer)| d.len() == layer.out_dim())
    }

    #[inline]
    pub fn layer(&self, idx: usize) -> &[f32] {
        &self.deltas[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn half_sq_err(mlp: &Mlp, input: &[f32], target: &[f32]) -> f32 {
        let y = mlp.predict(input).unwrap();
        0.5 * y
            .iter()
            .zip(target)
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f32>()
    }

    fn assert_close(analytic: f32, numeric: f32, abs_tol: f32, rel_tol: f32) {
        let diff = (analytic - numeric).abs();
        let scale = analytic.abs().max(numeric.abs()).max(1.0);
        assert!(
            diff <= abs_tol || diff / scale <= rel_tol,
            "analytic={analytic} numeric={numeric} diff={diff}"
        );
    }

    #[test]
    fn seeded_init_is_deterministic() {
        let a = Mlp::new_with_seed(&[2, 3, 1], 0.1, Activation::Sigmoid, 123).unwrap();
        let b = Mlp::new_with_seed(&[2, 3, 1], 0.1, Activation::Sigmoid, 123).unwrap();
        let input = [0.3_f32, -0.7_f32];
        assert_eq!(a.predict(&input).unwrap(), b.predict(&input).unwrap());
    }

    #[test]
    fn cache_has_one_entry_per_layer() {
        let mlp = Mlp::new_with_seed(&[4, 6, 5, 3], 0.1, Activation::ReLU, 0).unwrap();
        let cache = mlp.forward(&[0.1, 0.2, 0.3, 0.4]).unwrap();
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.layer(0).len(), 6);
        assert_eq!(cache.layer(1).len(), 5);
        assert_eq!(cache.output().len(), 3);
    }

    #[test]
    fn deltas_match_numeric_gradients() {
        for act in [Activation::Sigmoid, Activation::ReLU] {
            let mut mlp = Mlp::new_with_seed(&[2, 3, 2], 0.1, act, 7).unwrap();
            let input = [0.3_f32, -0.7_f32];
            let target = [0.2_f32, 0.9_f32];

            let cache = mlp.forward(&input).unwrap();
            let mut deltas = mlp.deltas();
            mlp.backward(&cache, &target, &mut deltas);

            let eps = 1e-3_f32;
            for layer_idx in 0..mlp.num_layers() {
                let (in_dim, out_dim) = {
                    let l = &mlp.store.layers()[layer_idx];
                    (l.in_dim(), l.out_dim())
                };
                let layer_input: Vec<f32> = if layer_idx == 0 {
                    input.to_vec()
                } else {
                    cache.layer(layer_idx - 1).to_vec()
                };

                for j in 0..out_dim {
                    for k in 0..in_dim {
                        let p = j * in_dim + k;
                        let orig = mlp.store.layers_mut()[layer_idx].weights_mut()[p];
                        mlp.store.layers_mut()[layer_idx].weights_mut()[p] = orig + eps;
                        let plus = half_sq_err(&mlp, &input, &target);
                        mlp.store.layers_mut()[layer_idx].weights_mut()[p] = orig - eps;
                        let minus = half_sq_err(&mlp, &input, &target);
                        mlp.store.layers_mut()[layer_idx].weights_mut()[p] = orig;

                        let numeric = (plus - minus) / (2.0 * eps);
                        let analytic = deltas.layer(layer_idx)[j] * layer_input[k];
                        assert_close(analytic, numeric, 1e-3, 1e-2);
                    }

                    let orig = mlp.store.layers_mut()[layer_idx].biases_mut()[j];
                    mlp.store.layers_mut()[layer_idx].biases_mut()[j] = orig + eps;
                    let plus = half_sq_err(&mlp, &input, &target);
                    mlp.store.layers_mut()[layer_idx].biases_mut()[j] = orig - eps;
                    let minus = half_sq_err(&mlp, &input, &target);
                    mlp.store.layers_mut()[layer_idx].biases_mut()[j] = orig;

                    let numeric = (plus - minus) / (2.0 * eps);
                    assert_close(deltas.layer(layer_idx)[j], numeric, 1e-3, 1e-2);
                }
            }
        }
    }

    #[test]
    fn train_step_moves_output_towards_target() {
        let mut mlp = Mlp::new_with_seed(&[2, 4, 1], 0.5, Activation::Sigmoid, 1).unwrap();
        let mut trainer = mlp.trainer();
        let input = [1.0_f32, 0.0];
        let target = [1.0_f32];

        let first = mlp.train_step(&input, &target, &mut trainer).unwrap();
        let mut last = first;
        for _ in 0..20 {
            last = mlp.train_step(&input, &target, &mut trainer).unwrap();
        }
        assert!(last < first, "first={first} last={last}");
    }

    #[test]
    fn wrong_input_len_is_shape_mismatch() {
        let mlp = Mlp::new_with_seed(&[2, 3, 1], 0.1, Activation::Sigmoid, 0).unwrap();
        assert!(matches!(mlp.predict(&[0.0; 3]), Err(Error::ShapeMismatch(_))));

        let other = Mlp::new_with_seed(&[2, 4, 1], 0.1, Activation::Sigmoid, 0).unwrap();
        let mut cache = other.activations();
        assert!(matches!(
            mlp.forward_into(&[0.0; 2], &mut cache),
            Err(Error::ShapeMismatch(_))
        ));

        let mut out = [0.0_f32; 2];
        let mut cache = mlp.activations();
        assert!(matches!(
            mlp.predict_into(&[0.0; 2], &mut cache, &mut out),
            Err(Error::ShapeMismatch(_))
        ));
    }

    #[test]
    #[should_panic]
    fn backward_panics_on_target_mismatch() {
        let mlp = Mlp::new_with_seed(&[2, 3, 1], 0.1, Activation::Sigmoid, 0).unwrap();
        let cache = mlp.forward(&[0.0; 2]).unwrap();
        let mut deltas = mlp.deltas();
        mlp.backward(&cache, &[0.0; 2], &mut deltas);
    }
}
