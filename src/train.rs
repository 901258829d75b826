use tracing::{debug, info, warn};

use crate::{Error, Mlp, Result, Sample};

#[derive(Debug, Clone, Copy)]
pub struct TrainConfig {
    pub epochs: usize,
    /// Emit an `info` event every `log_every` epochs (`0` disables them).
    pub log_every: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 1,
            log_every: 100,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainReport {
    /// Average squared error of every epoch, in order.
    pub epoch_losses: Vec<f32>,
    pub final_loss: f32,
}

impl Mlp {
    /// Train with plain online SGD for `epochs` passes over `batch`.
    ///
    /// See [`Mlp::train_with`].
    pub fn train(&mut self, batch: &[Sample], epochs: usize) -> Result<TrainReport> {
        self.train_with(
            batch,
            TrainConfig {
                epochs,
                ..TrainConfig::default()
            },
        )
    }

    /// Train with plain online SGD.
    ///
    /// Samples are visited in the given order every epoch (no shuffling) and parameters
    /// are updated after each sample. The reported loss of an epoch is the squared error
    /// summed over outputs, averaged over the batch.
    ///
    /// Every sample is shape-checked before the first update, so an error leaves the
    /// parameters untouched.
    pub fn train_with(&mut self, batch: &[Sample], cfg: TrainConfig) -> Result<TrainReport> {
        if batch.is_empty() {
            return Err(Error::InvalidConfig("batch must not be empty".to_owned()));
        }
        if cfg.epochs == 0 {
            return Err(Error::InvalidConfig("epochs must be > 0".to_owned()));
        }
        for (idx, sample) in batch.iter().enumerate() {
            self.check_sample(idx, sample)?;
        }

        info!(
            samples = batch.len(),
            epochs = cfg.epochs,
            widths = ?self.widths(),
            lr = self.learning_rate(),
            "training started"
        );

        let mut trainer = self.trainer();
        let mut epoch_losses = Vec::with_capacity(cfg.epochs);

        for epoch in 0..cfg.epochs {
            let mut total = 0.0_f32;
            for sample in batch {
                total += self.train_step(&sample.input, &sample.target, &mut trainer)?;
            }
            let avg = total / batch.len() as f32;
            epoch_losses.push(avg);
            self.set_last_loss(avg);

            debug!(epoch, loss = avg, "epoch finished");
            if cfg.log_every > 0 && (epoch + 1) % cfg.log_every == 0 {
                info!(epoch = epoch + 1, loss = avg, "training progress");
            }
            if !avg.is_finite() {
                warn!(epoch, "training loss is not finite");
            }
        }

        let final_loss = epoch_losses[epoch_losses.len() - 1];
        info!(final_loss, "training finished");

        Ok(TrainReport {
            epoch_losses,
            final_loss,
        })
    }

    /// Average squared error over `batch` without touching parameters.
    pub fn evaluate(&self, batch: &[Sample]) -> Result<f32> {
        if batch.is_empty() {
            return Err(Error::InvalidConfig("batch must not be empty".to_owned()));
        }

        let mut cache = self.activations();
        let mut total = 0.0_f32;
        for (idx, sample) in batch.iter().enumerate() {
            self.check_sample(idx, sample)?;
            let y = self.forward_into(&sample.input, &mut cache)?;
            total += y
                .iter()
                .zip(&sample.target)
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f32>();
        }
        Ok(total / batch.len() as f32)
    }

    fn check_sample(&self, idx: usize, sample: &Sample) -> Result<()> {
        self.check_input(&sample.input)
            .and_then(|()| self.check_target(&sample.target))
            .map_err(|e| match e {
                Error::ShapeMismatch(msg) => Error::ShapeMismatch(format!("sample {idx}: {msg}")),
                other => other,
            })
    }
}
