//! Blended prediction.
//!
//! An inference-only smoothing stage: the network output is interpolated with the raw
//! input, trusting the input more when the last training loss was high.
//!
//! `output[j] = (1 - factor) * prediction[j] + factor * input[j]`, for `j < output_dim`.
//!
//! Only the first `output_dim` input components take part, so the input must be at least
//! as wide as the output. Stored parameters are never touched.

use crate::{Error, Mlp, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blend {
    factor: f32,
}

impl Blend {
    /// Blend with an explicit factor, clamped to `[0, 1]`.
    pub fn new(factor: f32) -> Self {
        let factor = if factor.is_finite() {
            factor.clamp(0.0, 1.0)
        } else {
            1.0
        };
        Self { factor }
    }

    /// Factor taken from an average training loss.
    pub fn from_loss(loss: f32) -> Self {
        Self::new(loss)
    }

    #[inline]
    pub fn factor(self) -> f32 {
        self.factor
    }

    /// Interpolate `prediction` with the leading components of `input` into `out`.
    pub fn apply(self, input: &[f32], prediction: &[f32], out: &mut [f32]) -> Result<()> {
        if input.len() < prediction.len() || out.len() != prediction.len() {
            return Err(Error::ShapeMismatch(format!(
                "cannot blend input len {} with prediction len {} into out len {}",
                input.len(),
                prediction.len(),
                out.len()
            )));
        }
        let keep = 1.0 - self.factor;
        for ((o, &p), &x) in out.iter_mut().zip(prediction).zip(input) {
            *o = keep * p + self.factor * x;
        }
        Ok(())
    }
}

impl Mlp {
    /// Blend derived from the last observed training loss; `None` before any training.
    pub fn blend(&self) -> Option<Blend> {
        self.last_loss().map(Blend::from_loss)
    }

    /// `predict` followed by the blend stage.
    pub fn predict_blended(&self, input: &[f32], blend: Blend) -> Result<Vec<f32>> {
        if input.len() < self.output_dim() {
            return Err(Error::ShapeMismatch(format!(
                "blending needs input_dim >= output_dim, got {} < {}",
                input.len(),
                self.output_dim()
            )));
        }
        let prediction = self.predict(input)?;
        let mut out = vec![0.0; prediction.len()];
        blend.apply(input, &prediction, &mut out)?;
        Ok(out)
    }
}
