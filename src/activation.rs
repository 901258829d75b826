//! Activation functions.
//!
//! A dense layer computes a pre-activation value `z = W x + b` and then applies an
//! activation function element-wise: `y = activation(z)`.
//!
//! A network uses a single activation for every layer. The activation cache keeps
//! the *post-activation* outputs `y`, so backprop computes `dy/dz` from `y` directly
//! with the analytic derivative; no separate `z` buffer is needed.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Element-wise activation function.
pub enum Activation {
    /// Logistic sigmoid `1 / (1 + e^-x)`.
    #[default]
    Sigmoid,
    /// Rectified linear `max(0, x)`.
    #[cfg_attr(feature = "serde", serde(rename = "relu"))]
    ReLU,
}

impl Activation {
    #[inline]
    pub fn forward(self, x: f32) -> f32 {
        match self {
            Activation::Sigmoid => sigmoid(x),
            Activation::ReLU => x.max(0.0),
        }
    }

    /// Derivative of the activation with respect to its input, expressed in terms
    /// of the cached post-activation output `y`.
    #[inline]
    pub fn grad_from_output(self, y: f32) -> f32 {
        match self {
            Activation::Sigmoid => y * (1.0 - y),
            Activation::ReLU => {
                if y > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Stable numeric tag used by the framed binary format.
    pub(crate) fn tag(self) -> u32 {
        match self {
            Activation::Sigmoid => 0,
            Activation::ReLU => 1,
        }
    }

    pub(crate) fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(Activation::Sigmoid),
            1 => Some(Activation::ReLU),
            _ => None,
        }
    }
}

#[inline]
fn sigmoid(x: f32) -> f32 {
    // Numerically stable sigmoid.
    if x >= 0.0 {
        let z = (-x).exp();
        1.0 / (1.0 + z)
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigmoid_basic_values() {
        let y0 = Activation::Sigmoid.forward(0.0);
        assert!((y0 - 0.5).abs() < 1e-6);

        let y_pos = Activation::Sigmoid.forward(10.0);
        let y_neg = Activation::Sigmoid.forward(-10.0);
        assert!(y_pos > 0.999);
        assert!(y_neg < 0.001);

        // No overflow at the extremes.
        assert!(Activation::Sigmoid.forward(-200.0).is_finite());
        assert!(Activation::Sigmoid.forward(200.0) <= 1.0);
    }

    #[test]
    fn relu_shape_and_gradient() {
        assert_eq!(Activation::ReLU.forward(-2.0), 0.0);
        assert_eq!(Activation::ReLU.forward(3.0), 3.0);

        assert_eq!(Activation::ReLU.grad_from_output(0.0), 0.0);
        assert_eq!(Activation::ReLU.grad_from_output(1.5), 1.0);
    }

    #[test]
    fn sigmoid_gradient_matches_finite_difference() {
        for &x in &[-3.0_f32, -0.5, 0.0, 0.7, 2.5] {
            let eps = 1e-3_f32;
            let numeric = (Activation::Sigmoid.forward(x + eps)
                - Activation::Sigmoid.forward(x - eps))
                / (2.0 * eps);
            let y = Activation::Sigmoid.forward(x);
            let analytic = Activation::Sigmoid.grad_from_output(y);
            assert!(
                (numeric - analytic).abs() < 1e-3,
                "x={x} numeric={numeric} analytic={analytic}"
            );
        }

        let g = Activation::Sigmoid.grad_from_output(Activation::Sigmoid.forward(0.0));
        assert!((g - 0.25).abs() < 1e-6);
    }

    #[test]
    fn tags_roundtrip() {
        for act in [Activation::Sigmoid, Activation::ReLU] {
            assert_eq!(Activation::from_tag(act.tag()), Some(act));
        }
        assert_eq!(Activation::from_tag(7), None);
    }
}
