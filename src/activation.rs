//! Activation functions.
//!
//! Layers apply their activation to a whole pre-activation row in place, so the
//! row buffer ends up holding post-activation outputs `y`. Derivatives are taken
//! from `y`, which means no pre-activation buffer is kept.
//!
//! The optional output softmax lives here as well, with its vector-jacobian product.

use crate::layer::Init;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
/// Element-wise activation function.
pub enum Activation {
    Tanh,
    ReLU,
    /// `x` for `x > 0`, else `alpha * x`.
    LeakyReLU { alpha: f32 },
    Sigmoid,
    Identity,
}

impl Activation {
    pub fn validate(self) -> Result<()> {
        match self {
            Activation::LeakyReLU { alpha } if !(alpha.is_finite() && alpha >= 0.0) => {
                Err(Error::InvalidConfig(format!(
                    "leaky relu alpha must be finite and >= 0, got {alpha}"
                )))
            }
            _ => Ok(()),
        }
    }

    /// Initializer matched to the non-linearity: He for the ReLU family, Xavier otherwise.
    #[inline]
    pub fn default_init(self) -> Init {
        if matches!(self, Activation::ReLU | Activation::LeakyReLU { .. }) {
            Init::He
        } else {
            Init::Xavier
        }
    }

    /// Replace every pre-activation `z` in `row` by `activation(z)`.
    #[inline]
    pub(crate) fn apply(self, row: &mut [f32]) {
        match self {
            Activation::Identity => {}
            Activation::Tanh => row.iter_mut().for_each(|z| *z = z.tanh()),
            Activation::ReLU => row.iter_mut().for_each(|z| *z = z.max(0.0)),
            Activation::LeakyReLU { alpha } => row.iter_mut().for_each(|z| {
                if *z <= 0.0 {
                    *z *= alpha;
                }
            }),
            Activation::Sigmoid => row.iter_mut().for_each(|z| *z = sigmoid(*z)),
        }
    }

    /// `d activation / dz`, written in terms of the output `y = activation(z)`.
    #[inline]
    pub(crate) fn slope_at_output(self, y: f32) -> f32 {
        match self {
            Activation::Identity => 1.0,
            Activation::Tanh => 1.0 - y * y,
            Activation::Sigmoid => y * (1.0 - y),
            Activation::ReLU if y > 0.0 => 1.0,
            Activation::ReLU => 0.0,
            Activation::LeakyReLU { .. } if y > 0.0 => 1.0,
            Activation::LeakyReLU { alpha } => alpha,
        }
    }
}

// Split on the sign so `exp` never overflows.
#[inline]
fn sigmoid(z: f32) -> f32 {
    if z < 0.0 {
        let e = z.exp();
        e / (1.0 + e)
    } else {
        1.0 / (1.0 + (-z).exp())
    }
}

/// Softmax over one row of logits, in place.
pub(crate) fn softmax_in_place(row: &mut [f32]) {
    let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if max == f32::NEG_INFINITY {
        return;
    }
    let mut total = 0.0_f32;
    for v in row.iter_mut() {
        *v = (*v - max).exp();
        total += *v;
    }
    row.iter_mut().for_each(|v| *v /= total);
}

/// Pull `dL/dy` back through a softmax with outputs `probs`:
/// `dL/dz_k = y_k * (dL/dy_k - sum_j dL/dy_j * y_j)`.
pub(crate) fn softmax_backward(probs: &[f32], d_probs: &[f32], d_logits: &mut [f32]) {
    let dot: f32 = probs.iter().zip(d_probs).map(|(y, d)| y * d).sum();
    for ((dz, &y), &d) in d_logits.iter_mut().zip(probs).zip(d_probs) {
        *dz = y * (d - dot);
    }
}
