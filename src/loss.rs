//! Loss functions.
//!
//! A loss scores one predicted output row against one encoded target row and writes
//! the gradient w.r.t. the prediction. Losses are summed over output components; the
//! objective averages them over samples.
//!
//! Built-in losses are the [`Loss`] enum. Anything implementing [`LossFunction`] can
//! be plugged into a model instead.

use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Probabilities are clamped to this floor before taking logs.
pub const CROSS_ENTROPY_EPS: f32 = 1e-10;

/// A pure, stateless per-sample loss.
pub trait LossFunction {
    /// Identifier written into persisted models.
    fn name(&self) -> &str;

    /// Compute the loss of `pred` against `target` and write `dL/d(pred)` into `d_pred`.
    ///
    /// Shape contract: `pred.len() == target.len() == d_pred.len()`.
    fn evaluate(&self, pred: &[f32], target: &[f32], d_pred: &mut [f32]) -> f32;

    /// `false` for losses that carry only a name and cannot be evaluated.
    fn is_evaluable(&self) -> bool {
        true
    }
}

/// A loss known only by its persisted name.
///
/// Models saved with a custom [`LossFunction`] load with this in its place. Predicting
/// and scoring work as usual; fitting fails until a real loss is set with `with_loss`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedLoss {
    name: String,
}

impl NamedLoss {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl LossFunction for NamedLoss {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, _pred: &[f32], _target: &[f32], d_pred: &mut [f32]) -> f32 {
        d_pred.fill(f32::NAN);
        f32::NAN
    }

    fn is_evaluable(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Built-in loss functions.
pub enum Loss {
    /// `sum |pred - target|`.
    AbsoluteError,
    /// `sum (pred - target)^2`.
    #[default]
    SquaredError,
    /// `-sum target * ln(pred)`.
    ///
    /// Expects `pred` to be a probability distribution, e.g. a network with a
    /// softmax output.
    CrossEntropy,
}

impl Loss {
    pub const fn as_str(self) -> &'static str {
        match self {
            Loss::AbsoluteError => "absolute_error",
            Loss::SquaredError => "squared_error",
            Loss::CrossEntropy => "cross_entropy",
        }
    }

}

impl LossFunction for Loss {
    fn name(&self) -> &str {
        self.as_str()
    }

    #[inline]
    fn evaluate(&self, pred: &[f32], target: &[f32], d_pred: &mut [f32]) -> f32 {
        match self {
            Loss::AbsoluteError => absolute_error(pred, target, d_pred),
            Loss::SquaredError => squared_error(pred, target, d_pred),
            Loss::CrossEntropy => cross_entropy(pred, target, d_pred),
        }
    }
}

impl fmt::Display for Loss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Loss {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "absolute_error" => Ok(Loss::AbsoluteError),
            "squared_error" => Ok(Loss::SquaredError),
            "cross_entropy" => Ok(Loss::CrossEntropy),
            other => Err(Error::InvalidConfig(format!(
                "unknown loss {other:?}; \
                 expected one of absolute_error, squared_error, cross_entropy"
            ))),
        }
    }
}

#[inline]
fn check_lens(pred: &[f32], target: &[f32], d_pred: &[f32]) {
    assert!(
        pred.len() == target.len() && pred.len() == d_pred.len(),
        "pred/target/d_pred lens differ: {} / {} / {}",
        pred.len(),
        target.len(),
        d_pred.len()
    );
}

/// Sum of absolute errors; `d_pred` gets the sign subgradient (0 where `pred == target`).
#[inline]
pub fn absolute_error(pred: &[f32], target: &[f32], d_pred: &mut [f32]) -> f32 {
    check_lens(pred, target, d_pred);
    let mut sum = 0.0_f32;
    for ((d, &p), &t) in d_pred.iter_mut().zip(pred).zip(target) {
        let diff = p - t;
        sum += diff.abs();
        *d = if diff == 0.0 { 0.0 } else { diff.signum() };
    }
    sum
}

/// Sum of squared errors; `d_pred` gets `2 * (pred - target)`.
#[inline]
pub fn squared_error(pred: &[f32], target: &[f32], d_pred: &mut [f32]) -> f32 {
    check_lens(pred, target, d_pred);
    let mut sum = 0.0_f32;
    for ((d, &p), &t) in d_pred.iter_mut().zip(pred).zip(target) {
        let diff = p - t;
        sum = diff.mul_add(diff, sum);
        *d = 2.0 * diff;
    }
    sum
}

/// Cross-entropy of predicted probabilities against a target distribution.
///
/// Probabilities are clamped to [`CROSS_ENTROPY_EPS`]; `d_pred` gets `-target / p`.
#[inline]
pub fn cross_entropy(probs: &[f32], target: &[f32], d_probs: &mut [f32]) -> f32 {
    check_lens(probs, target, d_probs);
    let mut sum = 0.0_f32;
    for ((d, &p), &t) in d_probs.iter_mut().zip(probs).zip(target) {
        let p = p.max(CROSS_ENTROPY_EPS);
        if t != 0.0 {
            sum -= t * p.ln();
        }
        *d = -t / p;
    }
    sum
}
