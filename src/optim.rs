//! Optimizers.
//!
//! An [`Optimizer`] minimizes an [`Objective`] from a starting point. The training
//! driver only wires the objective in; the search itself lives here.
//!
//! - [`LocalSearch`]: deterministic gradient-free compass search (the default).
//! - [`GradientDescent`]: full-batch gradient steps with an [`UpdateRule`]
//!   (plain SGD, momentum, or Adam).

use crate::{Error, Objective, Result};

/// Outcome of a successful minimization.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerResult {
    pub params: Vec<f32>,
    pub value: f32,
    /// Objective evaluations performed.
    pub evaluations: usize,
    /// Optimizer iterations (sweeps or steps).
    pub iterations: usize,
}

pub trait Optimizer {
    fn minimize(
        &self,
        objective: &mut dyn Objective,
        initial_point: &[f32],
    ) -> Result<OptimizerResult>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// Compass search.
///
/// Each sweep probes `x ± step * e_i` for every coordinate `i` in order and keeps
/// the first improving probe per coordinate. A sweep without improvement multiplies
/// `step` by `step_decay`. Stops after `maxiter` sweeps or once `step < min_step`.
pub struct LocalSearch {
    pub maxiter: usize,
    pub initial_step: f32,
    pub step_decay: f32,
    pub min_step: f32,
}

impl Default for LocalSearch {
    fn default() -> Self {
        Self {
            maxiter: 100,
            initial_step: 0.5,
            step_decay: 0.5,
            min_step: 1e-4,
        }
    }
}

impl LocalSearch {
    pub fn with_maxiter(maxiter: usize) -> Self {
        Self {
            maxiter,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_maxiter(self.maxiter)?;
        check_hyperparam("initial_step", self.initial_step, "> 0", |v| v > 0.0)?;
        check_hyperparam("step_decay", self.step_decay, "in (0,1)", |v| v > 0.0 && v < 1.0)?;
        check_hyperparam("min_step", self.min_step, ">= 0", |v| v >= 0.0)
    }
}

fn check_maxiter(maxiter: usize) -> Result<()> {
    if maxiter == 0 {
        return Err(Error::InvalidConfig("maxiter must be > 0".to_owned()));
    }
    Ok(())
}

/// `InvalidConfig` unless `value` is finite and passes `in_range`.
fn check_hyperparam(
    name: &str,
    value: f32,
    range: &str,
    in_range: impl FnOnce(f32) -> bool,
) -> Result<()> {
    if value.is_finite() && in_range(value) {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!(
            "{name} must be finite and {range}, got {value}"
        )))
    }
}

impl Optimizer for LocalSearch {
    fn minimize(
        &self,
        objective: &mut dyn Objective,
        initial_point: &[f32],
    ) -> Result<OptimizerResult> {
        self.validate()?;

        let mut x = initial_point.to_vec();
        let mut fx = objective.value(&x)?;
        let mut evaluations = 1;
        let mut step = self.initial_step;
        let mut iterations = 0;

        while iterations < self.maxiter && step >= self.min_step {
            iterations += 1;
            let mut improved = false;

            for i in 0..x.len() {
                let orig = x[i];
                for dir in [1.0_f32, -1.0] {
                    x[i] = orig + dir * step;
                    let f = objective.value(&x)?;
                    evaluations += 1;
                    if f < fx {
                        fx = f;
                        improved = true;
                        break;
                    }
                    x[i] = orig;
                }
            }

            if !improved {
                step *= self.step_decay;
            }
            log::trace!("local search sweep {iterations}: value={fx} step={step}");
        }

        Ok(OptimizerResult {
            params: x,
            value: fx,
            evaluations,
            iterations,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
/// Parameter update rule for [`GradientDescent`].
pub enum UpdateRule {
    /// Plain SGD.
    #[default]
    Sgd,
    /// SGD with momentum.
    SgdMomentum { momentum: f32 },
    /// Adam (bias-corrected).
    Adam { beta1: f32, beta2: f32, eps: f32 },
}

impl UpdateRule {
    /// Validate update-rule hyperparameters.
    pub fn validate(self) -> Result<()> {
        let unit = |v: f32| (0.0..1.0).contains(&v);
        match self {
            UpdateRule::Sgd => Ok(()),
            UpdateRule::SgdMomentum { momentum } => {
                check_hyperparam("momentum", momentum, "in [0,1)", unit)
            }
            UpdateRule::Adam { beta1, beta2, eps } => {
                check_hyperparam("adam beta1", beta1, "in [0,1)", unit)?;
                check_hyperparam("adam beta2", beta2, "in [0,1)", unit)?;
                check_hyperparam("adam eps", eps, "> 0", |v| v > 0.0)
            }
        }
    }

    /// Allocate update state for `dim` parameters.
    pub fn state(self, dim: usize) -> Result<UpdateState> {
        self.validate()?;

        Ok(match self {
            UpdateRule::Sgd => UpdateState::Sgd,
            UpdateRule::SgdMomentum { momentum } => UpdateState::SgdMomentum {
                momentum,
                velocity: vec![0.0; dim],
            },
            UpdateRule::Adam { beta1, beta2, eps } => UpdateState::Adam {
                beta1,
                beta2,
                eps,
                beta1_pow: 1.0,
                beta2_pow: 1.0,
                m: vec![0.0; dim],
                v: vec![0.0; dim],
            },
        })
    }
}

#[derive(Debug, Clone)]
/// Owned update-rule state (momentum / Adam moments).
pub enum UpdateState {
    Sgd,
    SgdMomentum {
        momentum: f32,
        velocity: Vec<f32>,
    },
    Adam {
        beta1: f32,
        beta2: f32,
        eps: f32,
        beta1_pow: f32,
        beta2_pow: f32,
        m: Vec<f32>,
        v: Vec<f32>,
    },
}

impl UpdateState {
    /// Apply one step: `params -= lr * direction(grad)`.
    pub fn step(&mut self, params: &mut [f32], grad: &[f32], lr: f32) {
        assert!(lr.is_finite() && lr > 0.0, "lr must be finite and > 0");
        assert_eq!(params.len(), grad.len(), "params/grad length mismatch");

        match self {
            UpdateState::Sgd => {
                for (p, &g) in params.iter_mut().zip(grad) {
                    *p -= lr * g;
                }
            }
            UpdateState::SgdMomentum { momentum, velocity } => {
                for ((p, v), &g) in params.iter_mut().zip(velocity.iter_mut()).zip(grad) {
                    *v = (*momentum) * *v + g;
                    *p -= lr * *v;
                }
            }
            UpdateState::Adam {
                beta1,
                beta2,
                eps,
                beta1_pow,
                beta2_pow,
                m,
                v,
            } => {
                *beta1_pow *= *beta1;
                *beta2_pow *= *beta2;
                let corr1 = 1.0 - *beta1_pow;
                let corr2 = 1.0 - *beta2_pow;

                for i in 0..params.len() {
                    let g = grad[i];
                    m[i] = (*beta1) * m[i] + (1.0 - *beta1) * g;
                    v[i] = (*beta2) * v[i] + (1.0 - *beta2) * (g * g);
                    let m_hat = m[i] / corr1;
                    let v_hat = v[i] / corr2;
                    params[i] -= lr * m_hat / (v_hat.sqrt() + *eps);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// Full-batch gradient descent.
///
/// Returns the best point seen over `maxiter` steps.
pub struct GradientDescent {
    pub maxiter: usize,
    pub lr: f32,
    pub rule: UpdateRule,
}

impl Default for GradientDescent {
    fn default() -> Self {
        Self {
            maxiter: 100,
            lr: 0.05,
            rule: UpdateRule::Adam {
                beta1: 0.9,
                beta2: 0.999,
                eps: 1e-8,
            },
        }
    }
}

impl GradientDescent {
    pub fn validate(&self) -> Result<()> {
        check_maxiter(self.maxiter)?;
        check_hyperparam("lr", self.lr, "> 0", |v| v > 0.0)?;
        self.rule.validate()
    }
}

impl Optimizer for GradientDescent {
    fn minimize(
        &self,
        objective: &mut dyn Objective,
        initial_point: &[f32],
    ) -> Result<OptimizerResult> {
        self.validate()?;

        let mut state = self.rule.state(initial_point.len())?;
        let mut x = initial_point.to_vec();
        let mut grad = vec![0.0_f32; x.len()];
        let mut best: Option<(Vec<f32>, f32)> = None;
        let mut evaluations = 0;

        for it in 0..self.maxiter {
            let fx = objective.value_and_gradient(&x, &mut grad)?;
            evaluations += 1;
            if best.as_ref().is_none_or(|(_, f)| fx < *f) {
                best = Some((x.clone(), fx));
            }
            state.step(&mut x, &grad, self.lr);
            log::trace!("gradient descent step {it}: value={fx}");
        }

        let fx = objective.value(&x)?;
        evaluations += 1;
        let (params, value) = match best {
            Some((p, f)) if f <= fx => (p, f),
            _ => (x, fx),
        };

        Ok(OptimizerResult {
            params,
            value,
            evaluations,
            iterations: self.maxiter,
        })
    }
}
