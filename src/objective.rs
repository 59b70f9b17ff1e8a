//! Training objective over network parameters.
//!
//! [`NetworkObjective`] evaluates the network on the full batch, applies the loss row
//! by row against the encoded targets and averages over samples. Gradients are chained
//! through the network jacobian:
//!
//! `dJ/dθ = (1/n) * sum_i sum_k dL_i/dy_ik * dy_ik/dθ`

use crate::{Error, Inputs, LossFunction, Network, Result, Targets};

/// Progress callback, invoked as `callback(params, objective_value)` once per
/// objective evaluation.
pub type Callback = Box<dyn FnMut(&[f32], f32)>;

/// A scalar function of a parameter vector, as seen by an optimizer.
pub trait Objective {
    /// Parameter vector length.
    fn dim(&self) -> usize;

    fn value(&mut self, params: &[f32]) -> Result<f32>;

    /// Objective value, with `dJ/d(params)` written into `grad` (overwrite).
    fn value_and_gradient(&mut self, params: &[f32], grad: &mut [f32]) -> Result<f32>;
}

/// Every objective evaluation of one `fit`, in evaluation order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingHistory {
    pub params: Vec<Vec<f32>>,
    pub values: Vec<f32>,
}

impl TrainingHistory {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn push(&mut self, params: &[f32], value: f32) {
        self.params.push(params.to_vec());
        self.values.push(value);
    }
}

/// Mean loss of a network over a labeled batch.
pub struct NetworkObjective<'a, N: Network + ?Sized> {
    network: &'a N,
    inputs: &'a Inputs,
    targets: &'a Targets,
    loss: &'a dyn LossFunction,
    callback: Option<&'a mut Callback>,
    history: Option<TrainingHistory>,
    evaluations: usize,
    target_buf: Vec<f32>,
    d_pred: Vec<f32>,
}

impl<'a, N: Network + ?Sized> NetworkObjective<'a, N> {
    pub fn new(
        network: &'a N,
        inputs: &'a Inputs,
        targets: &'a Targets,
        loss: &'a dyn LossFunction,
    ) -> Result<Self> {
        if inputs.is_empty() {
            return Err(Error::InvalidData(
                "training inputs must not be empty".to_owned(),
            ));
        }
        if inputs.input_dim() != network.input_dim() {
            return Err(Error::Shape(format!(
                "inputs input_dim {} does not match network input_dim {}",
                inputs.input_dim(),
                network.input_dim()
            )));
        }
        if targets.len() != inputs.len() {
            return Err(Error::Shape(format!(
                "{} targets for {} samples",
                targets.len(),
                inputs.len()
            )));
        }
        if targets.width() != network.output_dim() {
            return Err(Error::Shape(format!(
                "target width {} does not match network output_dim {}",
                targets.width(),
                network.output_dim()
            )));
        }

        let width = targets.width();
        Ok(Self {
            network,
            inputs,
            targets,
            loss,
            callback: None,
            history: None,
            evaluations: 0,
            target_buf: vec![0.0; width],
            d_pred: vec![0.0; width],
        })
    }

    pub fn with_callback(mut self, callback: Option<&'a mut Callback>) -> Self {
        self.callback = callback;
        self
    }

    /// Keep a [`TrainingHistory`] of every evaluation.
    pub fn record_history(mut self, record: bool) -> Self {
        self.history = record.then(TrainingHistory::default);
        self
    }

    /// Number of evaluations so far.
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    pub fn take_history(&mut self) -> Option<TrainingHistory> {
        self.history.take()
    }

    fn finish(&mut self, params: &[f32], value: f32) -> Result<f32> {
        self.evaluations += 1;
        if !value.is_finite() {
            return Err(Error::TrainingFailed(format!(
                "objective is not finite ({value}) at evaluation {}",
                self.evaluations
            )));
        }
        if let Some(callback) = self.callback.as_mut() {
            callback(params, value);
        }
        if let Some(history) = self.history.as_mut() {
            history.push(params, value);
        }
        Ok(value)
    }
}

impl<N: Network + ?Sized> Objective for NetworkObjective<'_, N> {
    fn dim(&self) -> usize {
        self.network.num_params()
    }

    fn value(&mut self, params: &[f32]) -> Result<f32> {
        let outputs = self.network.forward(params, self.inputs)?;
        let width = self.targets.width();

        let mut total = 0.0_f32;
        for (idx, pred) in outputs.chunks_exact(width).enumerate() {
            let target = self.targets.row(idx, &mut self.target_buf);
            total += self.loss.evaluate(pred, target, &mut self.d_pred);
        }

        let value = total / self.inputs.len() as f32;
        self.finish(params, value)
    }

    fn value_and_gradient(&mut self, params: &[f32], grad: &mut [f32]) -> Result<f32> {
        let p = self.dim();
        assert_eq!(
            grad.len(),
            p,
            "grad len {} does not match objective dim {p}",
            grad.len()
        );

        let (outputs, jacobian) = self.network.backward(params, self.inputs)?;
        let width = self.targets.width();
        let inv_n = 1.0 / self.inputs.len() as f32;

        grad.fill(0.0);
        let mut total = 0.0_f32;
        for (idx, (pred, jac)) in outputs
            .chunks_exact(width)
            .zip(jacobian.chunks_exact(width * p))
            .enumerate()
        {
            let target = self.targets.row(idx, &mut self.target_buf);
            total += self.loss.evaluate(pred, target, &mut self.d_pred);

            for (k, jac_row) in jac.chunks_exact(p).enumerate() {
                let scale = self.d_pred[k] * inv_n;
                if scale == 0.0 {
                    continue;
                }
                for (g, &j) in grad.iter_mut().zip(jac_row) {
                    *g = scale.mul_add(j, *g);
                }
            }
        }

        if grad.iter().any(|g| !g.is_finite()) {
            self.evaluations += 1;
            return Err(Error::TrainingFailed(format!(
                "gradient is not finite at evaluation {}",
                self.evaluations
            )));
        }

        self.finish(params, total * inv_n)
    }
}
