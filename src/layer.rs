//! Dense layer kernels over an external parameter vector.
//!
//! A `Layer` owns no weights. It describes where its weights and biases live in the
//! network's flat parameter vector:
//!
//! - `params[offset .. offset + out_dim * in_dim]`: weights, row-major `(out_dim, in_dim)`
//! - the following `out_dim` scalars: biases

use rand::Rng;
use rand::distributions::{Distribution, Uniform};

use crate::{Activation, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Weight initialization scheme.
pub enum Init {
    /// Xavier/Glorot uniform: `U(-sqrt(6/(in+out)), sqrt(6/(in+out)))`.
    Xavier,
    /// He/Kaiming uniform: `U(-sqrt(6/in), sqrt(6/in))`.
    He,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layer {
    in_dim: usize,
    out_dim: usize,
    activation: Activation,
    offset: usize,
}

impl Layer {
    pub fn new(
        in_dim: usize,
        out_dim: usize,
        activation: Activation,
        offset: usize,
    ) -> Result<Self> {
        if in_dim == 0 || out_dim == 0 {
            return Err(Error::InvalidConfig(format!(
                "layer dims must be > 0, got in_dim={in_dim} out_dim={out_dim}"
            )));
        }
        activation.validate()?;
        Ok(Self {
            in_dim,
            out_dim,
            activation,
            offset,
        })
    }

    #[inline]
    pub fn in_dim(&self) -> usize {
        self.in_dim
    }

    #[inline]
    pub fn out_dim(&self) -> usize {
        self.out_dim
    }

    #[inline]
    pub fn activation(&self) -> Activation {
        self.activation
    }

    /// Start of this layer's block in the flat parameter vector.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Weights plus biases.
    #[inline]
    pub fn num_params(&self) -> usize {
        self.out_dim * self.in_dim + self.out_dim
    }

    #[inline]
    fn split<'a>(&self, params: &'a [f32]) -> (&'a [f32], &'a [f32]) {
        let w_len = self.out_dim * self.in_dim;
        let block = &params[self.offset..self.offset + self.num_params()];
        block.split_at(w_len)
    }

    /// Forward pass for a single sample: `outputs = activation(W * inputs + b)`.
    ///
    /// Shape contract:
    /// - `inputs.len() == self.in_dim`
    /// - `outputs.len() == self.out_dim`
    #[inline]
    pub fn forward(&self, params: &[f32], inputs: &[f32], outputs: &mut [f32]) {
        debug_assert_eq!(inputs.len(), self.in_dim);
        debug_assert_eq!(outputs.len(), self.out_dim);

        let (weights, biases) = self.split(params);
        let rows = weights.chunks_exact(self.in_dim);
        for ((out, w_row), &b) in outputs.iter_mut().zip(rows).zip(biases) {
            *out = w_row.iter().zip(inputs).fold(b, |acc, (w, x)| w.mul_add(*x, acc));
        }
        self.activation.apply(outputs);
    }

    /// Backward pass for a single sample.
    ///
    /// Overwrite semantics: `d_inputs` and this layer's block of `d_params` are
    /// overwritten. `outputs` must be the post-activation outputs from `forward`
    /// and `d_outputs` the upstream gradient `dL/d(outputs)`.
    ///
    /// `d_params` is the gradient buffer for the whole network (same layout as `params`).
    #[allow(clippy::too_many_arguments)]
    #[inline]
    pub fn backward(
        &self,
        params: &[f32],
        inputs: &[f32],
        outputs: &[f32],
        d_outputs: &[f32],
        d_inputs: &mut [f32],
        d_params: &mut [f32],
    ) {
        debug_assert_eq!(inputs.len(), self.in_dim);
        debug_assert_eq!(outputs.len(), self.out_dim);
        debug_assert_eq!(d_outputs.len(), self.out_dim);
        debug_assert_eq!(d_inputs.len(), self.in_dim);
        debug_assert_eq!(d_params.len(), params.len());

        let (weights, _) = self.split(params);
        let w_len = self.out_dim * self.in_dim;
        let block = &mut d_params[self.offset..self.offset + self.num_params()];
        let (d_weights, d_biases) = block.split_at_mut(w_len);

        d_inputs.fill(0.0);

        for o in 0..self.out_dim {
            let d_z = d_outputs[o] * self.activation.slope_at_output(outputs[o]);
            d_biases[o] = d_z;

            let row = o * self.in_dim;
            for i in 0..self.in_dim {
                d_weights[row + i] = d_z * inputs[i];
                d_inputs[i] = weights[row + i].mul_add(d_z, d_inputs[i]);
            }
        }
    }

    /// Write initial weights (sampled with `init`) and zero biases into this layer's block.
    pub fn init_params<R: Rng + ?Sized>(&self, init: Init, rng: &mut R, params: &mut [f32]) {
        let limit = match init {
            Init::Xavier => (6.0 / (self.in_dim + self.out_dim) as f32).sqrt(),
            Init::He => (6.0 / self.in_dim as f32).sqrt(),
        };
        let dist = Uniform::new_inclusive(-limit, limit);

        let w_len = self.out_dim * self.in_dim;
        let block = &mut params[self.offset..self.offset + self.num_params()];
        let (weights, biases) = block.split_at_mut(w_len);
        for w in weights.iter_mut() {
            *w = dist.sample(rng);
        }
        biases.fill(0.0);
    }
}
