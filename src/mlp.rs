use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;

use crate::activation::{softmax_backward, softmax_in_place};
use crate::{Backend, Error, Inputs, Layer, Network, OutputKind, Result};

/// Dense feed-forward network evaluated at an external parameter vector.
///
/// The architecture (layer sizes and activations) is fixed at build time; weights
/// are supplied on every call. See [`crate::layer`] for the parameter layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Mlp {
    layers: Vec<Layer>,
    softmax_output: bool,
    backend: Backend,
}

/// Reusable per-sample buffers for `Mlp` forward/backward.
///
/// The output of the most recent forward pass lives inside `Scratch`.
#[derive(Debug, Clone)]
pub struct Scratch {
    layer_outputs: Vec<Vec<f32>>,
    // Softmax over the last layer output; empty when the network has no softmax.
    probs: Vec<f32>,
    // Backprop intermediates: gradient w.r.t. each layer output.
    d_layer_outputs: Vec<Vec<f32>>,
    d_input: Vec<f32>,
}

impl Mlp {
    /// Assemble a network from chained layers.
    ///
    /// Layers must chain (`out_dim` of layer `i` equals `in_dim` of layer `i + 1`) and
    /// their parameter blocks must tile the parameter vector in order.
    pub fn from_layers(layers: Vec<Layer>, softmax_output: bool) -> Result<Self> {
        if layers.is_empty() {
            return Err(Error::InvalidConfig(
                "mlp must have at least one layer".to_owned(),
            ));
        }
        let mut offset = 0;
        for (i, layer) in layers.iter().enumerate() {
            if i > 0 && layer.in_dim() != layers[i - 1].out_dim() {
                return Err(Error::InvalidConfig(format!(
                    "layer {i} in_dim {} does not match previous out_dim {}",
                    layer.in_dim(),
                    layers[i - 1].out_dim()
                )));
            }
            if layer.offset() != offset {
                return Err(Error::InvalidConfig(format!(
                    "layer {i} parameter offset {} does not match expected {offset}",
                    layer.offset()
                )));
            }
            offset += layer.num_params();
        }
        Ok(Self {
            layers,
            softmax_output,
            backend: Backend::default(),
        })
    }

    /// Same architecture, different execution backend.
    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    #[inline]
    pub fn backend(&self) -> Backend {
        self.backend
    }

    #[inline]
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    #[inline]
    pub fn layer(&self, idx: usize) -> Option<&Layer> {
        self.layers.get(idx)
    }

    #[inline]
    pub fn softmax_output(&self) -> bool {
        self.softmax_output
    }

    pub fn scratch(&self) -> Scratch {
        Scratch::new(self)
    }

    /// Forward pass for a single sample.
    ///
    /// Shape contract (panics on misuse):
    /// - `params.len() == self.num_params()`
    /// - `input.len() == self.input_dim()`
    /// - `scratch` was built for this `Mlp`
    pub fn forward_sample<'a>(
        &self,
        params: &[f32],
        input: &[f32],
        scratch: &'a mut Scratch,
    ) -> &'a [f32] {
        assert_eq!(
            params.len(),
            self.num_params(),
            "params len {} does not match model num_params {}",
            params.len(),
            self.num_params()
        );
        assert_eq!(
            input.len(),
            self.input_dim(),
            "input len {} does not match model input_dim {}",
            input.len(),
            self.input_dim()
        );
        assert_eq!(
            scratch.layer_outputs.len(),
            self.layers.len(),
            "scratch has {} layer outputs, model has {} layers",
            scratch.layer_outputs.len(),
            self.layers.len()
        );

        for (idx, layer) in self.layers.iter().enumerate() {
            if idx == 0 {
                layer.forward(params, input, &mut scratch.layer_outputs[0]);
            } else {
                let (left, right) = scratch.layer_outputs.split_at_mut(idx);
                layer.forward(params, &left[idx - 1], &mut right[0]);
            }
        }

        if self.softmax_output {
            let last = scratch.layer_outputs.len() - 1;
            scratch.probs.copy_from_slice(&scratch.layer_outputs[last]);
            softmax_in_place(&mut scratch.probs);
        }

        scratch.output()
    }

    /// Backward pass for a single sample.
    ///
    /// Call `forward_sample` first with the same `params`, `input` and `scratch`.
    /// Writes `d(sum_k d_output[k] * y[k]) / d(params)` into `d_params` (overwrite).
    pub fn backward_sample(
        &self,
        params: &[f32],
        input: &[f32],
        scratch: &mut Scratch,
        d_output: &[f32],
        d_params: &mut [f32],
    ) {
        assert_eq!(
            d_output.len(),
            self.output_dim(),
            "d_output len {} does not match model output_dim {}",
            d_output.len(),
            self.output_dim()
        );
        assert_eq!(
            d_params.len(),
            self.num_params(),
            "d_params len {} does not match model num_params {}",
            d_params.len(),
            self.num_params()
        );

        let last = self.layers.len() - 1;
        if self.softmax_output {
            softmax_backward(&scratch.probs, d_output, &mut scratch.d_layer_outputs[last]);
        } else {
            scratch.d_layer_outputs[last].copy_from_slice(d_output);
        }

        for idx in (0..self.layers.len()).rev() {
            let layer = &self.layers[idx];
            let layer_output = &scratch.layer_outputs[idx];

            if idx == 0 {
                layer.backward(
                    params,
                    input,
                    layer_output,
                    &scratch.d_layer_outputs[0],
                    &mut scratch.d_input,
                    d_params,
                );
            } else {
                // The current layer's d_inputs become d_outputs of the previous layer.
                let layer_input = &scratch.layer_outputs[idx - 1];
                let (left, right) = scratch.d_layer_outputs.split_at_mut(idx);
                layer.backward(
                    params,
                    layer_input,
                    layer_output,
                    &right[0],
                    &mut left[idx - 1],
                    d_params,
                );
            }
        }
    }

    /// Jacobian of the outputs w.r.t. parameters for one sample.
    ///
    /// `out` receives the outputs, `jac` the row-major `(output_dim, num_params)` jacobian.
    fn jacobian_sample(
        &self,
        params: &[f32],
        input: &[f32],
        scratch: &mut Scratch,
        d_output: &mut [f32],
        out: &mut [f32],
        jac: &mut [f32],
    ) {
        out.copy_from_slice(self.forward_sample(params, input, scratch));
        let p = self.num_params();
        for k in 0..self.output_dim() {
            d_output.fill(0.0);
            d_output[k] = 1.0;
            self.backward_sample(params, input, scratch, d_output, &mut jac[k * p..(k + 1) * p]);
        }
    }

    fn check_call(&self, params: &[f32], inputs: &Inputs) -> Result<()> {
        if params.len() != self.num_params() {
            return Err(Error::Shape(format!(
                "params len {} does not match model num_params {}",
                params.len(),
                self.num_params()
            )));
        }
        if inputs.input_dim() != self.input_dim() {
            return Err(Error::Shape(format!(
                "inputs input_dim {} does not match model input_dim {}",
                inputs.input_dim(),
                self.input_dim()
            )));
        }
        Ok(())
    }
}

impl Network for Mlp {
    #[inline]
    fn input_dim(&self) -> usize {
        self.layers[0].in_dim()
    }

    #[inline]
    fn num_params(&self) -> usize {
        self.layers.iter().map(Layer::num_params).sum()
    }

    #[inline]
    fn output_dim(&self) -> usize {
        self.layers[self.layers.len() - 1].out_dim()
    }

    fn output_kind(&self) -> OutputKind {
        if self.softmax_output {
            OutputKind::Probabilities
        } else if self.output_dim() == 1 {
            OutputKind::Scalar
        } else {
            OutputKind::Vector
        }
    }

    fn initial_params(&self, seed: u64) -> Vec<f32> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut params = vec![0.0; self.num_params()];
        for layer in &self.layers {
            layer.init_params(layer.activation().default_init(), &mut rng, &mut params);
        }
        params
    }

    fn forward(&self, params: &[f32], inputs: &Inputs) -> Result<Vec<f32>> {
        self.check_call(params, inputs)?;

        let out_dim = self.output_dim();
        let mut outputs = vec![0.0_f32; inputs.len() * out_dim];

        match self.backend {
            Backend::Serial => {
                let mut scratch = self.scratch();
                for (idx, out) in outputs.chunks_exact_mut(out_dim).enumerate() {
                    let y = self.forward_sample(params, inputs.input(idx), &mut scratch);
                    out.copy_from_slice(y);
                }
            }
            Backend::Parallel => {
                outputs
                    .par_chunks_exact_mut(out_dim)
                    .enumerate()
                    .for_each_init(
                        || self.scratch(),
                        |scratch, (idx, out)| {
                            out.copy_from_slice(self.forward_sample(
                                params,
                                inputs.input(idx),
                                scratch,
                            ));
                        },
                    );
            }
        }

        Ok(outputs)
    }

    fn backward(&self, params: &[f32], inputs: &Inputs) -> Result<(Vec<f32>, Vec<f32>)> {
        self.check_call(params, inputs)?;

        let out_dim = self.output_dim();
        let jac_len = out_dim * self.num_params();
        let mut outputs = vec![0.0_f32; inputs.len() * out_dim];
        let mut jacobian = vec![0.0_f32; inputs.len() * jac_len];

        match self.backend {
            Backend::Serial => {
                let mut scratch = self.scratch();
                let mut d_output = vec![0.0_f32; out_dim];
                for (idx, (out, jac)) in outputs
                    .chunks_exact_mut(out_dim)
                    .zip(jacobian.chunks_exact_mut(jac_len))
                    .enumerate()
                {
                    self.jacobian_sample(
                        params,
                        inputs.input(idx),
                        &mut scratch,
                        &mut d_output,
                        out,
                        jac,
                    );
                }
            }
            Backend::Parallel => {
                outputs
                    .par_chunks_exact_mut(out_dim)
                    .zip(jacobian.par_chunks_exact_mut(jac_len))
                    .enumerate()
                    .for_each_init(
                        || (self.scratch(), vec![0.0_f32; out_dim]),
                        |(scratch, d_output), (idx, (out, jac))| {
                            self.jacobian_sample(
                                params,
                                inputs.input(idx),
                                scratch,
                                d_output,
                                out,
                                jac,
                            );
                        },
                    );
            }
        }

        Ok((outputs, jacobian))
    }
}

impl Scratch {
    pub fn new(mlp: &Mlp) -> Self {
        let layer_outputs: Vec<Vec<f32>> =
            mlp.layers.iter().map(|l| vec![0.0; l.out_dim()]).collect();
        let d_layer_outputs = layer_outputs.clone();
        let probs = if mlp.softmax_output {
            vec![0.0; mlp.output_dim()]
        } else {
            Vec::new()
        };
        Self {
            layer_outputs,
            probs,
            d_layer_outputs,
            d_input: vec![0.0; mlp.input_dim()],
        }
    }

    #[inline]
    pub fn output(&self) -> &[f32] {
        if self.probs.is_empty() {
            self.layer_outputs.last().map_or(&[], Vec::as_slice)
        } else {
            &self.probs
        }
    }

    /// Gradient w.r.t. the input of the most recent `backward_sample`.
    #[inline]
    pub fn d_input(&self) -> &[f32] {
        &self.d_input
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{Activation, MlpBuilder};

    fn assert_close(analytic: f32, numeric: f32, abs_tol: f32, rel_tol: f32) {
        let diff = (analytic - numeric).abs();
        let scale = analytic.abs().max(numeric.abs()).max(1.0);
        assert!(
            diff <= abs_tol || diff / scale <= rel_tol,
            "analytic={analytic} numeric={numeric} diff={diff}"
        );
    }

    fn small_mlp(softmax: bool) -> Mlp {
        let builder = MlpBuilder::new(2)
            .unwrap()
            .add_layer(3, Activation::Tanh)
            .unwrap()
            .add_layer(2, Activation::Identity)
            .unwrap();
        let builder = if softmax {
            builder.softmax_output()
        } else {
            builder
        };
        builder.build().unwrap()
    }

    #[test]
    fn seeded_init_is_deterministic() {
        let mlp = small_mlp(false);
        assert_eq!(mlp.initial_params(123), mlp.initial_params(123));
        assert_ne!(mlp.initial_params(123), mlp.initial_params(124));
        assert_eq!(mlp.num_params(), 2 * 3 + 3 + 3 * 2 + 2);
    }

    #[test]
    fn jacobian_matches_numeric_gradients() {
        for softmax in [false, true] {
            let mlp = small_mlp(softmax);
            let mut params = mlp.initial_params(0);
            let inputs = Inputs::from_flat(vec![0.3, -0.7], 2).unwrap();

            let (_, jac) = mlp.backward(&params, &inputs).unwrap();

            let eps = 1e-3_f32;
            let p = mlp.num_params();
            for j in 0..p {
                let orig = params[j];
                params[j] = orig + eps;
                let plus = mlp.forward(&params, &inputs).unwrap();
                params[j] = orig - eps;
                let minus = mlp.forward(&params, &inputs).unwrap();
                params[j] = orig;

                for k in 0..mlp.output_dim() {
                    let numeric = (plus[k] - minus[k]) / (2.0 * eps);
                    assert_close(jac[k * p + j], numeric, 1e-3, 1e-2);
                }
            }
        }
    }

    #[test]
    fn softmax_output_is_a_distribution() {
        let mlp = small_mlp(true);
        assert_eq!(mlp.output_kind(), OutputKind::Probabilities);
        let params = mlp.initial_params(3);
        let inputs = Inputs::from_rows(&[vec![1.0, 2.0], vec![-1.0, 0.5]]).unwrap();
        let out = mlp.forward(&params, &inputs).unwrap();
        for row in out.chunks_exact(2) {
            assert!((row[0] + row[1] - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn backends_agree_bitwise() {
        let serial = small_mlp(false);
        let parallel = serial.clone().with_backend(Backend::Parallel);
        let params = serial.initial_params(11);
        let rows: Vec<Vec<f32>> = (0..64)
            .map(|i| vec![i as f32 * 0.1, 1.0 - i as f32 * 0.05])
            .collect();
        let inputs = Inputs::from_rows(&rows).unwrap();

        assert_eq!(
            serial.forward(&params, &inputs).unwrap(),
            parallel.forward(&params, &inputs).unwrap()
        );
        assert_eq!(
            serial.backward(&params, &inputs).unwrap(),
            parallel.backward(&params, &inputs).unwrap()
        );
    }

    #[test]
    fn forward_rejects_wrong_param_count() {
        let mlp = small_mlp(false);
        let inputs = Inputs::from_flat(vec![0.0, 0.0], 2).unwrap();
        let err = mlp.forward(&[0.0; 3], &inputs).unwrap_err();
        assert!(matches!(err, Error::Shape(_)));
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic]
    fn forward_sample_panics_on_input_shape_mismatch() {
        let mlp = small_mlp(false);
        let params = mlp.initial_params(0);
        let mut scratch = mlp.scratch();
        mlp.forward_sample(&params, &[0.0; 3], &mut scratch);
    }
}
