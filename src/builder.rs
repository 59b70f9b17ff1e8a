//! Network builder.
//!
//! `MlpBuilder` is the recommended way to define an [`Mlp`]. It makes the model
//! structure explicit (layer sizes + activations) and lays out each layer's block in
//! the flat parameter vector. Weights themselves are not part of the network; get a
//! starting point from [`crate::Network::initial_params`].

use crate::{Activation, Error, Layer, Mlp, Result};

#[derive(Debug, Clone, Copy)]
struct LayerSpec {
    out_dim: usize,
    activation: Activation,
}

#[derive(Debug, Clone)]
/// Builder for an `Mlp`.
///
/// Example:
///
/// ```rust
/// use rust_nn_classifier::{Activation, MlpBuilder, Network};
///
/// # fn main() -> rust_nn_classifier::Result<()> {
/// let mlp = MlpBuilder::new(2)?
///     .add_layer(4, Activation::Tanh)?
///     .add_layer(2, Activation::Identity)?
///     .softmax_output()
///     .build()?;
/// assert_eq!(mlp.num_params(), 2 * 4 + 4 + 4 * 2 + 2);
/// # Ok(())
/// # }
/// ```
pub struct MlpBuilder {
    input_dim: usize,
    layers: Vec<LayerSpec>,
    softmax_output: bool,
}

impl MlpBuilder {
    /// Start building an MLP that accepts inputs of length `input_dim`.
    pub fn new(input_dim: usize) -> Result<Self> {
        if input_dim == 0 {
            return Err(Error::InvalidConfig("input_dim must be > 0".to_owned()));
        }
        Ok(Self {
            input_dim,
            layers: Vec::new(),
            softmax_output: false,
        })
    }

    /// Build from a dimension chain such as `[input, hidden, output]`, one activation per
    /// consecutive pair.
    pub fn from_sizes(sizes: &[usize], activations: &[Activation]) -> Result<Self> {
        let Some((&input_dim, outs)) = sizes.split_first() else {
            return Err(Error::InvalidConfig("sizes is empty".to_owned()));
        };
        if outs.is_empty() || outs.len() != activations.len() {
            return Err(Error::InvalidConfig(format!(
                "sizes {sizes:?} need one activation per layer, got {}",
                activations.len()
            )));
        }
        outs.iter()
            .zip(activations)
            .try_fold(Self::new(input_dim)?, |b, (&out_dim, &act)| b.add_layer(out_dim, act))
    }

    /// Add a dense layer with `out_dim` outputs.
    pub fn add_layer(mut self, out_dim: usize, activation: Activation) -> Result<Self> {
        if out_dim == 0 {
            return Err(Error::InvalidConfig(format!(
                "layer {} has zero outputs",
                self.layers.len()
            )));
        }
        activation.validate()?;
        self.layers.push(LayerSpec { out_dim, activation });
        Ok(self)
    }

    /// Apply softmax to the last layer, making the output a probability distribution.
    pub fn softmax_output(mut self) -> Self {
        self.softmax_output = true;
        self
    }

    /// Lay the layers out back to back in the parameter vector and build the network.
    pub fn build(self) -> Result<Mlp> {
        let Some(last) = self.layers.last() else {
            return Err(Error::InvalidConfig("mlp needs at least one layer".to_owned()));
        };
        if self.softmax_output && last.out_dim < 2 {
            return Err(Error::InvalidConfig(format!(
                "softmax output needs >= 2 output units, last layer has {}",
                last.out_dim
            )));
        }

        let mut in_dim = self.input_dim;
        let mut offset = 0;
        let layers = self
            .layers
            .iter()
            .map(|spec| {
                let layer = Layer::new(in_dim, spec.out_dim, spec.activation, offset)?;
                in_dim = spec.out_dim;
                offset += layer.num_params();
                Ok(layer)
            })
            .collect::<Result<Vec<_>>>()?;

        Mlp::from_layers(layers, self.softmax_output)
    }
}
