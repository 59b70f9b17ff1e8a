//! The network contract consumed by the classifier.
//!
//! A network is a fixed-shape parameterized function. It owns no trainable state:
//! every evaluation receives the full parameter vector, which lets the training
//! driver hand arbitrary candidate points to it.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{Inputs, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// What a network's output row represents.
pub enum OutputKind {
    /// A single real value per sample.
    Scalar,
    /// An unconstrained real vector per sample.
    Vector,
    /// A probability distribution over discrete classes (non-negative, sums to 1).
    Probabilities,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Shape descriptor of a network, persisted alongside fitted parameters.
pub struct NetworkShape {
    pub input_dim: usize,
    pub num_params: usize,
    pub output_dim: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Execution engine for batched evaluation.
///
/// Backends only change how samples are scheduled; per-sample arithmetic is the
/// same, so results are bitwise identical across backends. Never persisted.
pub enum Backend {
    #[default]
    Serial,
    /// Evaluate samples on the rayon thread pool.
    Parallel,
}

/// A parameterized model `f(params, x)`.
///
/// Batched buffers are flat and row-major:
/// - inputs: `(n, input_dim)`
/// - outputs: `(n, output_dim)`
/// - jacobian: `(n, output_dim, num_params)`
pub trait Network {
    fn input_dim(&self) -> usize;

    fn num_params(&self) -> usize;

    fn output_dim(&self) -> usize;

    fn output_kind(&self) -> OutputKind {
        if self.output_dim() == 1 {
            OutputKind::Scalar
        } else {
            OutputKind::Vector
        }
    }

    fn shape(&self) -> NetworkShape {
        NetworkShape {
            input_dim: self.input_dim(),
            num_params: self.num_params(),
            output_dim: self.output_dim(),
        }
    }

    /// Deterministic starting point for training.
    fn initial_params(&self, _seed: u64) -> Vec<f32> {
        vec![0.0; self.num_params()]
    }

    /// Evaluate outputs for every sample.
    fn forward(&self, params: &[f32], inputs: &Inputs) -> Result<Vec<f32>>;

    /// Evaluate outputs and the jacobian of outputs w.r.t. parameters.
    fn backward(&self, params: &[f32], inputs: &Inputs) -> Result<(Vec<f32>, Vec<f32>)>;
}

/// A network whose architecture can be written to and rebuilt from a persisted record.
pub trait PersistentNetwork: Network + Sized {
    type Architecture: Serialize + DeserializeOwned;

    fn architecture(&self) -> Self::Architecture;

    fn from_architecture(architecture: Self::Architecture) -> Result<Self>;
}
