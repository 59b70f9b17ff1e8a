//! A trainable neural-network classifier.
//!
//! `rust-nn-classifier` fits the parameters of a [`Network`] by minimizing a loss over
//! labeled samples, then predicts labels in the caller's own label space.
//!
//! # Design goals
//!
//! - Networks own no weights: every evaluation takes the full flat parameter vector,
//!   so any [`Optimizer`] can probe arbitrary points.
//! - Pluggable behavior at clear seams: losses implement [`LossFunction`], optimizers
//!   implement [`Optimizer`], networks implement [`Network`].
//! - Labels are an explicit tagged union ([`Labels`]). The encoding is discovered once
//!   per `fit` and fixed until the next one ([`LabelEncoding`]).
//! - Fitted models persist as self-describing JSON records that are type-checked on
//!   load ([`SerializableModel`]).
//!
//! # Panics vs `Result`
//!
//! - Low-level hot path (panics on misuse): [`Mlp::forward_sample`],
//!   [`Mlp::backward_sample`] and the loss kernels in [`loss`]. Shape mismatches are
//!   programmer error and panic via `assert!`.
//! - Everything else validates its inputs and returns [`Result`].
//!
//! # Data layout and shapes
//!
//! - Scalars are `f32`.
//! - [`Inputs`] stores samples contiguously in row-major layout.
//! - Layer weights are row-major `(out_dim, in_dim)` blocks inside the flat parameter
//!   vector, each followed by its biases.
//! - Batched outputs are flat `(n, output_dim)`; jacobians are flat
//!   `(n, output_dim, num_params)`.
//!
//! # Quick start
//!
//! ```rust
//! use rust_nn_classifier::{Activation, Inputs, Labels, MlpBuilder, NeuralNetworkClassifier};
//!
//! # fn main() -> rust_nn_classifier::Result<()> {
//! let xs = Inputs::from_rows(&[
//!     vec![0.1, 0.2],
//!     vec![0.9, 0.8],
//!     vec![0.2, 0.1],
//!     vec![0.8, 0.9],
//! ])?;
//! let ys = Labels::categorical(&["low", "high", "low", "high"]);
//!
//! let mlp = MlpBuilder::new(2)?
//!     .add_layer(4, Activation::Tanh)?
//!     .add_layer(2, Activation::Identity)?
//!     .softmax_output()
//!     .build()?;
//!
//! let mut clf = NeuralNetworkClassifier::new(mlp).with_loss_name("cross_entropy")?;
//! clf.fit(&xs, &ys)?;
//! let accuracy = clf.score(&xs, &ys)?;
//! assert!((0.0..=1.0).contains(&accuracy));
//! # Ok(())
//! # }
//! ```
//!
//! # Persistence
//!
//! ```rust
//! use rust_nn_classifier::{
//!     Activation, Inputs, Labels, Mlp, MlpBuilder, NeuralNetworkClassifier, SerializableModel,
//! };
//!
//! # fn main() -> rust_nn_classifier::Result<()> {
//! let xs = Inputs::from_rows(&[vec![0.0], vec![1.0]])?;
//! let ys = Labels::Numeric(vec![0.0, 1.0]);
//! let mlp = MlpBuilder::new(1)?.add_layer(1, Activation::Sigmoid)?.build()?;
//!
//! let mut clf = NeuralNetworkClassifier::new(mlp);
//! clf.fit(&xs, &ys)?;
//!
//! let json = clf.to_json_string()?;
//! let loaded = NeuralNetworkClassifier::<Mlp>::from_json_str(&json)?;
//! assert_eq!(loaded.predict(&xs)?, clf.predict(&xs)?);
//! # Ok(())
//! # }
//! ```

pub mod activation;
pub mod builder;
pub mod classifier;
pub mod codec;
pub mod data;
pub mod error;
pub mod labels;
pub mod layer;
pub mod loss;
pub mod metrics;
pub mod mlp;
pub mod network;
pub mod objective;
pub mod optim;
pub mod regressor;
pub mod serde_model;
pub mod train;

pub use activation::Activation;
pub use builder::MlpBuilder;
pub use classifier::{ClassifierConfig, NeuralNetworkClassifier};
pub use codec::{BinaryScheme, LabelCodec, LabelEncoding};
pub use data::{CsrMatrix, Inputs, Targets};
pub use error::{Error, Result};
pub use labels::{LabelKey, Labels};
pub use layer::{Init, Layer};
pub use loss::{Loss, LossFunction, NamedLoss};
pub use mlp::{Mlp, Scratch};
pub use network::{Backend, Network, NetworkShape, OutputKind, PersistentNetwork};
pub use objective::{Callback, NetworkObjective, Objective, TrainingHistory};
pub use optim::{GradientDescent, LocalSearch, Optimizer, OptimizerResult, UpdateRule};
pub use regressor::{NeuralNetworkRegressor, RegressorConfig};
pub use serde_model::{ModelRecord, SerializableModel};
pub use train::{FitReport, TrainingDriver};
