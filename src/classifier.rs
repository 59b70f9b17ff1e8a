//! Neural-network classifier.
//!
//! Ties the pieces together: the [`LabelCodec`] maps caller labels to targets, the
//! [`TrainingDriver`] fits parameters for a [`Network`], and predictions are decoded
//! back into the caller's label space.
//!
//! Fitted parameters and the label mapping belong to one classifier instance. A
//! successful `fit` replaces both; a failed `fit` leaves them untouched.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::train::{TrainingDriver, resolve_initial_point};
use crate::{
    Callback, Error, FitReport, Inputs, LabelCodec, Labels, LocalSearch, Loss, LossFunction,
    Network, Optimizer, OutputKind, Result, metrics,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
/// Classifier options that are persisted with the model.
pub struct ClassifierConfig {
    /// Encode numeric labels as one-hot rows over the network outputs.
    pub one_hot: bool,
    /// Start each `fit` from the previously fitted parameters, if any.
    pub warm_start: bool,
    /// Seed of the network's parameter initializer.
    pub seed: u64,
    /// Keep every objective evaluation in the returned [`FitReport`].
    pub record_history: bool,
}

/// A classifier around a parameterized [`Network`].
///
/// Defaults: squared error loss, [`LocalSearch`] optimizer, no callback.
pub struct NeuralNetworkClassifier<N: Network> {
    network: Arc<N>,
    loss: Box<dyn LossFunction>,
    optimizer: Box<dyn Optimizer>,
    config: ClassifierConfig,
    callback: Option<Callback>,
    codec: LabelCodec,
    fitted: Option<Vec<f32>>,
}

impl<N: Network> fmt::Debug for NeuralNetworkClassifier<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NeuralNetworkClassifier")
            .field("network", &self.network.shape())
            .field("loss", &self.loss.name())
            .field("config", &self.config)
            .field("callback", &self.callback.is_some())
            .field("codec", &self.codec)
            .field("fitted", &self.fitted.as_ref().map(Vec::len))
            .finish()
    }
}

impl<N: Network> NeuralNetworkClassifier<N> {
    pub fn new(network: N) -> Self {
        Self::from_shared(Arc::new(network))
    }

    /// Wrap a network that is shared with other models.
    pub fn from_shared(network: Arc<N>) -> Self {
        Self {
            network,
            loss: Box::new(Loss::default()),
            optimizer: Box::new(LocalSearch::default()),
            config: ClassifierConfig::default(),
            callback: None,
            codec: LabelCodec::new(),
            fitted: None,
        }
    }

    pub fn with_loss<L: LossFunction + 'static>(mut self, loss: L) -> Self {
        self.loss = Box::new(loss);
        self
    }

    /// Select a built-in loss by name (`absolute_error`, `squared_error`, `cross_entropy`).
    pub fn with_loss_name(self, name: &str) -> Result<Self> {
        let loss: Loss = name.parse()?;
        Ok(self.with_loss(loss))
    }

    pub fn with_optimizer<O: Optimizer + 'static>(mut self, optimizer: O) -> Self {
        self.optimizer = Box::new(optimizer);
        self
    }

    pub fn with_config(mut self, config: ClassifierConfig) -> Self {
        self.config = config;
        self
    }

    /// Register `callback(params, loss)`, invoked once per objective evaluation.
    pub fn with_callback<F: FnMut(&[f32], f32) + 'static>(mut self, callback: F) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    pub(crate) fn from_fitted(
        network: N,
        loss: Box<dyn LossFunction>,
        config: ClassifierConfig,
        codec: LabelCodec,
        params: Vec<f32>,
    ) -> Self {
        Self {
            network: Arc::new(network),
            loss,
            optimizer: Box::new(LocalSearch::default()),
            config,
            callback: None,
            codec,
            fitted: Some(params),
        }
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    /// Replace the network with an equally shaped one, e.g. to change its backend.
    pub fn set_network(&mut self, network: Arc<N>) -> Result<()> {
        let (old, new) = (self.network.shape(), network.shape());
        if old != new {
            return Err(Error::Shape(format!(
                "network shape {new:?} does not match {old:?}"
            )));
        }
        self.network = network;
        Ok(())
    }

    pub fn loss(&self) -> &dyn LossFunction {
        self.loss.as_ref()
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn codec(&self) -> &LabelCodec {
        &self.codec
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    pub fn fitted_params(&self) -> Option<&[f32]> {
        self.fitted.as_deref()
    }

    fn params(&self) -> Result<&[f32]> {
        self.fitted.as_deref().ok_or(Error::NotFitted)
    }

    /// Fit from the default starting point.
    ///
    /// That is the previous parameters when `warm_start` is set and the model is
    /// fitted, otherwise `network.initial_params(config.seed)`.
    pub fn fit(&mut self, inputs: &Inputs, labels: &Labels) -> Result<FitReport> {
        self.fit_impl(inputs, labels, None)
    }

    /// Fit from an explicit starting point of length `num_params`.
    pub fn fit_from(
        &mut self,
        inputs: &Inputs,
        labels: &Labels,
        initial_point: &[f32],
    ) -> Result<FitReport> {
        self.fit_impl(inputs, labels, Some(initial_point))
    }

    fn fit_impl(
        &mut self,
        inputs: &Inputs,
        labels: &Labels,
        initial_point: Option<&[f32]>,
    ) -> Result<FitReport> {
        if labels.len() != inputs.len() {
            return Err(Error::Shape(format!(
                "{} labels for {} samples",
                labels.len(),
                inputs.len()
            )));
        }

        let mut codec = LabelCodec::new();
        let targets = codec.fit_encode(labels, self.network.output_dim(), self.config.one_hot)?;
        if let Some(encoding) = codec.encoding() {
            log::debug!("label encoding: {} (width {})", encoding.mode(), encoding.width());
        }

        if self.loss.name() == Loss::CrossEntropy.as_str()
            && self.network.output_kind() != OutputKind::Probabilities
        {
            log::warn!(
                "cross_entropy expects probability outputs; network outputs are not normalized"
            );
        }

        let warm = if self.config.warm_start {
            self.fitted.as_deref()
        } else {
            None
        };
        let initial = resolve_initial_point(
            self.network.as_ref(),
            initial_point,
            warm,
            self.config.seed,
        )?;

        let (params, report) =
            TrainingDriver::new(self.network.as_ref(), self.loss.as_ref(), self.optimizer.as_ref())
                .with_callback(self.callback.as_mut())
                .record_history(self.config.record_history)
                .run(inputs, &targets, &initial)?;

        self.codec = codec;
        self.fitted = Some(params);
        Ok(report)
    }

    /// Raw network outputs at the fitted parameters, flat `(n, output_dim)`.
    pub fn predict_outputs(&self, inputs: &Inputs) -> Result<Vec<f32>> {
        let params = self.params()?;
        self.network.forward(params, inputs)
    }

    /// Predicted labels, in the representation the model was fitted with.
    pub fn predict(&self, inputs: &Inputs) -> Result<Labels> {
        let outputs = self.predict_outputs(inputs)?;
        self.codec.decode(&outputs)
    }

    /// Accuracy of `predict(inputs)` against `labels`, in `[0, 1]`.
    ///
    /// One-hot matrix labels are first decoded into the fitted label space. The
    /// labels then go through the fitted mapping, so unseen categories fail with
    /// `UnknownCategory` instead of counting as misses.
    pub fn score(&self, inputs: &Inputs, labels: &Labels) -> Result<f32> {
        self.params()?;
        let truth = self.codec.decode_truth(labels)?;
        self.codec.encode(&truth)?;
        let predicted = self.predict(inputs)?;
        metrics::accuracy(&predicted, &truth)
    }
}
