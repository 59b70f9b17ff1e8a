//! Neural-network regressor.
//!
//! Shares the objective, driver and persistence machinery with the classifier but
//! fits raw numeric targets, so it has no label codec.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::train::{TrainingDriver, resolve_initial_point};
use crate::{
    Callback, Error, FitReport, Inputs, LocalSearch, Loss, LossFunction, Network, Optimizer,
    Result, Targets, metrics,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegressorConfig {
    pub warm_start: bool,
    pub seed: u64,
    pub record_history: bool,
}

/// Least-loss fit of a [`Network`] to numeric targets of width `output_dim`.
pub struct NeuralNetworkRegressor<N: Network> {
    network: Arc<N>,
    loss: Box<dyn LossFunction>,
    optimizer: Box<dyn Optimizer>,
    config: RegressorConfig,
    callback: Option<Callback>,
    fitted: Option<Vec<f32>>,
}

impl<N: Network> fmt::Debug for NeuralNetworkRegressor<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NeuralNetworkRegressor")
            .field("network", &self.network.shape())
            .field("loss", &self.loss.name())
            .field("config", &self.config)
            .field("fitted", &self.fitted.as_ref().map(Vec::len))
            .finish_non_exhaustive()
    }
}

impl<N: Network> NeuralNetworkRegressor<N> {
    pub fn new(network: N) -> Self {
        Self {
            network: Arc::new(network),
            loss: Box::new(Loss::SquaredError),
            optimizer: Box::new(LocalSearch::default()),
            config: RegressorConfig::default(),
            callback: None,
            fitted: None,
        }
    }

    pub fn with_loss<L: LossFunction + 'static>(mut self, loss: L) -> Self {
        self.loss = Box::new(loss);
        self
    }

    pub fn with_optimizer<O: Optimizer + 'static>(mut self, optimizer: O) -> Self {
        self.optimizer = Box::new(optimizer);
        self
    }

    pub fn with_config(mut self, config: RegressorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_callback<F: FnMut(&[f32], f32) + 'static>(mut self, callback: F) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    pub(crate) fn from_fitted(
        network: N,
        loss: Box<dyn LossFunction>,
        config: RegressorConfig,
        params: Vec<f32>,
    ) -> Self {
        Self {
            fitted: Some(params),
            loss,
            config,
            ..Self::new(network)
        }
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn set_network(&mut self, network: Arc<N>) -> Result<()> {
        if network.shape() != self.network.shape() {
            return Err(Error::Shape(format!(
                "network shape {:?} does not match {:?}",
                network.shape(),
                self.network.shape()
            )));
        }
        self.network = network;
        Ok(())
    }

    pub fn loss(&self) -> &dyn LossFunction {
        self.loss.as_ref()
    }

    pub fn config(&self) -> &RegressorConfig {
        &self.config
    }

    pub fn fitted_params(&self) -> Option<&[f32]> {
        self.fitted.as_deref()
    }

    pub fn fit(&mut self, inputs: &Inputs, targets: &Targets) -> Result<FitReport> {
        let warm = if self.config.warm_start {
            self.fitted.as_deref()
        } else {
            None
        };
        let initial = resolve_initial_point(self.network.as_ref(), None, warm, self.config.seed)?;

        let (params, report) =
            TrainingDriver::new(self.network.as_ref(), self.loss.as_ref(), self.optimizer.as_ref())
                .with_callback(self.callback.as_mut())
                .record_history(self.config.record_history)
                .run(inputs, targets, &initial)?;

        self.fitted = Some(params);
        Ok(report)
    }

    /// Network outputs at the fitted parameters, flat `(n, output_dim)`.
    pub fn predict(&self, inputs: &Inputs) -> Result<Vec<f32>> {
        let params = self.fitted.as_deref().ok_or(Error::NotFitted)?;
        self.network.forward(params, inputs)
    }

    /// Coefficient of determination of the predictions.
    pub fn score(&self, inputs: &Inputs, targets: &Targets) -> Result<f32> {
        let predicted = self.predict(inputs)?;
        let width = self.network.output_dim();
        let mut truth = Vec::with_capacity(targets.len() * width);
        let mut row = vec![0.0_f32; targets.width()];
        for idx in 0..targets.len() {
            truth.extend_from_slice(targets.row(idx, &mut row));
        }
        metrics::r2_score(&predicted, &truth, width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{Activation, MlpBuilder};

    #[test]
    fn fits_a_linear_target() {
        let mlp = MlpBuilder::new(1)
            .unwrap()
            .add_layer(1, Activation::Identity)
            .unwrap()
            .build()
            .unwrap();
        let inputs = Inputs::from_rows(&[vec![-1.0], vec![0.0], vec![1.0], vec![2.0]]).unwrap();
        let targets = Targets::dense(vec![-1.0, 1.0, 3.0, 5.0], 1).unwrap();

        let mut reg =
            NeuralNetworkRegressor::new(mlp).with_optimizer(LocalSearch::with_maxiter(1000));
        reg.fit(&inputs, &targets).unwrap();
        assert!(reg.score(&inputs, &targets).unwrap() > 0.99);
    }

    #[test]
    fn predict_before_fit_is_not_fitted() {
        let mlp = MlpBuilder::new(1)
            .unwrap()
            .add_layer(1, Activation::Identity)
            .unwrap()
            .build()
            .unwrap();
        let reg = NeuralNetworkRegressor::new(mlp);
        let inputs = Inputs::from_rows(&[vec![0.0]]).unwrap();
        assert_eq!(reg.predict(&inputs).unwrap_err(), Error::NotFitted);
    }
}
