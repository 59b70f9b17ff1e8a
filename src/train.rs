//! Training driver.
//!
//! Wires a [`NetworkObjective`] into an [`Optimizer`] and validates what comes back.
//! The driver never touches model state: it returns the optimal parameters and the
//! caller decides whether to commit them.

use crate::{
    Callback, Error, Inputs, LossFunction, Network, NetworkObjective, Optimizer, Result, Targets,
    TrainingHistory,
};

#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    /// Objective value at the returned parameters.
    pub final_loss: f32,
    pub evaluations: usize,
    pub iterations: usize,
    /// Present when history recording was requested.
    pub history: Option<TrainingHistory>,
}

/// Pick the starting point of a fit.
///
/// Precedence: `explicit`, then `warm` (previously fitted parameters), then the
/// network's seeded initializer.
pub fn resolve_initial_point<N: Network + ?Sized>(
    network: &N,
    explicit: Option<&[f32]>,
    warm: Option<&[f32]>,
    seed: u64,
) -> Result<Vec<f32>> {
    let point = match explicit.or(warm) {
        Some(p) => p.to_vec(),
        None => network.initial_params(seed),
    };
    if point.len() != network.num_params() {
        return Err(Error::Shape(format!(
            "initial point len {} does not match network num_params {}",
            point.len(),
            network.num_params()
        )));
    }
    if point.iter().any(|v| !v.is_finite()) {
        return Err(Error::InvalidData(
            "initial point must contain only finite values".to_owned(),
        ));
    }
    Ok(point)
}

pub struct TrainingDriver<'a, N: Network + ?Sized> {
    network: &'a N,
    loss: &'a dyn LossFunction,
    optimizer: &'a dyn Optimizer,
    callback: Option<&'a mut Callback>,
    record_history: bool,
}

impl<'a, N: Network + ?Sized> TrainingDriver<'a, N> {
    pub fn new(network: &'a N, loss: &'a dyn LossFunction, optimizer: &'a dyn Optimizer) -> Self {
        Self {
            network,
            loss,
            optimizer,
            callback: None,
            record_history: false,
        }
    }

    pub fn with_callback(mut self, callback: Option<&'a mut Callback>) -> Self {
        self.callback = callback;
        self
    }

    pub fn record_history(mut self, record: bool) -> Self {
        self.record_history = record;
        self
    }

    /// Minimize the mean loss from `initial_point`.
    ///
    /// Returns the optimal parameters together with a [`FitReport`]. Every failure
    /// inside the optimizer surfaces as an error and nothing is returned.
    pub fn run(
        self,
        inputs: &Inputs,
        targets: &Targets,
        initial_point: &[f32],
    ) -> Result<(Vec<f32>, FitReport)> {
        if !self.loss.is_evaluable() {
            return Err(Error::InvalidConfig(format!(
                "loss {:?} is only known by name; set a loss with `with_loss` before fitting",
                self.loss.name()
            )));
        }
        let num_params = self.network.num_params();
        if initial_point.len() != num_params {
            return Err(Error::Shape(format!(
                "initial point len {} does not match network num_params {num_params}",
                initial_point.len()
            )));
        }

        log::debug!(
            "training on {} samples: {num_params} params, target width {}{}",
            inputs.len(),
            targets.width(),
            if targets.is_sparse() { " (sparse)" } else { "" }
        );

        let mut objective = NetworkObjective::new(self.network, inputs, targets, self.loss)?
            .with_callback(self.callback)
            .record_history(self.record_history);

        let result = self.optimizer.minimize(&mut objective, initial_point)?;

        if result.params.len() != num_params {
            return Err(Error::TrainingFailed(format!(
                "optimizer returned {} params, expected {num_params}",
                result.params.len()
            )));
        }
        if result.params.iter().any(|v| !v.is_finite()) || !result.value.is_finite() {
            return Err(Error::TrainingFailed(
                "optimizer returned a non-finite point".to_owned(),
            ));
        }

        log::info!(
            "training finished: loss={} after {} evaluations ({} iterations)",
            result.value,
            objective.evaluations(),
            result.iterations
        );

        let report = FitReport {
            final_loss: result.value,
            evaluations: objective.evaluations(),
            iterations: result.iterations,
            history: objective.take_history(),
        };
        Ok((result.params, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{Activation, LocalSearch, Loss, MlpBuilder, OptimizerResult, Objective};

    fn setup() -> (crate::Mlp, Inputs, Targets) {
        let mlp = MlpBuilder::new(1)
            .unwrap()
            .add_layer(1, Activation::Identity)
            .unwrap()
            .build()
            .unwrap();
        let inputs = Inputs::from_rows(&[vec![0.0], vec![1.0], vec![2.0]]).unwrap();
        let targets = Targets::dense(vec![1.0, 3.0, 5.0], 1).unwrap();
        (mlp, inputs, targets)
    }

    #[test]
    fn fits_a_line_with_local_search() {
        let (mlp, inputs, targets) = setup();
        let opt = LocalSearch::with_maxiter(1000);
        let (params, report) = TrainingDriver::new(&mlp, &Loss::SquaredError, &opt)
            .record_history(true)
            .run(&inputs, &targets, &[0.0, 0.0])
            .unwrap();

        assert!((params[0] - 2.0).abs() < 1e-2, "{params:?}");
        assert!((params[1] - 1.0).abs() < 1e-2, "{params:?}");
        assert!(report.final_loss < 1e-3);
        let history = report.history.unwrap();
        assert_eq!(history.len(), report.evaluations);
        assert!(history.params.iter().all(|p| p.len() == 2));
    }

    #[test]
    fn initial_point_precedence() {
        let (mlp, _, _) = setup();
        let explicit = [1.0_f32, 2.0];
        let warm = [3.0_f32, 4.0];
        assert_eq!(
            resolve_initial_point(&mlp, Some(&explicit), Some(&warm), 0).unwrap(),
            explicit
        );
        assert_eq!(resolve_initial_point(&mlp, None, Some(&warm), 0).unwrap(), warm);
        assert_eq!(
            resolve_initial_point(&mlp, None, None, 7).unwrap(),
            mlp.initial_params(7)
        );
        assert!(matches!(
            resolve_initial_point(&mlp, Some(&[0.0]), None, 0),
            Err(Error::Shape(_))
        ));
    }

    #[test]
    fn rejects_optimizer_returning_wrong_length() {
        struct Truncating;
        impl Optimizer for Truncating {
            fn minimize(
                &self,
                objective: &mut dyn Objective,
                x0: &[f32],
            ) -> Result<OptimizerResult> {
                let value = objective.value(x0)?;
                Ok(OptimizerResult {
                    params: x0[..1].to_vec(),
                    value,
                    evaluations: 1,
                    iterations: 1,
                })
            }
        }

        let (mlp, inputs, targets) = setup();
        let err = TrainingDriver::new(&mlp, &Loss::SquaredError, &Truncating)
            .run(&inputs, &targets, &[0.0, 0.0])
            .unwrap_err();
        assert!(matches!(err, Error::TrainingFailed(_)));
    }
}
