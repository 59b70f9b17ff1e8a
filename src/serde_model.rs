//! Model serialization/deserialization.
//!
//! Models are written as one self-describing JSON record:
//!
//! ```text
//! { kind, format_version, network, shape, loss, config, codec?, params }
//! ```
//!
//! Design notes:
//! - The `kind` tag is checked on the raw JSON before anything else is decoded, so a
//!   record of another model kind fails with `TypeMismatch`.
//! - Network internals are not serialized directly; each network type persists a
//!   stable architecture description (`PersistentNetwork::Architecture`).
//! - The execution backend is not part of the record.
//! - Deserialization validates the shape descriptor, the parameter count and that
//!   all parameters are finite.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{
    Activation, ClassifierConfig, Error, LabelCodec, LabelEncoding, Loss, LossFunction, Mlp,
    MlpBuilder, NamedLoss, Network, NetworkShape, NeuralNetworkClassifier,
    NeuralNetworkRegressor, PersistentNetwork, RegressorConfig, Result,
};

pub const MODEL_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord<A, C> {
    pub kind: String,
    pub format_version: u32,
    pub network: A,
    pub shape: NetworkShape,
    pub loss: String,
    pub config: C,
    /// Label encoding; classifiers only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec: Option<LabelEncoding>,
    pub params: Vec<f32>,
}

/// A fitted model that can be written to and read back from a JSON record.
pub trait SerializableModel: Sized {
    /// Type tag stored in every record.
    const KIND: &'static str;

    type Architecture: Serialize + DeserializeOwned;
    type Config: Serialize + DeserializeOwned;

    /// Fails with `NotFitted` when there are no parameters to persist.
    fn to_record(&self) -> Result<ModelRecord<Self::Architecture, Self::Config>>;

    fn from_record(record: ModelRecord<Self::Architecture, Self::Config>) -> Result<Self>;

    /// Serialize the model to a pretty-printed JSON string.
    fn to_json_string(&self) -> Result<String> {
        let record = self.to_record()?;
        serde_json::to_string_pretty(&record)
            .map_err(|e| Error::InvalidData(format!("failed to serialize model: {e}")))
    }

    /// Parse a model from a JSON string.
    fn from_json_str(s: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(s)
            .map_err(|e| Error::InvalidData(format!("failed to parse model json: {e}")))?;

        let found = value
            .get("kind")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| Error::InvalidData("model record has no `kind` tag".to_owned()))?;
        if found != Self::KIND {
            return Err(Error::TypeMismatch {
                expected: Self::KIND.to_owned(),
                found: found.to_owned(),
            });
        }

        let version = value.get("format_version").and_then(serde_json::Value::as_u64);
        if version != Some(u64::from(MODEL_FORMAT_VERSION)) {
            return Err(Error::InvalidData(format!(
                "unsupported model format_version {version:?}; expected {MODEL_FORMAT_VERSION}"
            )));
        }

        let record = serde_json::from_value(value)
            .map_err(|e| Error::InvalidData(format!("invalid model record: {e}")))?;
        Self::from_record(record)
    }

    /// Save the model to a JSON file.
    fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let s = self.to_json_string()?;
        let p = path.as_ref();
        log::debug!("saving {} to {}", Self::KIND, p.display());
        std::fs::write(p, s)
            .map_err(|e| Error::Io(format!("failed to write {}: {e}", p.display())))
    }

    /// Load a model from a JSON file.
    fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let p = path.as_ref();
        log::debug!("loading {} from {}", Self::KIND, p.display());
        let s = std::fs::read_to_string(p)
            .map_err(|e| Error::Io(format!("failed to read {}: {e}", p.display())))?;
        Self::from_json_str(&s)
    }
}

/// Rebuild the network of a record and check its parameters against it.
fn restore_network<N: PersistentNetwork>(
    architecture: N::Architecture,
    shape: NetworkShape,
    params: &[f32],
) -> Result<N> {
    let network = N::from_architecture(architecture)?;
    if network.shape() != shape {
        return Err(Error::InvalidData(format!(
            "network shape {:?} does not match recorded shape {shape:?}",
            network.shape()
        )));
    }
    if params.len() != network.num_params() {
        return Err(Error::InvalidData(format!(
            "params length {} does not match network num_params {}",
            params.len(),
            network.num_params()
        )));
    }
    if params.iter().any(|v| !v.is_finite()) {
        return Err(Error::InvalidData(
            "params must contain only finite values".to_owned(),
        ));
    }
    Ok(network)
}

// Custom losses come back by name only; the model predicts but needs `with_loss` to refit.
fn restore_loss(name: &str) -> Box<dyn LossFunction> {
    match name.parse::<Loss>() {
        Ok(loss) => Box::new(loss),
        Err(_) => {
            log::debug!("loss {name:?} is not built in; restoring it by name");
            Box::new(NamedLoss::new(name))
        }
    }
}

impl<N: PersistentNetwork> SerializableModel for NeuralNetworkClassifier<N> {
    const KIND: &'static str = "neural_network_classifier";

    type Architecture = N::Architecture;
    type Config = ClassifierConfig;

    fn to_record(&self) -> Result<ModelRecord<N::Architecture, ClassifierConfig>> {
        let params = self.fitted_params().ok_or(Error::NotFitted)?;
        let codec = self.codec().encoding().ok_or(Error::NotFitted)?;
        Ok(ModelRecord {
            kind: Self::KIND.to_owned(),
            format_version: MODEL_FORMAT_VERSION,
            network: self.network().architecture(),
            shape: self.network().shape(),
            loss: self.loss().name().to_owned(),
            config: *self.config(),
            codec: Some(codec.clone()),
            params: params.to_vec(),
        })
    }

    fn from_record(record: ModelRecord<N::Architecture, ClassifierConfig>) -> Result<Self> {
        let network: N = restore_network(record.network, record.shape, &record.params)?;
        let loss = restore_loss(&record.loss);
        let encoding = record.codec.ok_or_else(|| {
            Error::InvalidData("classifier record has no label encoding".to_owned())
        })?;
        if encoding.width() != network.output_dim() {
            return Err(Error::InvalidData(format!(
                "label encoding width {} does not match network output_dim {}",
                encoding.width(),
                network.output_dim()
            )));
        }

        Ok(NeuralNetworkClassifier::from_fitted(
            network,
            loss,
            record.config,
            LabelCodec::from_encoding(encoding),
            record.params,
        ))
    }
}

impl<N: PersistentNetwork> SerializableModel for NeuralNetworkRegressor<N> {
    const KIND: &'static str = "neural_network_regressor";

    type Architecture = N::Architecture;
    type Config = RegressorConfig;

    fn to_record(&self) -> Result<ModelRecord<N::Architecture, RegressorConfig>> {
        let params = self.fitted_params().ok_or(Error::NotFitted)?;
        Ok(ModelRecord {
            kind: Self::KIND.to_owned(),
            format_version: MODEL_FORMAT_VERSION,
            network: self.network().architecture(),
            shape: self.network().shape(),
            loss: self.loss().name().to_owned(),
            config: *self.config(),
            codec: None,
            params: params.to_vec(),
        })
    }

    fn from_record(record: ModelRecord<N::Architecture, RegressorConfig>) -> Result<Self> {
        let network: N = restore_network(record.network, record.shape, &record.params)?;
        let loss = restore_loss(&record.loss);
        Ok(NeuralNetworkRegressor::from_fitted(
            network,
            loss,
            record.config,
            record.params,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedMlp {
    pub input_dim: usize,
    pub layers: Vec<SerializedLayer>,
    #[serde(default)]
    pub softmax_output: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedLayer {
    pub out_dim: usize,
    pub activation: SerializedActivation,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SerializedActivation {
    Tanh,
    Relu,
    LeakyRelu { alpha: f32 },
    Sigmoid,
    Identity,
}

impl From<Activation> for SerializedActivation {
    fn from(value: Activation) -> Self {
        match value {
            Activation::Tanh => SerializedActivation::Tanh,
            Activation::ReLU => SerializedActivation::Relu,
            Activation::LeakyReLU { alpha } => SerializedActivation::LeakyRelu { alpha },
            Activation::Sigmoid => SerializedActivation::Sigmoid,
            Activation::Identity => SerializedActivation::Identity,
        }
    }
}

impl SerializedActivation {
    fn into_activation(self) -> Activation {
        match self {
            SerializedActivation::Tanh => Activation::Tanh,
            SerializedActivation::Relu => Activation::ReLU,
            SerializedActivation::LeakyRelu { alpha } => Activation::LeakyReLU { alpha },
            SerializedActivation::Sigmoid => Activation::Sigmoid,
            SerializedActivation::Identity => Activation::Identity,
        }
    }
}

impl PersistentNetwork for Mlp {
    type Architecture = SerializedMlp;

    fn architecture(&self) -> SerializedMlp {
        let layers = (0..self.num_layers())
            .filter_map(|i| self.layer(i))
            .map(|layer| SerializedLayer {
                out_dim: layer.out_dim(),
                activation: layer.activation().into(),
            })
            .collect();
        SerializedMlp {
            input_dim: self.input_dim(),
            layers,
            softmax_output: self.softmax_output(),
        }
    }

    fn from_architecture(architecture: SerializedMlp) -> Result<Self> {
        let invalid = |e: Error| Error::InvalidData(format!("invalid network architecture: {e}"));

        let mut builder = MlpBuilder::new(architecture.input_dim).map_err(invalid)?;
        for layer in architecture.layers {
            builder = builder
                .add_layer(layer.out_dim, layer.activation.into_activation())
                .map_err(invalid)?;
        }
        if architecture.softmax_output {
            builder = builder.softmax_output();
        }
        builder.build().map_err(invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{Inputs, Labels, LocalSearch};

    fn mlp() -> Mlp {
        MlpBuilder::new(2)
            .unwrap()
            .add_layer(3, Activation::LeakyReLU { alpha: 0.1 })
            .unwrap()
            .add_layer(2, Activation::Identity)
            .unwrap()
            .softmax_output()
            .build()
            .unwrap()
    }

    fn fitted() -> (NeuralNetworkClassifier<Mlp>, Inputs) {
        let inputs = Inputs::from_rows(&[vec![0.0, 0.1], vec![1.0, 0.9], vec![0.1, 0.0]]).unwrap();
        let labels = Labels::categorical(&["no", "yes", "no"]);
        let mut clf = NeuralNetworkClassifier::new(mlp())
            .with_loss(Loss::CrossEntropy)
            .with_optimizer(LocalSearch::with_maxiter(5));
        clf.fit(&inputs, &labels).unwrap();
        (clf, inputs)
    }

    #[test]
    fn architecture_roundtrips() {
        let net = mlp();
        let rebuilt = Mlp::from_architecture(net.architecture()).unwrap();
        assert_eq!(rebuilt, net);
    }

    #[test]
    fn classifier_json_roundtrip_is_exact() {
        let (clf, inputs) = fitted();
        let json = clf.to_json_string().unwrap();
        let loaded = NeuralNetworkClassifier::<Mlp>::from_json_str(&json).unwrap();

        assert_eq!(loaded.fitted_params(), clf.fitted_params());
        assert_eq!(loaded.codec(), clf.codec());
        assert_eq!(loaded.loss().name(), "cross_entropy");
        assert_eq!(
            loaded.predict_outputs(&inputs).unwrap(),
            clf.predict_outputs(&inputs).unwrap()
        );
    }

    #[test]
    fn kind_is_checked_before_payload() {
        let (clf, _) = fitted();
        let json = clf.to_json_string().unwrap();
        let err = NeuralNetworkRegressor::<Mlp>::from_json_str(&json).unwrap_err();
        assert_eq!(
            err,
            Error::TypeMismatch {
                expected: "neural_network_regressor".to_owned(),
                found: "neural_network_classifier".to_owned(),
            }
        );
    }

    #[test]
    fn rejects_unknown_version() {
        let bad = r#"{"kind":"neural_network_classifier","format_version":999}"#;
        let err = NeuralNetworkClassifier::<Mlp>::from_json_str(bad).unwrap_err();
        assert!(format!("{err}").contains("format_version"));
    }

    #[test]
    fn rejects_param_count_mismatch() {
        let (clf, _) = fitted();
        let mut record = clf.to_record().unwrap();
        record.params.pop();
        let err = NeuralNetworkClassifier::<Mlp>::from_record(record).unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
    }

    #[test]
    fn custom_loss_names_load_but_block_refit() {
        let (clf, inputs) = fitted();
        let mut record = clf.to_record().unwrap();
        record.loss = "hinge".to_owned();
        let mut loaded = NeuralNetworkClassifier::<Mlp>::from_record(record).unwrap();

        assert_eq!(loaded.loss().name(), "hinge");
        assert_eq!(loaded.predict(&inputs).unwrap(), clf.predict(&inputs).unwrap());
        assert_eq!(loaded.to_record().unwrap().loss, "hinge");

        let labels = Labels::categorical(&["no", "yes", "no"]);
        let before = loaded.fitted_params().unwrap().to_vec();
        let err = loaded.fit(&inputs, &labels).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)), "{err:?}");
        assert_eq!(loaded.fitted_params().unwrap(), before.as_slice());

        let mut loaded = loaded.with_loss(Loss::CrossEntropy);
        assert!(loaded.fit(&inputs, &labels).is_ok());
    }

    #[test]
    fn unfitted_model_cannot_be_saved() {
        let clf = NeuralNetworkClassifier::new(mlp());
        assert_eq!(clf.to_json_string().unwrap_err(), Error::NotFitted);
    }
}
