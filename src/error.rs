use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Label, target or parameter width does not match the network.
    #[error("shape mismatch: {0}")]
    Shape(String),
    /// A label that was not seen when the category mapping was fixed.
    #[error("unknown category {0:?}")]
    UnknownCategory(String),
    #[error("model is not fitted; call `fit` first")]
    NotFitted,
    #[error("training failed: {0}")]
    TrainingFailed(String),
    /// A persisted record carries a different model kind than the loader expects.
    #[error("type mismatch: expected model kind {expected:?}, found {found:?}")]
    TypeMismatch { expected: String, found: String },
    #[error("unsupported label format: {0}")]
    UnsupportedLabelFormat(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("io error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, Error>;
