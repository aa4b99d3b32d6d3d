use thiserror::Error;

/// Errors returned by the shape-checked API.
///
/// Every variant is raised before any state is mutated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("invalid shape: {0}")]
    InvalidShape(String),

    #[error("network is not compiled; call `compile` first")]
    NotCompiled,

    #[error("network is already compiled: {0}")]
    AlreadyCompiled(String),

    #[error("dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("invalid hyperparameter: {0}")]
    InvalidHyperparameter(String),

    #[error("epochs must be >= 1, got {0}")]
    InvalidEpochs(usize),

    #[error("batch size must be in 1..={len}, got {batch_size}")]
    InvalidBatchSize { batch_size: usize, len: usize },

    #[error("unsupported output layer: {0}")]
    UnsupportedOutput(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn dimension(what: &'static str, expected: usize, actual: usize) -> Self {
        Error::DimensionMismatch {
            what,
            expected,
            actual,
        }
    }
}
