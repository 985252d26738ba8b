use rosetta_loader::ContainerError;
use rosetta_sdk::{Dtype, TensorError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Container error: {0}")]
    Container(#[from] ContainerError),
    #[error("Tensor error: {0}")]
    Tensor(#[from] TensorError),
    #[error("Unknown architecture: '{0}'")]
    UnknownArchitecture(String),
    #[error("Variable '{0}' is already registered")]
    DuplicateVariable(String),
    #[error("Variable '{0}' is missing from the model")]
    MissingVariable(String),
    #[error("Model is incomplete after loading: {0}")]
    IncompleteModel(String),
    #[error("Spec revision {found} is newer than revision {supported} understood by architecture '{architecture}'")]
    UnsupportedSpecRevision {
        architecture: String,
        found: u32,
        supported: u32,
    },
    #[error("Variable '{name}' has shape {actual:?}, expected {expected}")]
    ShapeMismatch {
        name: String,
        expected: String,
        actual: Vec<usize>,
    },
    #[error("Unsupported dtype {dtype} for {operation}")]
    UnsupportedDtype { operation: &'static str, dtype: Dtype },
    #[error("Token id {id} is out of range for vocabulary of size {vocab_size}")]
    InvalidToken { id: u32, vocab_size: usize },
}
