use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Memory mapping error: {0}")]
    MemoryMappingError(String),
    #[error("Not a model container (invalid magic)")]
    InvalidMagic,
    #[error("Container binary version {found} is newer than supported version {supported}")]
    UnsupportedBinaryVersion { found: u32, supported: u32 },
    #[error("Unknown tensor dtype code: {0}")]
    UnsupportedDtype(u32),
    #[error("Container truncated while reading {0}")]
    Truncated(&'static str),
    #[error("Invalid container data: {0}")]
    InvalidData(String),
    #[error("Tensor data out of bounds for '{name}': offset {offset} + {len} exceeds {available}")]
    TensorOutOfBounds {
        name: String,
        offset: usize,
        len: usize,
        available: usize,
    },
}
