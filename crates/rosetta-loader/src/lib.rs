pub mod container;

pub use container::{
    CURRENT_BINARY_VERSION, ContainerBuilder, ContainerError, ContainerFile, ContainerHeader, TensorRecord,
};
