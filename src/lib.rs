//! Model-loading and weight-ownership core for a sequence-to-sequence
//! inference runtime.
//!
//! [`ModelFactory::load`] deserializes a versioned binary container of named
//! tensors into a concrete [`Model`] bound to a [`Device`], then publishes it
//! as one shared, immutable handle. Any number of threads may then
//! manufacture independent [`Encoder`]/[`Decoder`] graphs from that handle;
//! graphs borrow the weights, so no tensor bytes are ever duplicated per
//! graph. The set of architectures is open: [`register_architecture`] adds
//! new tags without touching the factory.

pub mod error;
pub mod factory;
pub mod graph;
pub mod migration;
pub mod model;
pub mod transformer;
pub mod variables;
pub mod vocabulary;
pub mod vocabulary_map;

pub use error::ModelError;
pub use factory::{ModelConstructor, ModelFactory, ModelSeed, register_architecture};
pub use graph::{Decoder, Encoder};
pub use model::{Model, ModelBase};
pub use variables::VariableIndex;
pub use vocabulary::Vocabulary;
pub use vocabulary_map::VocabularyMap;

pub use rosetta_loader::{CURRENT_BINARY_VERSION, ContainerBuilder, ContainerError, ContainerFile, TensorRecord};
pub use rosetta_sdk::{Device, Dtype, TensorStorage};
