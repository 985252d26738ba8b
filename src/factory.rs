use std::{
    path::Path,
    sync::{Arc, OnceLock},
};

use parking_lot::RwLock;
use rosetta_loader::ContainerFile;
use rosetta_sdk::{Device, TensorStorage};
use rustc_hash::FxHashMap;

use crate::{
    error::ModelError,
    model::{Model, ModelBase},
    transformer,
    vocabulary::Vocabulary,
    vocabulary_map::VocabularyMap,
};

/// Everything a concrete model needs before tensor streaming starts.
pub struct ModelSeed {
    pub device: Device,
    pub spec_revision: u32,
    pub source_vocabulary: Vocabulary,
    pub target_vocabulary: Vocabulary,
    pub vocabulary_map: VocabularyMap,
}

impl ModelSeed {
    pub fn into_base(self) -> ModelBase {
        ModelBase::new(
            self.device,
            self.spec_revision,
            self.source_vocabulary,
            self.target_vocabulary,
            self.vocabulary_map,
        )
    }
}

/// Builds an empty concrete model for one architecture tag.
pub type ModelConstructor = fn(ModelSeed) -> Box<dyn Model>;

fn registry() -> &'static RwLock<FxHashMap<String, ModelConstructor>> {
    static REGISTRY: OnceLock<RwLock<FxHashMap<String, ModelConstructor>>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut entries: FxHashMap<String, ModelConstructor> = FxHashMap::default();
        for tag in transformer::ARCHITECTURE_TAGS {
            entries.insert((*tag).to_string(), transformer::constructor);
        }
        RwLock::new(entries)
    })
}

/// Register a concrete architecture under `tag`. Built-in tags are seeded at
/// first use; registering an existing tag replaces its constructor, so
/// embedders can shadow built-ins. Registration is cheap and may happen at
/// any point before the first `load` of that tag.
pub fn register_architecture(tag: &str, constructor: ModelConstructor) {
    registry().write().insert(tag.to_string(), constructor);
    tracing::debug!(tag, "Registered model architecture");
}

pub fn architecture_is_registered(tag: &str) -> bool {
    registry().read().contains_key(tag)
}

fn lookup_architecture(tag: &str) -> Option<ModelConstructor> {
    registry().read().get(tag).copied()
}

/// Loads models from container files.
///
/// One load produces one shared handle; callers needing N independent
/// execution graphs call `make_encoder`/`make_decoder` N times on that
/// handle rather than loading N times.
pub struct ModelFactory;

impl ModelFactory {
    /// Load the container at `path` and return the Ready model bound to
    /// `device`. Any fault — layout version, unknown architecture, duplicate
    /// or missing variables — aborts the whole load; no partially-loaded
    /// model is ever returned.
    pub fn load<P: AsRef<Path>>(path: P, device: Device) -> Result<Arc<dyn Model>, ModelError> {
        let container = ContainerFile::open(path)?;
        Self::from_container(&container, device)
    }

    /// Load from an already-opened container. The architecture is resolved
    /// before any tensor record is materialized.
    pub fn from_container(container: &ContainerFile, device: Device) -> Result<Arc<dyn Model>, ModelError> {
        let architecture = container.architecture();
        let Some(constructor) = lookup_architecture(architecture) else {
            return Err(ModelError::UnknownArchitecture(architecture.to_string()));
        };

        let seed = ModelSeed {
            device,
            spec_revision: container.spec_revision(),
            source_vocabulary: Vocabulary::new(container.source_vocabulary().to_vec()),
            target_vocabulary: Vocabulary::new(container.target_vocabulary().to_vec()),
            vocabulary_map: VocabularyMap::new(container.vocabulary_map().iter().cloned()),
        };
        let mut model = constructor(seed);

        if container.spec_revision() > model.current_spec_revision() {
            return Err(ModelError::UnsupportedSpecRevision {
                architecture: architecture.to_string(),
                found: container.spec_revision(),
                supported: model.current_spec_revision(),
            });
        }

        for record in container.records() {
            let bytes = container.tensor_bytes(record)?;
            let storage = TensorStorage::from_bytes(record.dims.clone(), record.dtype, bytes.to_vec(), Device::Cpu)?
                .to_device(device);
            tracing::trace!(name = record.name.as_str(), dtype = %record.dtype, "Registering variable");
            model.register_variable(record.name.clone(), storage)?;
        }

        model.finalize()?;
        tracing::debug!(
            architecture,
            spec_revision = container.spec_revision(),
            variables = model.base().variables().len(),
            device = %device,
            "Model ready"
        );
        Ok(Arc::from(model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn null_constructor(seed: ModelSeed) -> Box<dyn Model> {
        struct Null {
            base: ModelBase,
        }
        impl Model for Null {
            fn base(&self) -> &ModelBase {
                &self.base
            }
            fn base_mut(&mut self) -> &mut ModelBase {
                &mut self.base
            }
            fn current_spec_revision(&self) -> u32 {
                1
            }
            fn make_encoder(&self) -> Result<Box<dyn crate::Encoder + '_>, ModelError> {
                Err(ModelError::IncompleteModel("null".to_string()))
            }
            fn make_decoder(&self) -> Result<Box<dyn crate::Decoder + '_>, ModelError> {
                Err(ModelError::IncompleteModel("null".to_string()))
            }
        }
        Box::new(Null { base: seed.into_base() })
    }

    #[test]
    fn built_in_architectures_are_seeded() {
        for tag in transformer::ARCHITECTURE_TAGS {
            assert!(architecture_is_registered(tag));
        }
        assert!(!architecture_is_registered("cnn"));
    }

    #[test]
    fn registration_is_open() {
        assert!(!architecture_is_registered("null-arch"));
        register_architecture("null-arch", null_constructor);
        assert!(architecture_is_registered("null-arch"));
    }
}
