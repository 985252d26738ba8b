use rosetta_sdk::{Device, TensorStorage};

use crate::{
    error::ModelError,
    graph::{Decoder, Encoder},
    variables::VariableIndex,
    vocabulary::Vocabulary,
    vocabulary_map::VocabularyMap,
};

/// State every concrete model owns: the device selection, the spec revision
/// of the container it was loaded from, both vocabularies, the vocabulary
/// map and the variable index.
///
/// Mutation is confined to the load window: the factory holds the only
/// `&mut` until `finalize()` succeeds, after which the model is published
/// behind a shared handle and never written again.
#[derive(Debug)]
pub struct ModelBase {
    device: Device,
    spec_revision: u32,
    source_vocabulary: Vocabulary,
    target_vocabulary: Vocabulary,
    vocabulary_map: VocabularyMap,
    variables: VariableIndex,
}

impl ModelBase {
    pub fn new(
        device: Device,
        spec_revision: u32,
        source_vocabulary: Vocabulary,
        target_vocabulary: Vocabulary,
        vocabulary_map: VocabularyMap,
    ) -> Self {
        Self {
            device,
            spec_revision,
            source_vocabulary,
            target_vocabulary,
            vocabulary_map,
            variables: VariableIndex::new(),
        }
    }

    /// Raw insertion into the variable index: the single path every
    /// registration takes, and the only place `DuplicateVariable` is raised.
    /// `register_variable` overrides transform names and storage, then
    /// delegate here; they never replace the insertion itself.
    pub fn insert_raw(&mut self, name: String, storage: TensorStorage) -> Result<(), ModelError> {
        self.variables.insert(name, storage)
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn spec_revision(&self) -> u32 {
        self.spec_revision
    }

    pub fn source_vocabulary(&self) -> &Vocabulary {
        &self.source_vocabulary
    }

    pub fn target_vocabulary(&self) -> &Vocabulary {
        &self.target_vocabulary
    }

    pub fn vocabulary_map(&self) -> &VocabularyMap {
        &self.vocabulary_map
    }

    pub fn variables(&self) -> &VariableIndex {
        &self.variables
    }
}

/// A loaded model: one concrete implementation per architecture family.
///
/// The factory drives the lifecycle — construct, stream every stored tensor
/// through `register_variable` in container order, `finalize()`, publish as
/// `Arc<dyn Model>`. From then on the model is logically read-only and all
/// methods are safe to call from any number of threads without locking.
pub trait Model: Send + Sync {
    fn base(&self) -> &ModelBase;
    fn base_mut(&mut self) -> &mut ModelBase;

    /// Highest spec revision this implementation fully interprets. Containers
    /// at older revisions are migrated on the fly by `register_variable`
    /// overrides; newer ones are rejected by the factory.
    fn current_spec_revision(&self) -> u32;

    /// Accept one stored tensor during streaming load. The default inserts
    /// under the stored name; architectures override to rename legacy names,
    /// split or merge sibling tensors, or reshape layouts, delegating each
    /// result to [`ModelBase::insert_raw`].
    fn register_variable(&mut self, name: String, storage: TensorStorage) -> Result<(), ModelError> {
        self.base_mut().insert_raw(name, storage)
    }

    /// Post-streaming consistency check, called exactly once after the last
    /// `register_variable`. Checks that need the complete tensor set belong
    /// here rather than in per-tensor registration.
    fn finalize(&mut self) -> Result<(), ModelError> {
        Ok(())
    }

    /// Build a fresh encoder graph over this model's weights. Graphs borrow
    /// the weights, never copy them, and are independent of each other:
    /// calling this from many threads on a Ready model is safe.
    fn make_encoder(&self) -> Result<Box<dyn Encoder + '_>, ModelError>;

    /// Build a fresh decoder graph. Same contract as [`Model::make_encoder`].
    fn make_decoder(&self) -> Result<Box<dyn Decoder + '_>, ModelError>;

    fn device(&self) -> Device {
        self.base().device()
    }

    /// Spec revision of the container this model was loaded from.
    fn spec_revision(&self) -> u32 {
        self.base().spec_revision()
    }

    fn source_vocabulary(&self) -> &Vocabulary {
        self.base().source_vocabulary()
    }

    fn target_vocabulary(&self) -> &Vocabulary {
        self.base().target_vocabulary()
    }

    fn vocabulary_map(&self) -> &VocabularyMap {
        self.base().vocabulary_map()
    }

    /// Non-failing lookup.
    fn get_variable_if_exists(&self, name: &str) -> Option<&TensorStorage> {
        self.base().variables().get(name)
    }

    /// Lookup for names the architecture contract guarantees. Failure here
    /// is a violated subtype contract, not a transient condition.
    fn get_variable(&self, name: &str) -> Result<&TensorStorage, ModelError> {
        self.get_variable_if_exists(name)
            .ok_or_else(|| ModelError::MissingVariable(name.to_string()))
    }
}

impl std::fmt::Debug for dyn Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model").field("base", self.base()).finish()
    }
}

#[cfg(test)]
mod tests {
    use rosetta_sdk::Dtype;

    use super::*;

    struct PlainModel {
        base: ModelBase,
    }

    impl PlainModel {
        fn new() -> Self {
            Self {
                base: ModelBase::new(Device::Cpu, 1, Vocabulary::default(), Vocabulary::default(), VocabularyMap::empty()),
            }
        }
    }

    impl Model for PlainModel {
        fn base(&self) -> &ModelBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut ModelBase {
            &mut self.base
        }

        fn current_spec_revision(&self) -> u32 {
            1
        }

        fn make_encoder(&self) -> Result<Box<dyn Encoder + '_>, ModelError> {
            Err(ModelError::IncompleteModel("test model has no graphs".to_string()))
        }

        fn make_decoder(&self) -> Result<Box<dyn Decoder + '_>, ModelError> {
            Err(ModelError::IncompleteModel("test model has no graphs".to_string()))
        }
    }

    fn storage() -> TensorStorage {
        TensorStorage::from_bytes(vec![1], Dtype::U8, vec![7], Device::Cpu).unwrap()
    }

    #[test]
    fn default_registration_inserts_under_the_stored_name() {
        let mut model = PlainModel::new();
        model.register_variable("weight.A".to_string(), storage()).unwrap();
        assert!(model.get_variable_if_exists("weight.A").is_some());
    }

    #[test]
    fn get_variable_agrees_with_get_variable_if_exists() {
        let mut model = PlainModel::new();
        model.register_variable("weight.A".to_string(), storage()).unwrap();

        assert!(model.get_variable("weight.A").is_ok());
        assert!(model.get_variable_if_exists("weight.B").is_none());
        let err = model.get_variable("weight.B").unwrap_err();
        assert!(matches!(err, ModelError::MissingVariable(name) if name == "weight.B"));
    }

    #[test]
    fn duplicate_registration_fails_through_the_default_path() {
        let mut model = PlainModel::new();
        model.register_variable("weight.A".to_string(), storage()).unwrap();
        let err = model.register_variable("weight.A".to_string(), storage()).unwrap_err();
        assert!(matches!(err, ModelError::DuplicateVariable(_)));
    }
}
