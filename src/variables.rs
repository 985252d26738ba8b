use rosetta_sdk::TensorStorage;
use rustc_hash::FxHashMap;

use crate::error::ModelError;

/// Owning name-to-tensor index, populated during streaming load and frozen
/// once the owning model finalizes. After that point it is only ever read,
/// which is what makes the Ready model safe to share without locking.
#[derive(Debug, Default)]
pub struct VariableIndex {
    variables: FxHashMap<String, TensorStorage>,
}

impl VariableIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a variable, rejecting a name that is already present. A clash
    /// signals a malformed or double-streamed container regardless of
    /// whether the contents match.
    pub fn insert(&mut self, name: String, storage: TensorStorage) -> Result<(), ModelError> {
        match self.variables.entry(name) {
            std::collections::hash_map::Entry::Occupied(entry) => {
                Err(ModelError::DuplicateVariable(entry.key().clone()))
            }
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(storage);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&TensorStorage> {
        self.variables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TensorStorage)> {
        self.variables.iter().map(|(name, storage)| (name.as_str(), storage))
    }
}

#[cfg(test)]
mod tests {
    use rosetta_sdk::{Device, Dtype};

    use super::*;

    fn storage(value: u8) -> TensorStorage {
        TensorStorage::from_bytes(vec![1], Dtype::U8, vec![value], Device::Cpu).unwrap()
    }

    #[test]
    fn inserts_and_looks_up() {
        let mut index = VariableIndex::new();
        index.insert("weight.A".to_string(), storage(1)).unwrap();
        assert!(index.contains("weight.A"));
        assert_eq!(index.get("weight.A").unwrap().data(), &[1]);
        assert!(index.get("weight.B").is_none());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn rejects_duplicates_with_identical_contents() {
        let mut index = VariableIndex::new();
        index.insert("weight.A".to_string(), storage(1)).unwrap();
        let err = index.insert("weight.A".to_string(), storage(1)).unwrap_err();
        assert!(matches!(err, ModelError::DuplicateVariable(name) if name == "weight.A"));
    }

    #[test]
    fn rejects_duplicates_with_different_contents() {
        let mut index = VariableIndex::new();
        index.insert("weight.A".to_string(), storage(1)).unwrap();
        let err = index.insert("weight.A".to_string(), storage(2)).unwrap_err();
        assert!(matches!(err, ModelError::DuplicateVariable(_)));
        // The first registration wins; the failed insert must not clobber it.
        assert_eq!(index.get("weight.A").unwrap().data(), &[1]);
    }
}
