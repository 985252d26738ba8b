use rosetta_sdk::Dtype;

use super::*;
use crate::container::file::ContainerFile;

#[test]
fn rejects_data_length_mismatch() {
    let builder = ContainerBuilder::new("transformer").tensor("bad", &[4], Dtype::F32, vec![0u8; 3]);
    assert!(matches!(builder.to_bytes(), Err(ContainerError::InvalidData(_))));
}

#[test]
fn scalar_tensors_round_trip() {
    let bytes = ContainerBuilder::new("transformer")
        .tensor_f32("scale", &[], &[0.5])
        .to_bytes()
        .unwrap();
    let container = ContainerFile::from_bytes(bytes).unwrap();
    let record = &container.records()[0];
    assert!(record.dims.is_empty());
    assert_eq!(record.num_elements(), 1);
    assert_eq!(container.tensor_bytes(record).unwrap(), 0.5f32.to_le_bytes());
}

#[test]
fn duplicate_names_are_writable() {
    // Rejecting duplicates is the loading model's job, not the writer's;
    // malformed producers must still be representable in tests.
    let bytes = ContainerBuilder::new("transformer")
        .tensor_f32("weight.A", &[1], &[1.0])
        .tensor_f32("weight.A", &[1], &[2.0])
        .to_bytes()
        .unwrap();
    let container = ContainerFile::from_bytes(bytes).unwrap();
    assert_eq!(container.records().len(), 2);
    assert_eq!(container.records()[0].name, container.records()[1].name);
}
