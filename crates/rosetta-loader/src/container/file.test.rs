use rosetta_sdk::Dtype;

use super::*;
use crate::container::writer::ContainerBuilder;

fn sample_builder() -> ContainerBuilder {
    ContainerBuilder::new("transformer")
        .spec_revision(2)
        .source_vocabulary(["<s>", "</s>", "hello"])
        .target_vocabulary(["<s>", "</s>", "bonjour", "salut"])
        .vocabulary_map(vec![("hello".to_string(), vec![2, 3])])
        .tensor_f32("weight.A", &[2, 2], &[1.0, 2.0, 3.0, 4.0])
        .tensor("weight.B", &[3], Dtype::I8, vec![1, 2, 3])
}

#[test]
fn parses_header_and_sections() {
    let container = ContainerFile::from_bytes(sample_builder().to_bytes().unwrap()).unwrap();
    assert_eq!(container.binary_version(), 2);
    assert_eq!(container.architecture(), "transformer");
    assert_eq!(container.spec_revision(), 2);
    assert_eq!(container.source_vocabulary().len(), 3);
    assert_eq!(container.target_vocabulary().len(), 4);
    assert_eq!(container.vocabulary_map(), &[("hello".to_string(), vec![2, 3])]);
    assert_eq!(container.records().len(), 2);
}

#[test]
fn records_preserve_container_order_and_data() {
    let container = ContainerFile::from_bytes(sample_builder().to_bytes().unwrap()).unwrap();
    let records = container.records();
    assert_eq!(records[0].name, "weight.A");
    assert_eq!(records[0].dims, vec![2, 2]);
    assert_eq!(records[0].dtype, Dtype::F32);
    assert_eq!(records[1].name, "weight.B");

    let bytes = container.tensor_bytes(&records[1]).unwrap();
    assert_eq!(bytes, &[1, 2, 3]);
    let bytes = container.tensor_bytes(&records[0]).unwrap();
    assert_eq!(bytes.len(), 16);
    assert_eq!(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]), 1.0);
}

#[test]
fn rejects_invalid_magic() {
    let mut bytes = sample_builder().to_bytes().unwrap();
    bytes[0] = b'X';
    assert!(matches!(
        ContainerFile::from_bytes(bytes),
        Err(ContainerError::InvalidMagic)
    ));
}

#[test]
fn rejects_newer_binary_version() {
    let bytes = sample_builder().binary_version(3).to_bytes().unwrap();
    assert!(matches!(
        ContainerFile::from_bytes(bytes),
        Err(ContainerError::UnsupportedBinaryVersion { found: 3, supported: 2 })
    ));
}

#[test]
fn version_1_layout_implies_spec_revision_1() {
    // Version 1 containers carry no revision field; the writer drops it and
    // the reader must fill in revision 1.
    let bytes = sample_builder().binary_version(1).spec_revision(7).to_bytes().unwrap();
    let container = ContainerFile::from_bytes(bytes).unwrap();
    assert_eq!(container.binary_version(), 1);
    assert_eq!(container.spec_revision(), 1);
}

#[test]
fn rejects_truncated_tensor_data() {
    let mut bytes = sample_builder().to_bytes().unwrap();
    bytes.truncate(bytes.len() - 2);
    assert!(ContainerFile::from_bytes(bytes).is_err());
}

#[test]
fn rejects_unknown_dtype_code() {
    // The last record is the I8 tensor "weight.B": its 3 data bytes are the
    // container tail and the dtype code is the 4 bytes before them.
    let mut bytes = sample_builder().to_bytes().unwrap();
    let code_at = bytes.len() - 3 - 4;
    bytes[code_at..code_at + 4].copy_from_slice(&99u32.to_le_bytes());
    assert!(matches!(
        ContainerFile::from_bytes(bytes),
        Err(ContainerError::UnsupportedDtype(99))
    ));
}

#[test]
fn opens_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.rsta");
    sample_builder().write_to(&path).unwrap();
    let container = ContainerFile::open(&path).unwrap();
    assert_eq!(container.architecture(), "transformer");
    assert_eq!(container.backing_len(), std::fs::metadata(&path).unwrap().len() as usize);
}

#[test]
#[serial_test::serial]
fn honors_no_mmap_override() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.rsta");
    sample_builder().write_to(&path).unwrap();

    unsafe { std::env::set_var("ROSETTA_NO_MMAP", "1") };
    let container = ContainerFile::open(&path);
    unsafe { std::env::remove_var("ROSETTA_NO_MMAP") };

    let container = container.unwrap();
    assert_eq!(container.records().len(), 2);
}
