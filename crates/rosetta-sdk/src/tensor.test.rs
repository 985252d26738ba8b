use half::{bf16, f16};

use super::*;

fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

#[test]
fn rejects_length_mismatch() {
    let err = TensorStorage::from_bytes(vec![2, 3], Dtype::F32, vec![0u8; 8], Device::Cpu).unwrap_err();
    assert!(matches!(
        err,
        TensorError::LengthMismatch {
            expected: 24,
            actual: 8,
            ..
        }
    ));
}

#[test]
fn rejects_excessive_rank() {
    let dims = vec![1usize; MAX_RANK + 1];
    let err = TensorStorage::from_bytes(dims, Dtype::U8, vec![0u8], Device::Cpu).unwrap_err();
    assert!(matches!(err, TensorError::RankTooLarge(n) if n == MAX_RANK + 1));
}

#[test]
fn to_device_shares_the_allocation() {
    let storage = TensorStorage::from_bytes(vec![4], Dtype::F32, f32_bytes(&[1.0, 2.0, 3.0, 4.0]), Device::Cpu).unwrap();
    let moved = storage.to_device(Device::Gpu(0));
    assert_eq!(moved.device(), Device::Gpu(0));
    assert!(storage.shares_data_with(&moved));
    assert_eq!(moved.to_f32_vec().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn decodes_half_precision_to_f32() {
    let halves: Vec<u8> = [1.5f32, -2.0, 0.25]
        .iter()
        .flat_map(|v| f16::from_f32(*v).to_le_bytes())
        .collect();
    let storage = TensorStorage::from_bytes(vec![3], Dtype::F16, halves, Device::Cpu).unwrap();
    assert_eq!(storage.to_f32_vec().unwrap(), vec![1.5, -2.0, 0.25]);

    let brains: Vec<u8> = [1.0f32, -4.0].iter().flat_map(|v| bf16::from_f32(*v).to_le_bytes()).collect();
    let storage = TensorStorage::from_bytes(vec![2], Dtype::BF16, brains, Device::Cpu).unwrap();
    assert_eq!(storage.to_f32_vec().unwrap(), vec![1.0, -4.0]);
}

#[test]
fn integer_storage_does_not_decode() {
    let storage = TensorStorage::from_bytes(vec![2], Dtype::I32, vec![0u8; 8], Device::Cpu).unwrap();
    assert!(matches!(storage.to_f32_vec(), Err(TensorError::NotFloat(Dtype::I32))));
}
