use std::{fmt::Display, str::FromStr, sync::Arc};

use half::{bf16, f16};
use serde::{Deserialize, Serialize};

use crate::device::Device;

/// Maximum tensor rank the runtime handles.
pub const MAX_RANK: usize = 8;

#[derive(thiserror::Error, Debug)]
pub enum TensorError {
    #[error("Data length {actual} does not match shape {dims:?} of {dtype} (expected {expected} bytes)")]
    LengthMismatch {
        dims: Vec<usize>,
        dtype: Dtype,
        expected: usize,
        actual: usize,
    },
    #[error("Tensor rank {0} exceeds the supported maximum of {MAX_RANK}")]
    RankTooLarge(usize),
    #[error("{0} storage cannot be decoded as f32")]
    NotFloat(Dtype),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dtype {
    F32,
    F16,
    BF16,
    I8,
    I16,
    I32,
    U8,
    U16,
    U32,
    F64,
}

impl Dtype {
    pub fn size_bytes(&self) -> usize {
        match self {
            Dtype::F32 | Dtype::I32 | Dtype::U32 => 4,
            Dtype::F16 | Dtype::BF16 | Dtype::I16 | Dtype::U16 => 2,
            Dtype::I8 | Dtype::U8 => 1,
            Dtype::F64 => 8,
        }
    }

    /// True for element types the embedding and projection paths can decode.
    pub fn is_float(&self) -> bool {
        matches!(self, Dtype::F32 | Dtype::F16 | Dtype::BF16)
    }
}

impl Display for Dtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Dtype::F32 => "F32",
            Dtype::F16 => "F16",
            Dtype::BF16 => "BF16",
            Dtype::I8 => "I8",
            Dtype::I16 => "I16",
            Dtype::I32 => "I32",
            Dtype::U8 => "U8",
            Dtype::U16 => "U16",
            Dtype::U32 => "U32",
            Dtype::F64 => "F64",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Dtype {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "F32" => Ok(Dtype::F32),
            "F16" => Ok(Dtype::F16),
            "BF16" => Ok(Dtype::BF16),
            "I8" => Ok(Dtype::I8),
            "I16" => Ok(Dtype::I16),
            "I32" => Ok(Dtype::I32),
            "U8" => Ok(Dtype::U8),
            "U16" => Ok(Dtype::U16),
            "U32" => Ok(Dtype::U32),
            "F64" => Ok(Dtype::F64),
            _ => Err(format!("Unknown dtype: {s}")),
        }
    }
}

/// Decode raw little-endian element bytes into f32, appending to `out`.
///
/// Only float element types decode; integer storage is routed, never
/// interpreted, by this layer.
pub fn decode_f32(dtype: Dtype, bytes: &[u8], out: &mut Vec<f32>) -> Result<(), TensorError> {
    match dtype {
        Dtype::F32 => {
            out.extend(bytes.chunks_exact(4).map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])));
            Ok(())
        }
        Dtype::F16 => {
            out.extend(bytes.chunks_exact(2).map(|b| f16::from_le_bytes([b[0], b[1]]).to_f32()));
            Ok(())
        }
        Dtype::BF16 => {
            out.extend(bytes.chunks_exact(2).map(|b| bf16::from_le_bytes([b[0], b[1]]).to_f32()));
            Ok(())
        }
        other => Err(TensorError::NotFloat(other)),
    }
}

/// Owned n-dimensional tensor storage with a fixed element type and device
/// affinity.
///
/// Element bytes are reference-counted: clones, legacy-name re-registrations
/// and device retargets all share the same allocation. Nothing in the runtime
/// copies weight bytes after load.
#[derive(Debug, Clone)]
pub struct TensorStorage {
    dims: Vec<usize>,
    dtype: Dtype,
    device: Device,
    data: Arc<[u8]>,
}

impl TensorStorage {
    pub fn from_bytes(dims: Vec<usize>, dtype: Dtype, data: Vec<u8>, device: Device) -> Result<Self, TensorError> {
        if dims.len() > MAX_RANK {
            return Err(TensorError::RankTooLarge(dims.len()));
        }
        let expected = dims.iter().product::<usize>() * dtype.size_bytes();
        if data.len() != expected {
            return Err(TensorError::LengthMismatch {
                dims,
                dtype,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            dims,
            dtype,
            device,
            data: data.into(),
        })
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn dtype(&self) -> Dtype {
        self.dtype
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn num_elements(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Retarget the storage to another device without copying bytes.
    ///
    /// Host memory stays the backing store; an execution layer with dedicated
    /// device memory would hook its transfer here.
    pub fn to_device(&self, device: Device) -> TensorStorage {
        TensorStorage {
            dims: self.dims.clone(),
            dtype: self.dtype,
            device,
            data: Arc::clone(&self.data),
        }
    }

    /// True if both storages view the same underlying allocation.
    pub fn shares_data_with(&self, other: &TensorStorage) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    pub fn to_f32_vec(&self) -> Result<Vec<f32>, TensorError> {
        let mut out = Vec::with_capacity(self.num_elements());
        decode_f32(self.dtype, &self.data, &mut out)?;
        Ok(out)
    }
}

#[path = "tensor.test.rs"]
#[cfg(test)]
mod tests;
