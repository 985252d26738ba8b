use rosetta_sdk::Dtype;

/// Index entry for one stored tensor. Data bytes stay in the container
/// backing until a caller materializes them.
#[derive(Debug, Clone)]
pub struct TensorRecord {
    pub name: String,
    pub dims: Vec<usize>,
    pub dtype: Dtype,
    /// Byte offset of the element data within the container.
    pub offset: usize,
    pub byte_len: usize,
}

impl TensorRecord {
    pub fn num_elements(&self) -> usize {
        self.dims.iter().product()
    }
}

// Wire codes are container-layout facts, not Dtype facts; they live here so
// the SDK type stays wire-agnostic.
pub(crate) fn dtype_from_code(code: u32) -> Option<Dtype> {
    match code {
        0 => Some(Dtype::F32),
        1 => Some(Dtype::F16),
        2 => Some(Dtype::BF16),
        3 => Some(Dtype::I8),
        4 => Some(Dtype::I16),
        5 => Some(Dtype::I32),
        6 => Some(Dtype::U8),
        7 => Some(Dtype::U16),
        8 => Some(Dtype::U32),
        9 => Some(Dtype::F64),
        _ => None,
    }
}

pub(crate) fn dtype_code(dtype: Dtype) -> u32 {
    match dtype {
        Dtype::F32 => 0,
        Dtype::F16 => 1,
        Dtype::BF16 => 2,
        Dtype::I8 => 3,
        Dtype::I16 => 4,
        Dtype::I32 => 5,
        Dtype::U8 => 6,
        Dtype::U16 => 7,
        Dtype::U32 => 8,
        Dtype::F64 => 9,
    }
}
