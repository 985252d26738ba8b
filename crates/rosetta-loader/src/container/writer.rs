use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use rosetta_sdk::{Dtype, MAX_RANK};

use super::{
    errors::ContainerError,
    file::{CURRENT_BINARY_VERSION, MAGIC},
    record::dtype_code,
};

/// Serializes a model container. Used by converters and by tests to produce
/// fixtures, including legacy (version 1) and deliberately unsupported
/// layouts.
///
/// The builder performs no duplicate-name checking: rejecting duplicates is
/// load-time behavior and must hold regardless of the producer.
#[derive(Debug, Clone)]
pub struct ContainerBuilder {
    binary_version: u32,
    architecture: String,
    spec_revision: u32,
    source_vocabulary: Vec<String>,
    target_vocabulary: Vec<String>,
    vocabulary_map: Vec<(String, Vec<u32>)>,
    tensors: Vec<(String, Vec<usize>, Dtype, Vec<u8>)>,
}

impl ContainerBuilder {
    pub fn new(architecture: &str) -> Self {
        Self {
            binary_version: CURRENT_BINARY_VERSION,
            architecture: architecture.to_string(),
            spec_revision: 1,
            source_vocabulary: Vec::new(),
            target_vocabulary: Vec::new(),
            vocabulary_map: Vec::new(),
            tensors: Vec::new(),
        }
    }

    /// Override the container layout version, e.g. to emit legacy fixtures.
    pub fn binary_version(mut self, version: u32) -> Self {
        self.binary_version = version;
        self
    }

    pub fn spec_revision(mut self, revision: u32) -> Self {
        self.spec_revision = revision;
        self
    }

    pub fn source_vocabulary<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_vocabulary = tokens.into_iter().map(Into::into).collect();
        self
    }

    pub fn target_vocabulary<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_vocabulary = tokens.into_iter().map(Into::into).collect();
        self
    }

    pub fn vocabulary_map(mut self, entries: Vec<(String, Vec<u32>)>) -> Self {
        self.vocabulary_map = entries;
        self
    }

    /// Append a tensor record. Records are written in insertion order.
    pub fn tensor(mut self, name: &str, dims: &[usize], dtype: Dtype, data: Vec<u8>) -> Self {
        self.tensors.push((name.to_string(), dims.to_vec(), dtype, data));
        self
    }

    /// Append an f32 tensor from host values.
    pub fn tensor_f32(self, name: &str, dims: &[usize], values: &[f32]) -> Self {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.tensor(name, dims, Dtype::F32, data)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ContainerError> {
        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC);
        out.write_u32::<LittleEndian>(self.binary_version)?;
        write_string(&mut out, &self.architecture)?;
        if self.binary_version >= 2 {
            out.write_u32::<LittleEndian>(self.spec_revision)?;
        }

        write_string_list(&mut out, &self.source_vocabulary)?;
        write_string_list(&mut out, &self.target_vocabulary)?;
        out.write_u32::<LittleEndian>(self.vocabulary_map.len() as u32)?;
        for (key, ids) in &self.vocabulary_map {
            write_string(&mut out, key)?;
            out.write_u32::<LittleEndian>(ids.len() as u32)?;
            for id in ids {
                out.write_u32::<LittleEndian>(*id)?;
            }
        }

        out.write_u32::<LittleEndian>(self.tensors.len() as u32)?;
        for (name, dims, dtype, data) in &self.tensors {
            if dims.len() > MAX_RANK {
                return Err(ContainerError::InvalidData(format!(
                    "tensor '{name}' has rank {}",
                    dims.len()
                )));
            }
            let expected = dims.iter().product::<usize>() * dtype.size_bytes();
            if data.len() != expected {
                return Err(ContainerError::InvalidData(format!(
                    "tensor '{name}' has {} data bytes, shape {dims:?} of {dtype} requires {expected}",
                    data.len()
                )));
            }
            write_string(&mut out, name)?;
            out.write_u8(dims.len() as u8)?;
            for dim in dims {
                out.write_u64::<LittleEndian>(*dim as u64)?;
            }
            out.write_u32::<LittleEndian>(dtype_code(*dtype))?;
            out.extend_from_slice(data);
        }

        Ok(out)
    }

    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<(), ContainerError> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

fn write_string(out: &mut Vec<u8>, value: &str) -> Result<(), ContainerError> {
    out.write_u32::<LittleEndian>(value.len() as u32)?;
    out.extend_from_slice(value.as_bytes());
    Ok(())
}

fn write_string_list(out: &mut Vec<u8>, values: &[String]) -> Result<(), ContainerError> {
    out.write_u32::<LittleEndian>(values.len() as u32)?;
    for value in values {
        write_string(out, value)?;
    }
    Ok(())
}

#[path = "writer.test.rs"]
#[cfg(test)]
mod tests;
