use std::{fs::File, io::Read, path::Path};

use byteorder::{LittleEndian, ReadBytesExt};
use memmap2::Mmap;
use rosetta_sdk::MAX_RANK;

use super::{
    errors::ContainerError,
    record::{TensorRecord, dtype_from_code},
};

pub const MAGIC: [u8; 4] = *b"RSTA";

/// Highest container layout this runtime can parse. Distinct from a model's
/// spec revision, which concerns tensor semantics rather than byte framing.
pub const CURRENT_BINARY_VERSION: u32 = 2;

const ROSETTA_NO_MMAP_ENV: &str = "ROSETTA_NO_MMAP";

const MAX_STRING_LEN: usize = 1024 * 1024;
const MAX_SECTION_COUNT: usize = 1 << 24;

fn mmap_disabled() -> bool {
    std::env::var(ROSETTA_NO_MMAP_ENV).ok().is_some_and(|v| v.trim() != "0")
}

#[derive(Debug, Clone)]
pub struct ContainerHeader {
    pub binary_version: u32,
    pub architecture: String,
    pub spec_revision: u32,
}

#[derive(Debug)]
enum Backing {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Backing {
    fn bytes(&self) -> &[u8] {
        match self {
            Backing::Mapped(mmap) => mmap,
            Backing::Owned(buf) => buf,
        }
    }
}

/// A parsed model container: validated header, vocabulary sections and the
/// tensor record index. Tensor bytes stay in the backing (memory map or
/// owned buffer) until a caller materializes them.
#[derive(Debug)]
pub struct ContainerFile {
    header: ContainerHeader,
    source_vocabulary: Vec<String>,
    target_vocabulary: Vec<String>,
    vocabulary_map: Vec<(String, Vec<u32>)>,
    records: Vec<TensorRecord>,
    backing: Backing,
}

impl ContainerFile {
    /// Open and index a container. `ROSETTA_NO_MMAP` forces a buffered read
    /// instead of memory mapping.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ContainerError> {
        let mut file = File::open(&path)?;
        let backing = if mmap_disabled() {
            let mut buf = Vec::new();
            file.read_to_end(&mut buf)?;
            Backing::Owned(buf)
        } else {
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| ContainerError::MemoryMappingError(e.to_string()))?;
            Backing::Mapped(mmap)
        };
        tracing::debug!(
            path = %path.as_ref().display(),
            mapped = matches!(backing, Backing::Mapped(_)),
            "Opened model container"
        );
        Self::parse(backing)
    }

    /// Index a container held entirely in memory.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ContainerError> {
        Self::parse(Backing::Owned(bytes))
    }

    fn parse(backing: Backing) -> Result<Self, ContainerError> {
        let sections = parse_sections(backing.bytes())?;
        Ok(Self {
            header: sections.header,
            source_vocabulary: sections.source_vocabulary,
            target_vocabulary: sections.target_vocabulary,
            vocabulary_map: sections.vocabulary_map,
            records: sections.records,
            backing,
        })
    }

    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    pub fn binary_version(&self) -> u32 {
        self.header.binary_version
    }

    pub fn architecture(&self) -> &str {
        &self.header.architecture
    }

    pub fn spec_revision(&self) -> u32 {
        self.header.spec_revision
    }

    pub fn source_vocabulary(&self) -> &[String] {
        &self.source_vocabulary
    }

    pub fn target_vocabulary(&self) -> &[String] {
        &self.target_vocabulary
    }

    pub fn vocabulary_map(&self) -> &[(String, Vec<u32>)] {
        &self.vocabulary_map
    }

    /// Tensor records in container (deserialization) order.
    pub fn records(&self) -> &[TensorRecord] {
        &self.records
    }

    /// Raw element bytes for a record, bounds-checked against the backing.
    pub fn tensor_bytes(&self, record: &TensorRecord) -> Result<&[u8], ContainerError> {
        let bytes = self.backing.bytes();
        let end = record
            .offset
            .checked_add(record.byte_len)
            .filter(|end| *end <= bytes.len())
            .ok_or_else(|| ContainerError::TensorOutOfBounds {
                name: record.name.clone(),
                offset: record.offset,
                len: record.byte_len,
                available: bytes.len(),
            })?;
        Ok(&bytes[record.offset..end])
    }

    /// Size of the backing in bytes, for host-footprint reporting.
    pub fn backing_len(&self) -> usize {
        self.backing.bytes().len()
    }
}

struct Sections {
    header: ContainerHeader,
    source_vocabulary: Vec<String>,
    target_vocabulary: Vec<String>,
    vocabulary_map: Vec<(String, Vec<u32>)>,
    records: Vec<TensorRecord>,
}

fn parse_sections(bytes: &[u8]) -> Result<Sections, ContainerError> {
    let total = bytes.len();
    let mut reader = bytes;

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(ContainerError::InvalidMagic);
    }

    let binary_version = reader.read_u32::<LittleEndian>()?;
    if binary_version > CURRENT_BINARY_VERSION {
        return Err(ContainerError::UnsupportedBinaryVersion {
            found: binary_version,
            supported: CURRENT_BINARY_VERSION,
        });
    }

    let architecture = read_string(&mut reader)?;
    // Version 1 containers predate per-model spec revisions; revision 1 is
    // implied by the layout.
    let spec_revision = if binary_version >= 2 {
        reader.read_u32::<LittleEndian>()?
    } else {
        1
    };

    let source_vocabulary = read_string_list(&mut reader)?;
    let target_vocabulary = read_string_list(&mut reader)?;
    let vocabulary_map = read_vocabulary_map(&mut reader)?;

    let tensor_count = read_count(&mut reader, "tensor count")?;
    let mut records = Vec::with_capacity(tensor_count);
    for _ in 0..tensor_count {
        let name = read_string(&mut reader)?;
        let rank = reader.read_u8()? as usize;
        if rank > MAX_RANK {
            return Err(ContainerError::InvalidData(format!("tensor '{name}' has rank {rank}")));
        }
        let mut dims = Vec::with_capacity(rank);
        for _ in 0..rank {
            dims.push(reader.read_u64::<LittleEndian>()? as usize);
        }
        let code = reader.read_u32::<LittleEndian>()?;
        let dtype = dtype_from_code(code).ok_or(ContainerError::UnsupportedDtype(code))?;
        let byte_len = dims
            .iter()
            .try_fold(dtype.size_bytes(), |acc, &dim| acc.checked_mul(dim))
            .ok_or_else(|| ContainerError::InvalidData(format!("tensor '{name}' dimensions overflow")))?;
        let offset = total - reader.len();
        if reader.len() < byte_len {
            return Err(ContainerError::Truncated("tensor data"));
        }
        reader = &reader[byte_len..];
        records.push(TensorRecord {
            name,
            dims,
            dtype,
            offset,
            byte_len,
        });
    }

    tracing::debug!(
        binary_version,
        architecture = architecture.as_str(),
        spec_revision,
        tensors = records.len(),
        "Indexed model container"
    );

    Ok(Sections {
        header: ContainerHeader {
            binary_version,
            architecture,
            spec_revision,
        },
        source_vocabulary,
        target_vocabulary,
        vocabulary_map,
        records,
    })
}

fn read_count(reader: &mut &[u8], what: &'static str) -> Result<usize, ContainerError> {
    let count = reader.read_u32::<LittleEndian>()? as usize;
    if count > MAX_SECTION_COUNT {
        return Err(ContainerError::InvalidData(format!("{what} {count} exceeds limit")));
    }
    Ok(count)
}

fn read_string(reader: &mut &[u8]) -> Result<String, ContainerError> {
    let len = reader.read_u32::<LittleEndian>()? as usize;
    if len > MAX_STRING_LEN {
        return Err(ContainerError::InvalidData(format!("string length {len} exceeds limit")));
    }
    if reader.len() < len {
        return Err(ContainerError::Truncated("string"));
    }
    let (head, tail) = reader.split_at(len);
    let value = std::str::from_utf8(head)
        .map_err(|_| ContainerError::InvalidData("non-UTF-8 string".to_string()))?
        .to_string();
    *reader = tail;
    Ok(value)
}

fn read_string_list(reader: &mut &[u8]) -> Result<Vec<String>, ContainerError> {
    let count = read_count(reader, "vocabulary size")?;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(read_string(reader)?);
    }
    Ok(out)
}

fn read_vocabulary_map(reader: &mut &[u8]) -> Result<Vec<(String, Vec<u32>)>, ContainerError> {
    let count = read_count(reader, "vocabulary map size")?;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let key = read_string(reader)?;
        let candidates = read_count(reader, "vocabulary map entry size")?;
        let mut ids = Vec::with_capacity(candidates);
        for _ in 0..candidates {
            ids.push(reader.read_u32::<LittleEndian>()?);
        }
        out.push((key, ids));
    }
    Ok(out)
}

#[path = "file.test.rs"]
#[cfg(test)]
mod tests;
