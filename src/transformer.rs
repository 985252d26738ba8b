use rosetta_sdk::{Device, Dtype, TensorStorage, decode_f32};
use rustc_hash::FxHashSet;

use crate::{
    error::ModelError,
    factory::ModelSeed,
    graph::{Decoder, Encoder},
    migration::{MigrationPlan, MigrationRule},
    model::{Model, ModelBase},
    variables::VariableIndex,
};

pub const ARCHITECTURE_TAGS: &[&str] = &["transformer", "transformer_base"];

/// Most recent tensor-naming revision this implementation understands.
const SPEC_REVISION: u32 = 2;

const ENCODER_LAYER_SUFFIXES: &[&str] = &[
    "self_attention/qkv/weight",
    "self_attention/output/weight",
    "ffn/up/weight",
    "ffn/down/weight",
    "norm/scale",
];

const DECODER_LAYER_SUFFIXES: &[&str] = &[
    "self_attention/qkv/weight",
    "self_attention/output/weight",
    "cross_attention/qkv/weight",
    "cross_attention/output/weight",
    "ffn/up/weight",
    "ffn/down/weight",
    "norm/scale",
];

/// Naming changes between spec revisions 1 and 2. Revision 1 prefixed every
/// name with `transformer/`, shared one embedding table between encoder and
/// decoder, and called the output projection `output/kernel`. Exact rules
/// come first: the trailing prefix rewrite would otherwise swallow them.
fn legacy_naming_rules() -> MigrationPlan {
    MigrationPlan::new(vec![
        MigrationRule::split("transformer/embeddings/weight", &[
            "encoder/embeddings/weight",
            "decoder/embeddings/weight",
        ]),
        MigrationRule::rename("transformer/output/kernel", "decoder/projection/weight"),
        MigrationRule::rename("transformer/output/bias", "decoder/projection/bias"),
        MigrationRule::rewrite_prefix("transformer/", ""),
    ])
}

pub(crate) fn constructor(seed: ModelSeed) -> Box<dyn Model> {
    Box::new(TransformerModel::new(seed))
}

/// Encoder-decoder transformer weights.
pub struct TransformerModel {
    base: ModelBase,
    legacy_rules: MigrationPlan,
}

impl TransformerModel {
    pub fn new(seed: ModelSeed) -> Self {
        Self {
            base: seed.into_base(),
            legacy_rules: legacy_naming_rules(),
        }
    }
}

impl Model for TransformerModel {
    fn base(&self) -> &ModelBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ModelBase {
        &mut self.base
    }

    fn current_spec_revision(&self) -> u32 {
        SPEC_REVISION
    }

    fn register_variable(&mut self, name: String, storage: TensorStorage) -> Result<(), ModelError> {
        if self.spec_revision() >= SPEC_REVISION {
            return self.base_mut().insert_raw(name, storage);
        }
        match self.legacy_rules.apply(&name) {
            Some(targets) => {
                tracing::trace!(from = name.as_str(), to = ?targets, "Migrating legacy variable");
                for target in targets {
                    self.base_mut().insert_raw(target, storage.clone())?;
                }
                Ok(())
            }
            None => self.base_mut().insert_raw(name, storage),
        }
    }

    fn finalize(&mut self) -> Result<(), ModelError> {
        let variables = self.base.variables();

        let encoder_layers = dense_layer_count(variables, "encoder")?;
        let decoder_layers = dense_layer_count(variables, "decoder")?;
        if encoder_layers == 0 {
            return Err(ModelError::IncompleteModel("no encoder layers registered".to_string()));
        }
        if decoder_layers == 0 {
            return Err(ModelError::IncompleteModel("no decoder layers registered".to_string()));
        }

        for i in 0..encoder_layers {
            for suffix in ENCODER_LAYER_SUFFIXES {
                require(variables, &format!("encoder/layer_{i}/{suffix}"))?;
            }
        }
        for i in 0..decoder_layers {
            for suffix in DECODER_LAYER_SUFFIXES {
                require(variables, &format!("decoder/layer_{i}/{suffix}"))?;
            }
        }
        require(variables, "encoder/norm/scale")?;
        require(variables, "decoder/norm/scale")?;

        let source_len = self.base.source_vocabulary().len();
        let target_len = self.base.target_vocabulary().len();
        let d_model = expect_matrix(variables, "encoder/embeddings/weight", source_len, None)?;
        expect_matrix(variables, "decoder/embeddings/weight", target_len, Some(d_model))?;
        expect_matrix(variables, "decoder/projection/weight", target_len, Some(d_model))?;
        expect_vector(variables, "encoder/norm/scale", d_model)?;
        expect_vector(variables, "decoder/norm/scale", d_model)?;

        tracing::debug!(encoder_layers, decoder_layers, d_model, "Transformer model finalized");
        Ok(())
    }

    fn make_encoder(&self) -> Result<Box<dyn Encoder + '_>, ModelError> {
        Ok(Box::new(TransformerEncoder::new(self)?))
    }

    fn make_decoder(&self) -> Result<Box<dyn Decoder + '_>, ModelError> {
        Ok(Box::new(TransformerDecoder::new(self)?))
    }
}

fn require(variables: &VariableIndex, name: &str) -> Result<(), ModelError> {
    if variables.contains(name) {
        Ok(())
    } else {
        Err(ModelError::IncompleteModel(format!("required variable '{name}' was not registered")))
    }
}

/// Layer count inferred from registered names, verifying indexes are dense
/// from zero. A gap means the container lost a layer.
fn dense_layer_count(variables: &VariableIndex, side: &str) -> Result<usize, ModelError> {
    let prefix = format!("{side}/layer_");
    let mut seen = FxHashSet::default();
    for name in variables.names() {
        if let Some(rest) = name.strip_prefix(prefix.as_str())
            && let Some(index) = rest.split('/').next()
            && let Ok(index) = index.parse::<usize>()
        {
            seen.insert(index);
        }
    }
    let Some(max) = seen.iter().max().copied() else {
        return Ok(0);
    };
    for i in 0..max {
        if !seen.contains(&i) {
            return Err(ModelError::IncompleteModel(format!(
                "{side} layer {i} is missing while layer {max} is present"
            )));
        }
    }
    Ok(max + 1)
}

/// Check a rank-2 variable against `[rows, d_model]`, returning its inner
/// dimension.
fn expect_matrix(
    variables: &VariableIndex,
    name: &str,
    rows: usize,
    d_model: Option<usize>,
) -> Result<usize, ModelError> {
    let storage = variables
        .get(name)
        .ok_or_else(|| ModelError::IncompleteModel(format!("required variable '{name}' was not registered")))?;
    let dims = storage.dims();
    let expected = match d_model {
        Some(d) => format!("[{rows}, {d}]"),
        None => format!("[{rows}, d_model]"),
    };
    let matches = dims.len() == 2 && dims[0] == rows && d_model.is_none_or(|d| dims[1] == d);
    if !matches {
        return Err(ModelError::ShapeMismatch {
            name: name.to_string(),
            expected,
            actual: dims.to_vec(),
        });
    }
    Ok(dims[1])
}

fn expect_vector(variables: &VariableIndex, name: &str, len: usize) -> Result<(), ModelError> {
    let storage = variables
        .get(name)
        .ok_or_else(|| ModelError::IncompleteModel(format!("required variable '{name}' was not registered")))?;
    if storage.dims() != [len] {
        return Err(ModelError::ShapeMismatch {
            name: name.to_string(),
            expected: format!("[{len}]"),
            actual: storage.dims().to_vec(),
        });
    }
    Ok(())
}

/// Resolve an embedding table, checking the graph can decode it.
fn embedding_table<'m>(model: &'m TransformerModel, name: &'static str) -> Result<&'m TensorStorage, ModelError> {
    let table = model.get_variable(name)?;
    if table.dims().len() != 2 {
        return Err(ModelError::ShapeMismatch {
            name: name.to_string(),
            expected: "[vocab, d_model]".to_string(),
            actual: table.dims().to_vec(),
        });
    }
    if !table.dtype().is_float() {
        return Err(ModelError::UnsupportedDtype {
            operation: "embedding gather",
            dtype: table.dtype(),
        });
    }
    Ok(table)
}

/// Gather embedding rows into fresh f32 hidden states. `scratch` is the
/// graph's per-call buffer; the table bytes are only read.
fn gather_rows(
    table: &TensorStorage,
    tokens: &[u32],
    scratch: &mut Vec<f32>,
    device: Device,
) -> Result<TensorStorage, ModelError> {
    let vocab = table.dims()[0];
    let d_model = table.dims()[1];
    let row_bytes = d_model * table.dtype().size_bytes();

    scratch.clear();
    scratch.reserve(tokens.len() * d_model);
    for &token in tokens {
        let index = token as usize;
        if index >= vocab {
            return Err(ModelError::InvalidToken {
                id: token,
                vocab_size: vocab,
            });
        }
        let start = index * row_bytes;
        decode_f32(table.dtype(), &table.data()[start..start + row_bytes], scratch)?;
    }

    let bytes = bytemuck::cast_slice(scratch.as_slice()).to_vec();
    Ok(TensorStorage::from_bytes(vec![tokens.len(), d_model], Dtype::F32, bytes, device)?)
}

/// Source-side graph: resolves its weight references once at construction
/// and shares the model's tensor bytes for its whole lifetime.
pub struct TransformerEncoder<'m> {
    embeddings: &'m TensorStorage,
    device: Device,
    scratch: Vec<f32>,
}

impl<'m> TransformerEncoder<'m> {
    fn new(model: &'m TransformerModel) -> Result<Self, ModelError> {
        let embeddings = embedding_table(model, "encoder/embeddings/weight")?;
        model.get_variable("encoder/norm/scale")?;
        Ok(Self {
            embeddings,
            device: model.device(),
            scratch: Vec::new(),
        })
    }
}

impl Encoder for TransformerEncoder<'_> {
    fn encode(&mut self, tokens: &[u32]) -> Result<TensorStorage, ModelError> {
        gather_rows(self.embeddings, tokens, &mut self.scratch, self.device)
    }

    fn hidden_size(&self) -> usize {
        self.embeddings.dims()[1]
    }
}

/// Target-side graph. Holds the projection reference as well so downstream
/// execution can size its logits without another lookup.
pub struct TransformerDecoder<'m> {
    embeddings: &'m TensorStorage,
    projection: &'m TensorStorage,
    device: Device,
    scratch: Vec<f32>,
}

impl<'m> TransformerDecoder<'m> {
    fn new(model: &'m TransformerModel) -> Result<Self, ModelError> {
        let embeddings = embedding_table(model, "decoder/embeddings/weight")?;
        let projection = model.get_variable("decoder/projection/weight")?;
        model.get_variable("decoder/norm/scale")?;
        Ok(Self {
            embeddings,
            projection,
            device: model.device(),
            scratch: Vec::new(),
        })
    }
}

impl Decoder for TransformerDecoder<'_> {
    fn step(&mut self, tokens: &[u32]) -> Result<TensorStorage, ModelError> {
        gather_rows(self.embeddings, tokens, &mut self.scratch, self.device)
    }

    fn hidden_size(&self) -> usize {
        self.embeddings.dims()[1]
    }

    fn output_size(&self) -> usize {
        self.projection.dims()[0]
    }
}
