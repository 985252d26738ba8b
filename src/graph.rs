use rosetta_sdk::TensorStorage;

use crate::error::ModelError;

/// A per-use encoder computation graph.
///
/// Graphs borrow the owning model's weights for their whole lifetime — the
/// `'_` bound on [`crate::Model::make_encoder`] ties them to the handle —
/// and own only per-call scratch state. They are stateless between calls:
/// two graphs over the same model are interchangeable, and a single graph
/// may be reused for any number of sequences.
pub trait Encoder: Send {
    /// Embed a source token sequence, returning hidden states shaped
    /// `[tokens, d_model]` on the model's device. Attention and layer
    /// execution happen downstream of this core.
    fn encode(&mut self, tokens: &[u32]) -> Result<TensorStorage, ModelError>;

    fn hidden_size(&self) -> usize;
}

/// A per-use decoder computation graph. Same borrowing and statelessness
/// contract as [`Encoder`].
pub trait Decoder: Send {
    /// Embed one step of target tokens, returning hidden states shaped
    /// `[tokens, d_model]` on the model's device.
    fn step(&mut self, tokens: &[u32]) -> Result<TensorStorage, ModelError>;

    fn hidden_size(&self) -> usize;

    /// Output projection width: the target vocabulary dimension.
    fn output_size(&self) -> usize;
}
