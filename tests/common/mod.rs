use rand::{Rng, SeedableRng, rngs::StdRng};
use rosetta::ContainerBuilder;

pub const D_MODEL: usize = 8;
pub const SRC_VOCAB: &[&str] = &["<s>", "</s>", "hola", "mundo"];
pub const TGT_VOCAB: &[&str] = &["<s>", "</s>", "hello", "world", "!"];

const ENCODER_LAYER_SUFFIXES: &[&str] = &[
    "self_attention/qkv/weight",
    "self_attention/output/weight",
    "ffn/up/weight",
    "ffn/down/weight",
];

const DECODER_LAYER_SUFFIXES: &[&str] = &[
    "self_attention/qkv/weight",
    "self_attention/output/weight",
    "cross_attention/qkv/weight",
    "cross_attention/output/weight",
    "ffn/up/weight",
    "ffn/down/weight",
];

/// Embedding rows hold their row index so gathers are checkable.
pub fn indexed_rows(rows: usize, cols: usize) -> Vec<f32> {
    (0..rows).flat_map(|i| std::iter::repeat_n(i as f32, cols)).collect()
}

fn random_values(rng: &mut StdRng, len: usize) -> Vec<f32> {
    (0..len).map(|_| rng.random::<f32>()).collect()
}

fn with_layer_tensors(mut builder: ContainerBuilder, prefix: &str, rng: &mut StdRng) -> ContainerBuilder {
    let suffixes = if prefix.starts_with("encoder") || prefix.starts_with("transformer/encoder") {
        ENCODER_LAYER_SUFFIXES
    } else {
        DECODER_LAYER_SUFFIXES
    };
    for suffix in suffixes {
        builder = builder.tensor_f32(
            &format!("{prefix}/{suffix}"),
            &[D_MODEL, D_MODEL],
            &random_values(rng, D_MODEL * D_MODEL),
        );
    }
    builder.tensor_f32(&format!("{prefix}/norm/scale"), &[D_MODEL], &vec![1.0; D_MODEL])
}

/// A complete current-revision transformer container.
pub fn current_container() -> ContainerBuilder {
    let mut rng = StdRng::seed_from_u64(42);
    let src = SRC_VOCAB.len();
    let tgt = TGT_VOCAB.len();

    let mut builder = ContainerBuilder::new("transformer")
        .spec_revision(2)
        .source_vocabulary(SRC_VOCAB.iter().copied())
        .target_vocabulary(TGT_VOCAB.iter().copied())
        .vocabulary_map(vec![("hola".to_string(), vec![2]), ("mundo".to_string(), vec![3])])
        .tensor_f32("encoder/embeddings/weight", &[src, D_MODEL], &indexed_rows(src, D_MODEL))
        .tensor_f32("decoder/embeddings/weight", &[tgt, D_MODEL], &indexed_rows(tgt, D_MODEL))
        .tensor_f32(
            "decoder/projection/weight",
            &[tgt, D_MODEL],
            &random_values(&mut rng, tgt * D_MODEL),
        )
        .tensor_f32("encoder/norm/scale", &[D_MODEL], &vec![1.0; D_MODEL])
        .tensor_f32("decoder/norm/scale", &[D_MODEL], &vec![1.0; D_MODEL]);

    builder = with_layer_tensors(builder, "encoder/layer_0", &mut rng);
    builder = with_layer_tensors(builder, "decoder/layer_0", &mut rng);
    builder
}

/// A legacy container: binary version 1 (no spec-revision field, revision 1
/// implied), every name under the old `transformer/` prefix, one shared
/// embedding table and the old projection name.
pub fn legacy_container() -> ContainerBuilder {
    let mut rng = StdRng::seed_from_u64(7);
    let src = SRC_VOCAB.len();

    // The shared table doubles as both embeddings, so the legacy layout
    // requires the vocabularies to be merged; reuse the source one for both.
    let mut builder = ContainerBuilder::new("transformer")
        .binary_version(1)
        .source_vocabulary(SRC_VOCAB.iter().copied())
        .target_vocabulary(SRC_VOCAB.iter().copied())
        .tensor_f32("transformer/embeddings/weight", &[src, D_MODEL], &indexed_rows(src, D_MODEL))
        .tensor_f32(
            "transformer/output/kernel",
            &[src, D_MODEL],
            &random_values(&mut rng, src * D_MODEL),
        )
        .tensor_f32("transformer/encoder/norm/scale", &[D_MODEL], &vec![1.0; D_MODEL])
        .tensor_f32("transformer/decoder/norm/scale", &[D_MODEL], &vec![1.0; D_MODEL]);

    builder = with_layer_tensors(builder, "transformer/encoder/layer_0", &mut rng);
    builder = with_layer_tensors(builder, "transformer/decoder/layer_0", &mut rng);
    builder
}
