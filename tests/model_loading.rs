mod common;

use common::{D_MODEL, SRC_VOCAB, TGT_VOCAB, current_container, indexed_rows, legacy_container};
use rosetta::{ContainerError, Device, Dtype, ModelError, ModelFactory};

fn write_and_load(builder: rosetta::ContainerBuilder, device: Device) -> Result<std::sync::Arc<dyn rosetta::Model>, ModelError> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.rsta");
    builder.write_to(&path).unwrap();
    ModelFactory::load(&path, device)
}

#[test]
fn load_produces_a_ready_model() {
    let model = write_and_load(current_container(), Device::Cpu).unwrap();

    assert_eq!(model.device(), Device::Cpu);
    assert_eq!(model.spec_revision(), 2);
    assert_eq!(model.source_vocabulary().len(), SRC_VOCAB.len());
    assert_eq!(model.target_vocabulary().len(), TGT_VOCAB.len());
    assert_eq!(model.source_vocabulary().token_to_id("hola"), Some(2));
    assert_eq!(model.vocabulary_map().candidates("hola"), Some([2u32].as_slice()));

    let embeddings = model.get_variable("encoder/embeddings/weight").unwrap();
    assert_eq!(embeddings.dims(), &[SRC_VOCAB.len(), D_MODEL]);
    assert_eq!(embeddings.dtype(), Dtype::F32);
    assert_eq!(embeddings.to_f32_vec().unwrap(), indexed_rows(SRC_VOCAB.len(), D_MODEL));
}

#[test]
fn device_selection_is_stored_and_forwarded() {
    let model = write_and_load(current_container(), Device::Gpu(1)).unwrap();
    assert_eq!(model.device(), Device::Gpu(1));
    assert_eq!(model.get_variable("encoder/norm/scale").unwrap().device(), Device::Gpu(1));
    let encoder = model.make_encoder().unwrap();
    assert_eq!(encoder.hidden_size(), D_MODEL);
}

#[test]
fn missing_lookups_agree_between_both_accessors() {
    let model = write_and_load(current_container(), Device::Cpu).unwrap();
    assert!(model.get_variable_if_exists("encoder/embeddings/weight").is_some());
    assert!(model.get_variable_if_exists("no/such/weight").is_none());
    let err = model.get_variable("no/such/weight").unwrap_err();
    assert!(matches!(err, ModelError::MissingVariable(name) if name == "no/such/weight"));
}

#[test]
fn graphs_from_one_handle_are_independent() {
    let model = write_and_load(current_container(), Device::Cpu).unwrap();

    let mut first = model.make_encoder().unwrap();
    let mut second = model.make_encoder().unwrap();

    let tokens_a: Vec<u32> = vec![2, 0, 1, 3];
    let tokens_b: Vec<u32> = vec![3, 3, 1];
    let expected_a: Vec<f32> = tokens_a.iter().flat_map(|&t| std::iter::repeat_n(t as f32, D_MODEL)).collect();
    let expected_b: Vec<f32> = tokens_b.iter().flat_map(|&t| std::iter::repeat_n(t as f32, D_MODEL)).collect();

    std::thread::scope(|scope| {
        let a = scope.spawn(|| {
            for _ in 0..50 {
                let hidden = first.encode(&tokens_a).unwrap();
                assert_eq!(hidden.to_f32_vec().unwrap(), expected_a);
            }
        });
        let b = scope.spawn(|| {
            for _ in 0..50 {
                let hidden = second.encode(&tokens_b).unwrap();
                assert_eq!(hidden.to_f32_vec().unwrap(), expected_b);
            }
        });
        a.join().unwrap();
        b.join().unwrap();
    });

    // The weights behind the graphs are untouched by concurrent use.
    let embeddings = model.get_variable("encoder/embeddings/weight").unwrap();
    assert_eq!(embeddings.to_f32_vec().unwrap(), indexed_rows(SRC_VOCAB.len(), D_MODEL));
}

#[test]
fn a_graph_is_stateless_between_calls() {
    let model = write_and_load(current_container(), Device::Cpu).unwrap();
    let mut encoder = model.make_encoder().unwrap();
    let first = encoder.encode(&[1, 2]).unwrap().to_f32_vec().unwrap();
    encoder.encode(&[3]).unwrap();
    let again = encoder.encode(&[1, 2]).unwrap().to_f32_vec().unwrap();
    assert_eq!(first, again);
}

#[test]
fn decoder_exposes_projection_width() {
    let model = write_and_load(current_container(), Device::Cpu).unwrap();
    let mut decoder = model.make_decoder().unwrap();
    assert_eq!(decoder.hidden_size(), D_MODEL);
    assert_eq!(decoder.output_size(), TGT_VOCAB.len());
    let hidden = decoder.step(&[2]).unwrap();
    assert_eq!(hidden.dims(), &[1, D_MODEL]);
}

#[test]
fn legacy_container_is_migrated_while_streaming() {
    let model = write_and_load(legacy_container(), Device::Cpu).unwrap();
    assert_eq!(model.spec_revision(), 1);

    // Current names exist, legacy names do not.
    assert!(model.get_variable_if_exists("encoder/embeddings/weight").is_some());
    assert!(model.get_variable_if_exists("decoder/projection/weight").is_some());
    let err = model.get_variable("transformer/embeddings/weight").unwrap_err();
    assert!(matches!(err, ModelError::MissingVariable(_)));
    let err = model.get_variable("transformer/output/kernel").unwrap_err();
    assert!(matches!(err, ModelError::MissingVariable(_)));

    // The shared-embedding split registered one allocation twice, not two
    // copies.
    let encoder_side = model.get_variable("encoder/embeddings/weight").unwrap();
    let decoder_side = model.get_variable("decoder/embeddings/weight").unwrap();
    assert!(encoder_side.shares_data_with(decoder_side));
}

#[test]
fn rejects_a_newer_binary_version() {
    let err = write_and_load(current_container().binary_version(3), Device::Cpu).unwrap_err();
    assert!(matches!(
        err,
        ModelError::Container(ContainerError::UnsupportedBinaryVersion { found: 3, supported: 2 })
    ));
}

#[test]
fn rejects_an_unknown_architecture() {
    let builder = rosetta::ContainerBuilder::new("quantum").tensor_f32("weight.A", &[1], &[1.0]);
    let err = write_and_load(builder, Device::Cpu).unwrap_err();
    assert!(matches!(err, ModelError::UnknownArchitecture(tag) if tag == "quantum"));
}

#[test]
fn rejects_a_newer_spec_revision() {
    let err = write_and_load(current_container().spec_revision(3), Device::Cpu).unwrap_err();
    assert!(matches!(
        err,
        ModelError::UnsupportedSpecRevision {
            found: 3,
            supported: 2,
            ..
        }
    ));
}

#[test]
fn rejects_duplicate_variables() {
    let builder = current_container().tensor_f32("encoder/norm/scale", &[D_MODEL], &vec![2.0; D_MODEL]);
    let err = write_and_load(builder, Device::Cpu).unwrap_err();
    assert!(matches!(err, ModelError::DuplicateVariable(name) if name == "encoder/norm/scale"));
}

#[test]
fn rejects_an_incomplete_model() {
    // Rebuild the full container minus the projection: finalize must notice.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.rsta");
    current_container().write_to(&path).unwrap();

    let container = rosetta::ContainerFile::open(&path).unwrap();
    let mut pruned = rosetta::ContainerBuilder::new("transformer")
        .spec_revision(2)
        .source_vocabulary(SRC_VOCAB.iter().copied())
        .target_vocabulary(TGT_VOCAB.iter().copied());
    for record in container.records() {
        if record.name == "decoder/projection/weight" {
            continue;
        }
        let bytes = container.tensor_bytes(record).unwrap().to_vec();
        pruned = pruned.tensor(&record.name, &record.dims, record.dtype, bytes);
    }

    let err = write_and_load(pruned, Device::Cpu).unwrap_err();
    assert!(matches!(err, ModelError::IncompleteModel(msg) if msg.contains("decoder/projection/weight")));
}
