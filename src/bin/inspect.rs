use std::process::ExitCode;

use rosetta_loader::ContainerFile;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: rosetta-inspect <model.rsta>");
        return ExitCode::from(2);
    };

    let container = match ContainerFile::open(&path) {
        Ok(container) => container,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    println!("architecture:   {}", container.architecture());
    println!("binary version: {}", container.binary_version());
    println!("spec revision:  {}", container.spec_revision());
    println!("source vocab:   {} tokens", container.source_vocabulary().len());
    println!("target vocab:   {} tokens", container.target_vocabulary().len());
    println!("vocab map:      {} entries", container.vocabulary_map().len());
    println!();

    let mut total = 0usize;
    for record in container.records() {
        total += record.byte_len;
        println!(
            "{:<48} {:>5} {:>16} {:>12} bytes",
            record.name,
            record.dtype.to_string(),
            format!("{:?}", record.dims),
            record.byte_len
        );
    }
    println!();
    println!("{} tensors, {} bytes of element data", container.records().len(), total);

    ExitCode::SUCCESS
}
