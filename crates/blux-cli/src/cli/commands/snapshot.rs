use super::SnapshotArgs;
use crate::exit_codes::SUCCESS;
use anyhow::Context;
use blux_core::{build_snapshot_from_dirs, write_document, BuildConfig};

pub fn run(args: SnapshotArgs, config: &BuildConfig) -> anyhow::Result<i32> {
    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("failed to create {}", args.output.display()))?;

    let snapshot = build_snapshot_from_dirs(&args.input, &args.output, config)
        .with_context(|| format!("failed to snapshot {}", args.input.display()))?;

    let path = args.output.join("snapshot.json");
    write_document(&path, &snapshot)
        .with_context(|| format!("failed to write {}", path.display()))?;

    eprintln!(
        "Wrote snapshot {} ({} inputs, {} outputs) to {}",
        snapshot.snapshot_hash,
        snapshot.inputs.len(),
        snapshot.outputs.len(),
        path.display()
    );
    Ok(SUCCESS)
}
