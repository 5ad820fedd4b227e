use super::ReceiptArgs;
use crate::exit_codes::SUCCESS;
use anyhow::{bail, Context};
use blux_core::types::DatasetFixture;
use blux_core::{build_receipt, load_document, write_document, BuildConfig, ReceiptOptions};
use serde_json::Value;
use std::path::Path;

pub fn run(args: ReceiptArgs, config: &BuildConfig) -> anyhow::Result<i32> {
    let snapshot = load_document(&args.snapshot)
        .with_context(|| format!("failed to load snapshot {}", args.snapshot.display()))?;

    let mut options = ReceiptOptions {
        policy_pack: args.policy_pack,
        reasoning_pack: args.reasoning_pack,
        ..ReceiptOptions::default()
    };
    if let Some(path) = &args.run_graph {
        options = options.with_run_steps(load_run_steps(path)?);
    }
    if let Some(path) = &args.dataset_fixture {
        options = options.with_dataset_fixture(load_fixture(path)?);
    }

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("failed to create {}", args.output.display()))?;

    let receipt = build_receipt(&snapshot, options, config)
        .with_context(|| format!("failed to build receipt for {}", args.snapshot.display()))?;

    let path = args.output.join("receipt.json");
    write_document(&path, &receipt)
        .with_context(|| format!("failed to write {}", path.display()))?;

    eprintln!(
        "Wrote receipt {} ({} output hashes) to {}",
        receipt.receipt_hash,
        receipt.output_hashes.len(),
        path.display()
    );
    Ok(SUCCESS)
}

/// Steps from a run-graph file: either a bare array or `{"steps": [...]}`.
fn load_run_steps(path: &Path) -> anyhow::Result<Vec<Value>> {
    let doc = load_document(path)
        .with_context(|| format!("failed to load run graph {}", path.display()))?;
    match doc {
        Value::Array(steps) => Ok(steps),
        Value::Object(mut map) => match map.remove("steps") {
            Some(Value::Array(steps)) => Ok(steps),
            _ => bail!("run graph {} has no \"steps\" array", path.display()),
        },
        _ => bail!(
            "run graph {} must be an array or an object with \"steps\"",
            path.display()
        ),
    }
}

fn load_fixture(path: &Path) -> anyhow::Result<DatasetFixture> {
    let doc = load_document(path)
        .with_context(|| format!("failed to load dataset fixture {}", path.display()))?;
    DatasetFixture::try_from(&doc)
        .with_context(|| format!("invalid dataset fixture {}", path.display()))
}
