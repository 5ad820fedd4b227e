use super::ReplayArgs;
use crate::exit_codes::{SUCCESS, VERIFY_FAILED};
use anyhow::Context;
use blux_core::crypto::jcs;
use blux_core::{build_replay_report, write_document, BuildConfig, JsonSchemaValidator};

pub fn run(args: ReplayArgs, config: &BuildConfig) -> anyhow::Result<i32> {
    JsonSchemaValidator::check_schemas().context("embedded schemas failed to compile")?;

    let report = build_replay_report(&args.receipt, &args.root, &JsonSchemaValidator, config)
        .with_context(|| format!("failed to replay {}", args.receipt.display()))?;

    match &args.output {
        Some(dir) => {
            let path = dir.join("replay_report.json");
            write_document(&path, &report)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("Wrote replay report to {}", path.display());
        }
        None => println!("{}", jcs::to_string(&report)?),
    }

    let summary = &report.summary;
    if summary.ok {
        eprintln!("Replay OK: {} outputs verified", summary.total_outputs);
        Ok(SUCCESS)
    } else {
        eprintln!(
            "Replay FAILED: schema_valid={} receipt_hash_match={} missing={} mismatched={} fixture_missing={} fixture_mismatched={}",
            report.schema_valid,
            report.receipt_hash_match,
            summary.missing_outputs,
            summary.hash_mismatches,
            summary.fixture_missing,
            summary.fixture_hash_mismatches
        );
        Ok(VERIFY_FAILED)
    }
}
