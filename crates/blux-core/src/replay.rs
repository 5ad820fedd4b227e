//! Replay verifier.
//!
//! Re-checks a stored receipt against the files under a root directory.
//! Only an unreadable or unparsable receipt is an error; every finding
//! (schema violation, hash drift, missing file) is recorded in the report.

use crate::config::BuildConfig;
use crate::crypto::digest::{hash_canonical, hash_file, hash_without, is_digest};
use crate::document::load_document;
use crate::error::BluxResult;
use crate::normalize::file_record_from_value;
use crate::schema::{SchemaKind, SchemaValidator};
use crate::types::{
    DatasetFixture, FileRecord, FixtureResult, OutputResult, ReplayReport, ReplaySummary,
    CONTRACT_VERSION,
};
use serde::Serialize;
use serde_json::Value;
use std::path::{Component, Path, PathBuf};

/// Hash input for `report_hash`.
///
/// CRITICAL: must serialize exactly like [`ReplayReport`] minus `report_hash`.
#[derive(Serialize)]
struct ReportHashInput<'a> {
    contract_version: &'a str,
    created_at: &'a str,
    receipt_path: &'a str,
    root: &'a str,
    schema_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema_error: Option<&'a str>,
    receipt_hash_match: bool,
    output_results: &'a [OutputResult],
    #[serde(skip_serializing_if = "Option::is_none")]
    dataset_fixture_result: Option<&'a FixtureResult>,
    summary: &'a ReplaySummary,
}

/// Compute the digest a report's `report_hash` must equal.
pub fn compute_report_hash(report: &ReplayReport) -> BluxResult<String> {
    hash_canonical(&ReportHashInput {
        contract_version: &report.contract_version,
        created_at: &report.created_at,
        receipt_path: &report.receipt_path,
        root: &report.root,
        schema_valid: report.schema_valid,
        schema_error: report.schema_error.as_deref(),
        receipt_hash_match: report.receipt_hash_match,
        output_results: &report.output_results,
        dataset_fixture_result: report.dataset_fixture_result.as_ref(),
        summary: &report.summary,
    })
}

/// Expected outputs of a receipt, sorted by `(path, hash)`.
///
/// Entries that are not file records are skipped; such a receipt has
/// already failed schema validation.
fn expected_outputs(receipt: &Value) -> Vec<FileRecord> {
    let entries = match receipt.get("output_hashes") {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(entries)) => entries,
        Some(other) => {
            tracing::warn!(value = %other, "output_hashes is not an array, no outputs verified");
            return Vec::new();
        }
    };

    let mut records: Vec<FileRecord> = entries
        .iter()
        .filter_map(|entry| match file_record_from_value(entry, "output_hashes") {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!(error = %err, "skipping unverifiable output entry");
                None
            }
        })
        .collect();
    records.sort();
    records
}

/// `root/rel` when `rel` is a relative path that cannot leave `root`.
///
/// Absolute paths and any `..` component are refused.
fn resolve_under(root: &Path, rel: &str) -> Option<PathBuf> {
    let rel_path = Path::new(rel);
    let confined = !rel.is_empty()
        && rel_path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    confined.then(|| root.join(rel_path))
}

fn verify_output(root: &Path, expected: FileRecord) -> BluxResult<OutputResult> {
    let Some(full) = resolve_under(root, &expected.path) else {
        tracing::warn!(path = %expected.path, "output path escapes the replay root");
        return Ok(OutputResult {
            path: expected.path,
            expected_hash: expected.hash,
            actual_hash: None,
            exists: false,
            hash_match: false,
        });
    };
    let exists = full.is_file();
    let actual_hash = if exists { Some(hash_file(&full)?) } else { None };
    let hash_match = actual_hash.as_deref() == Some(expected.hash.as_str());

    if !exists {
        tracing::warn!(path = %expected.path, "expected output is missing");
    } else if !hash_match {
        tracing::warn!(
            path = %expected.path,
            expected = %expected.hash,
            actual = actual_hash.as_deref().unwrap_or_default(),
            "output hash drifted"
        );
    }

    Ok(OutputResult {
        path: expected.path,
        expected_hash: expected.hash,
        actual_hash,
        exists,
        hash_match,
    })
}

fn declared_fixture(receipt: &Value) -> Option<DatasetFixture> {
    let value = receipt.get("dataset_fixture").filter(|v| !v.is_null())?;
    match DatasetFixture::try_from(value) {
        Ok(fixture) => Some(fixture),
        Err(err) => {
            tracing::warn!(error = %err, "skipping unverifiable dataset fixture");
            None
        }
    }
}

fn verify_fixture(root: &Path, fixture: DatasetFixture) -> BluxResult<FixtureResult> {
    let Some(path) = fixture.path else {
        return Ok(FixtureResult {
            id: fixture.id,
            path: None,
            expected_hash: fixture.hash,
            actual_hash: None,
            exists: None,
            hash_match: None,
        });
    };

    if let Some(declared) = fixture.hash.as_deref().filter(|h| !is_digest(h)) {
        tracing::warn!(id = %fixture.id, declared, "declared fixture hash is not a sha256 digest");
    }

    let full = resolve_under(root, &path);
    if full.is_none() {
        tracing::warn!(id = %fixture.id, %path, "dataset fixture path escapes the replay root");
    }
    let exists = full.as_deref().is_some_and(Path::is_file);
    let actual_hash = match &full {
        Some(full) if exists => Some(hash_file(full)?),
        _ => None,
    };
    let hash_match = fixture
        .hash
        .as_deref()
        .map(|expected| actual_hash.as_deref() == Some(expected));

    if !exists {
        tracing::warn!(id = %fixture.id, %path, "dataset fixture is missing");
    } else if hash_match == Some(false) {
        tracing::warn!(id = %fixture.id, %path, "dataset fixture hash drifted");
    }

    Ok(FixtureResult {
        id: fixture.id,
        path: Some(path),
        expected_hash: fixture.hash,
        actual_hash,
        exists: Some(exists),
        hash_match,
    })
}

/// Verify the receipt at `receipt_path` against the files under `root`.
///
/// The receipt hash is only recomputed for a schema-valid receipt; an
/// invalid one reports `receipt_hash_match: false` without the check.
pub fn build_replay_report(
    receipt_path: &Path,
    root: &Path,
    validator: &dyn SchemaValidator,
    config: &BuildConfig,
) -> BluxResult<ReplayReport> {
    let receipt = load_document(receipt_path)?;

    let schema_error = validator
        .validate(SchemaKind::ExecutionReceipt, &receipt)
        .err();
    let schema_valid = schema_error.is_none();
    if let Some(err) = &schema_error {
        tracing::warn!(error = %err, "receipt failed schema validation");
    }

    let receipt_hash_match = if schema_valid {
        let stored = receipt.get("receipt_hash").and_then(Value::as_str);
        let recomputed = hash_without(&receipt, "receipt_hash")?;
        let matched = stored == Some(recomputed.as_str());
        if !matched {
            tracing::warn!(%recomputed, stored = stored.unwrap_or_default(), "receipt hash mismatch");
        }
        matched
    } else {
        false
    };

    let output_results = expected_outputs(&receipt)
        .into_iter()
        .map(|expected| verify_output(root, expected))
        .collect::<BluxResult<Vec<_>>>()?;

    let dataset_fixture_result = match declared_fixture(&receipt) {
        Some(fixture) => Some(verify_fixture(root, fixture)?),
        None => None,
    };

    let missing_outputs = output_results.iter().filter(|r| !r.exists).count();
    let hash_mismatches = output_results
        .iter()
        .filter(|r| r.exists && !r.hash_match)
        .count();
    let (fixture_missing, fixture_hash_mismatches) = match &dataset_fixture_result {
        Some(result) => (
            usize::from(result.exists == Some(false)),
            usize::from(result.exists == Some(true) && result.hash_match == Some(false)),
        ),
        None => (0, 0),
    };

    let summary = ReplaySummary {
        ok: schema_valid
            && receipt_hash_match
            && missing_outputs == 0
            && hash_mismatches == 0
            && fixture_missing == 0
            && fixture_hash_mismatches == 0,
        total_outputs: output_results.len(),
        missing_outputs,
        hash_mismatches,
        fixture_missing,
        fixture_hash_mismatches,
    };

    let mut report = ReplayReport {
        contract_version: CONTRACT_VERSION.to_string(),
        created_at: config.timestamp(),
        receipt_path: receipt_path.display().to_string(),
        root: root.display().to_string(),
        schema_valid,
        schema_error,
        receipt_hash_match,
        output_results,
        dataset_fixture_result,
        summary,
        report_hash: String::new(),
    };
    report.report_hash = compute_report_hash(&report)?;

    tracing::debug!(
        ok = report.summary.ok,
        total_outputs = report.summary.total_outputs,
        report_hash = %report.report_hash,
        "built replay report"
    );
    Ok(report)
}
