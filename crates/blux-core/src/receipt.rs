//! Execution receipt builder.
//!
//! A receipt binds a snapshot digest to the agent/run metadata of the run
//! that produced it, plus the flattened list of every output the snapshot
//! declared. `receipt_hash` covers every other field.

use crate::config::BuildConfig;
use crate::crypto::digest::{hash_canonical, hash_without};
use crate::document::load_document;
use crate::error::{BluxError, BluxResult};
use crate::normalize::{
    array_field, flatten_output_hashes, normalize_files, normalize_output_bundles,
    normalize_patch_bundles, normalize_run_steps, RecordShape,
};
use crate::types::{
    AgentHeaders, DatasetFixture, ExecutionReceipt, FileRecord, OrderingDeclaration, PackRef,
    RunGraph, RunStep, Snapshot, SnapshotRef, CONTRACT_VERSION,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Optional receipt metadata. Every field may be left at its default.
#[derive(Debug, Clone, Default)]
pub struct ReceiptOptions {
    /// Caller-supplied agent headers; unrecognized keys are ignored.
    pub agent_headers: BTreeMap<String, String>,
    /// Falls back to [`BuildConfig::timestamp`] when absent or empty.
    pub created_at: Option<String>,
    /// Falls back to [`CONTRACT_VERSION`].
    pub contract_version: Option<String>,
    pub policy_pack: Option<PackRef>,
    pub reasoning_pack: Option<PackRef>,
    /// Run-graph steps; the `run_graph` section is omitted when empty.
    pub run_steps: Vec<RecordShape<RunStep>>,
    pub dataset_fixture: Option<DatasetFixture>,
}

impl ReceiptOptions {
    pub fn with_agent_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.agent_headers.insert(key.into(), value.into());
        self
    }

    pub fn with_created_at(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = Some(created_at.into());
        self
    }

    pub fn with_policy_pack(mut self, pack: PackRef) -> Self {
        self.policy_pack = Some(pack);
        self
    }

    pub fn with_reasoning_pack(mut self, pack: PackRef) -> Self {
        self.reasoning_pack = Some(pack);
        self
    }

    pub fn with_run_steps<S>(mut self, steps: S) -> Self
    where
        S: IntoIterator,
        S::Item: Into<RecordShape<RunStep>>,
    {
        self.run_steps = steps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_dataset_fixture(mut self, fixture: DatasetFixture) -> Self {
        self.dataset_fixture = Some(fixture);
        self
    }
}

/// Hash input for `receipt_hash`.
///
/// CRITICAL: must serialize exactly like [`ExecutionReceipt`] minus `receipt_hash`.
#[derive(Serialize)]
struct ReceiptHashInput<'a> {
    contract_version: &'a str,
    created_at: &'a str,
    agent: &'a AgentHeaders,
    snapshot: &'a SnapshotRef,
    snapshot_hash: &'a str,
    output_hashes: &'a [FileRecord],
    ordering: &'a OrderingDeclaration,
    #[serde(skip_serializing_if = "Option::is_none")]
    policy_pack: Option<&'a PackRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_pack: Option<&'a PackRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    run_graph: Option<&'a RunGraph>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dataset_fixture: Option<&'a DatasetFixture>,
}

/// Compute the digest a receipt's `receipt_hash` must equal.
pub fn compute_receipt_hash(receipt: &ExecutionReceipt) -> BluxResult<String> {
    hash_canonical(&ReceiptHashInput {
        contract_version: &receipt.contract_version,
        created_at: &receipt.created_at,
        agent: &receipt.agent,
        snapshot: &receipt.snapshot,
        snapshot_hash: &receipt.snapshot_hash,
        output_hashes: &receipt.output_hashes,
        ordering: &receipt.ordering,
        policy_pack: receipt.policy_pack.as_ref(),
        reasoning_pack: receipt.reasoning_pack.as_ref(),
        run_graph: receipt.run_graph.as_ref(),
        dataset_fixture: receipt.dataset_fixture.as_ref(),
    })
}

/// The snapshot's own `snapshot_hash`, or a recomputation when it is absent or empty.
fn resolve_snapshot_hash(snapshot: &Value) -> BluxResult<String> {
    match snapshot.get("snapshot_hash").and_then(Value::as_str) {
        Some(hash) if !hash.is_empty() => Ok(hash.to_string()),
        _ => {
            let hash = hash_without(snapshot, "snapshot_hash")?;
            tracing::debug!(%hash, "snapshot carries no hash, recomputed");
            Ok(hash)
        }
    }
}

fn output_hashes_of(snapshot: &Value) -> BluxResult<Vec<FileRecord>> {
    let outputs = normalize_files("outputs", array_field(snapshot, "outputs", "outputs")?)?;
    let output_bundles =
        normalize_output_bundles(array_field(snapshot, "output_bundles", "output_bundles")?)?;
    let patch_bundles =
        normalize_patch_bundles(array_field(snapshot, "patch_bundles", "patch_bundles")?)?;
    Ok(flatten_output_hashes(&outputs, &output_bundles, &patch_bundles))
}

/// Build a self-hashing receipt for a snapshot document.
///
/// A pure projection of its arguments: identical snapshot, options and
/// configuration always yield byte-identical receipts.
pub fn build_receipt(
    snapshot: &Value,
    options: ReceiptOptions,
    config: &BuildConfig,
) -> BluxResult<ExecutionReceipt> {
    if !snapshot.is_object() {
        return Err(BluxError::malformed(
            "snapshot",
            format!("expected object, got {snapshot}"),
        ));
    }

    let snapshot_hash = resolve_snapshot_hash(snapshot)?;
    let steps = normalize_run_steps(options.run_steps)?;

    let mut receipt = ExecutionReceipt {
        contract_version: options
            .contract_version
            .unwrap_or_else(|| CONTRACT_VERSION.to_string()),
        created_at: options
            .created_at
            .filter(|ts| !ts.is_empty())
            .unwrap_or_else(|| config.timestamp()),
        agent: config.resolve_agent_headers(&options.agent_headers),
        snapshot: SnapshotRef {
            hash: snapshot_hash.clone(),
            contract_version: snapshot
                .get("contract_version")
                .and_then(Value::as_str)
                .map(str::to_string),
        },
        snapshot_hash,
        output_hashes: output_hashes_of(snapshot)?,
        ordering: OrderingDeclaration::default(),
        policy_pack: options.policy_pack.filter(|p| !p.is_empty()),
        reasoning_pack: options.reasoning_pack.filter(|p| !p.is_empty()),
        run_graph: (!steps.is_empty()).then_some(RunGraph { steps }),
        dataset_fixture: options.dataset_fixture.filter(|f| !f.is_empty()),
        receipt_hash: String::new(),
    };
    receipt.receipt_hash = compute_receipt_hash(&receipt)?;

    tracing::debug!(
        snapshot_hash = %receipt.snapshot_hash,
        output_hashes = receipt.output_hashes.len(),
        receipt_hash = %receipt.receipt_hash,
        "built receipt"
    );
    Ok(receipt)
}

/// [`build_receipt`] over a typed snapshot.
pub fn build_receipt_for_snapshot(
    snapshot: &Snapshot,
    options: ReceiptOptions,
    config: &BuildConfig,
) -> BluxResult<ExecutionReceipt> {
    let document =
        serde_json::to_value(snapshot).map_err(|e| BluxError::Canonical(e.to_string()))?;
    build_receipt(&document, options, config)
}

/// Read a snapshot document and build its receipt with default options.
pub fn build_receipt_from_snapshot_file(
    path: &Path,
    config: &BuildConfig,
) -> BluxResult<ExecutionReceipt> {
    let snapshot = load_document(path)?;
    build_receipt(&snapshot, ReceiptOptions::default(), config)
}
