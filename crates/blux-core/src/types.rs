//! Document types: snapshot, execution receipt, replay report.
//!
//! Field order in these structs is irrelevant to digests (canonical encoding
//! sorts keys) but follows the documented layout for readability of
//! non-canonical dumps.

use serde::{Deserialize, Serialize};

/// Contract version stamped on documents when the caller does not choose one.
pub const CONTRACT_VERSION: &str = "0.1";

/// Sentinel for metadata that was neither supplied nor configured.
pub const UNKNOWN: &str = "unknown";

/// One file consumed or produced by a run.
///
/// Ordering is `(path, hash, size)`, which is the flattened output-hash order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileRecord {
    /// POSIX-style path relative to the collection root.
    pub path: String,
    /// `sha256:` digest of the file contents.
    pub hash: String,
    /// Size in bytes (informational).
    #[serde(default)]
    pub size: u64,
}

impl FileRecord {
    pub fn new(path: impl Into<String>, hash: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            hash: hash.into(),
            size,
        }
    }
}

/// A named group of produced files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutputBundle {
    pub bundle_id: String,
    /// Sorted by path.
    #[serde(default)]
    pub files: Vec<FileRecord>,
}

/// A diff applied to a base input plus its materialized result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatchBundle {
    pub bundle_id: String,
    /// Path of the input the patches apply to.
    pub base_path: String,
    /// Sorted by path.
    #[serde(default)]
    pub patches: Vec<FileRecord>,
    /// Sorted by path.
    #[serde(default)]
    pub outputs: Vec<FileRecord>,
}

/// Record of the files consumed and produced by a run, self-hashed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    pub contract_version: String,
    pub created_at: String,
    pub inputs: Vec<FileRecord>,
    pub outputs: Vec<FileRecord>,
    #[serde(default)]
    pub output_bundles: Vec<OutputBundle>,
    #[serde(default)]
    pub patch_bundles: Vec<PatchBundle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// Digest of every other field.
    pub snapshot_hash: String,
}

/// Recognized agent-header keys, in declaration order.
pub const AGENT_HEADER_KEYS: [&str; 9] = [
    "input_hash",
    "model_version",
    "contract_version",
    "requested_model_version",
    "resolved_model_version",
    "schema_version",
    "profile_id",
    "profile_version",
    "device",
];

/// Agent/run metadata bound into a receipt. Unsupplied values are `"unknown"`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentHeaders {
    pub input_hash: String,
    pub model_version: String,
    pub contract_version: String,
    pub requested_model_version: String,
    pub resolved_model_version: String,
    pub schema_version: String,
    pub profile_id: String,
    pub profile_version: String,
    pub device: String,
}

impl Default for AgentHeaders {
    fn default() -> Self {
        Self {
            input_hash: UNKNOWN.into(),
            model_version: UNKNOWN.into(),
            contract_version: UNKNOWN.into(),
            requested_model_version: UNKNOWN.into(),
            resolved_model_version: UNKNOWN.into(),
            schema_version: UNKNOWN.into(),
            profile_id: UNKNOWN.into(),
            profile_version: UNKNOWN.into(),
            device: UNKNOWN.into(),
        }
    }
}

impl AgentHeaders {
    /// Mutable slot for a recognized key; `None` for anything else.
    pub fn slot_mut(&mut self, key: &str) -> Option<&mut String> {
        Some(match key {
            "input_hash" => &mut self.input_hash,
            "model_version" => &mut self.model_version,
            "contract_version" => &mut self.contract_version,
            "requested_model_version" => &mut self.requested_model_version,
            "resolved_model_version" => &mut self.resolved_model_version,
            "schema_version" => &mut self.schema_version,
            "profile_id" => &mut self.profile_id,
            "profile_version" => &mut self.profile_version,
            "device" => &mut self.device,
            _ => return None,
        })
    }
}

/// One step of a run graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunStep {
    pub id: String,
    pub agent: String,
    pub input_ref: String,
    pub output_ref: String,
    pub status: String,
}

/// Steps of a run, sorted by id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunGraph {
    pub steps: Vec<RunStep>,
}

/// Reference to a policy or reasoning pack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackRef {
    pub id: String,
    pub version: String,
}

impl PackRef {
    /// A pack without both an id and a version is treated as not supplied.
    pub fn is_empty(&self) -> bool {
        self.id.is_empty() || self.version.is_empty()
    }
}

/// External corpus file the run depended on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatasetFixture {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl DatasetFixture {
    /// A fixture without an id is treated as not supplied.
    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }
}

/// Snapshot binding inside a receipt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotRef {
    pub hash: String,
    /// Contract version of the snapshot; null when the snapshot carried none.
    pub contract_version: Option<String>,
}

/// Which field each receipt collection is sorted by.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderingDeclaration {
    pub outputs: String,
    pub output_bundles: String,
    pub patch_bundles: String,
    pub output_hashes: String,
    pub run_graph_steps: String,
}

impl Default for OrderingDeclaration {
    fn default() -> Self {
        Self {
            outputs: "path".into(),
            output_bundles: "bundle_id".into(),
            patch_bundles: "bundle_id".into(),
            output_hashes: "path".into(),
            run_graph_steps: "id".into(),
        }
    }
}

/// Receipt binding a snapshot digest to run metadata, self-hashed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionReceipt {
    pub contract_version: String,
    pub created_at: String,
    pub agent: AgentHeaders,
    pub snapshot: SnapshotRef,
    pub snapshot_hash: String,
    /// Every output record of the snapshot, sorted by `(path, hash)`.
    pub output_hashes: Vec<FileRecord>,
    pub ordering: OrderingDeclaration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_pack: Option<PackRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_pack: Option<PackRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_graph: Option<RunGraph>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_fixture: Option<DatasetFixture>,
    /// Digest of every other field.
    pub receipt_hash: String,
}

/// Verification outcome for one expected output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutputResult {
    pub path: String,
    pub expected_hash: String,
    /// Absent when the file does not exist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_hash: Option<String>,
    pub exists: bool,
    pub hash_match: bool,
}

/// Verification outcome for the dataset fixture.
///
/// `None` fields serialize as `null`: indeterminate rather than failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FixtureResult {
    pub id: String,
    pub path: Option<String>,
    pub expected_hash: Option<String>,
    pub actual_hash: Option<String>,
    pub exists: Option<bool>,
    pub hash_match: Option<bool>,
}

/// Tallies over a replay; `ok` is the single pass/fail signal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplaySummary {
    pub ok: bool,
    pub total_outputs: usize,
    pub missing_outputs: usize,
    pub hash_mismatches: usize,
    pub fixture_missing: usize,
    pub fixture_hash_mismatches: usize,
}

/// Result of re-verifying a receipt against a filesystem root, self-hashed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplayReport {
    pub contract_version: String,
    pub created_at: String,
    pub receipt_path: String,
    pub root: String,
    pub schema_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_error: Option<String>,
    pub receipt_hash_match: bool,
    pub output_results: Vec<OutputResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_fixture_result: Option<FixtureResult>,
    pub summary: ReplaySummary,
    /// Digest of every other field.
    pub report_hash: String,
}
