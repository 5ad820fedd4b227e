//! Snapshot builder.
//!
//! A snapshot records the files a run consumed and produced. Its
//! `snapshot_hash` is computed over every other field, then appended.

use crate::config::BuildConfig;
use crate::crypto::digest::{hash_canonical, hash_file};
use crate::error::{BluxError, BluxResult};
use crate::normalize::{
    normalize_files, normalize_output_bundles, normalize_patch_bundles, RecordShape,
};
use crate::types::{FileRecord, OutputBundle, PatchBundle, Snapshot, CONTRACT_VERSION};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Caller input for [`build_snapshot`]. Collections may be supplied in any order.
#[derive(Debug, Clone, Default)]
pub struct SnapshotInput {
    pub inputs: Vec<RecordShape<FileRecord>>,
    pub outputs: Vec<RecordShape<FileRecord>>,
    pub output_bundles: Vec<RecordShape<OutputBundle>>,
    pub patch_bundles: Vec<RecordShape<PatchBundle>>,
    /// Falls back to [`BuildConfig::timestamp`] when absent or empty.
    pub created_at: Option<String>,
    /// Falls back to [`CONTRACT_VERSION`].
    pub contract_version: Option<String>,
    pub profile_id: Option<String>,
    pub profile_version: Option<String>,
    pub device: Option<String>,
}

impl SnapshotInput {
    pub fn new<I, O>(inputs: I, outputs: O) -> Self
    where
        I: IntoIterator,
        I::Item: Into<RecordShape<FileRecord>>,
        O: IntoIterator,
        O::Item: Into<RecordShape<FileRecord>>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            outputs: outputs.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_output_bundles<B>(mut self, bundles: B) -> Self
    where
        B: IntoIterator,
        B::Item: Into<RecordShape<OutputBundle>>,
    {
        self.output_bundles = bundles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_patch_bundles<B>(mut self, bundles: B) -> Self
    where
        B: IntoIterator,
        B::Item: Into<RecordShape<PatchBundle>>,
    {
        self.patch_bundles = bundles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_created_at(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = Some(created_at.into());
        self
    }

    pub fn with_contract_version(mut self, version: impl Into<String>) -> Self {
        self.contract_version = Some(version.into());
        self
    }

    pub fn with_profile(
        mut self,
        profile_id: impl Into<String>,
        profile_version: impl Into<String>,
        device: impl Into<String>,
    ) -> Self {
        self.profile_id = Some(profile_id.into());
        self.profile_version = Some(profile_version.into());
        self.device = Some(device.into());
        self
    }
}

/// Hash input for `snapshot_hash`.
///
/// CRITICAL: every field of [`Snapshot`] except `snapshot_hash`, serialized
/// exactly as the snapshot serializes it.
#[derive(Serialize)]
struct SnapshotHashInput<'a> {
    contract_version: &'a str,
    created_at: &'a str,
    inputs: &'a [FileRecord],
    outputs: &'a [FileRecord],
    output_bundles: &'a [OutputBundle],
    patch_bundles: &'a [PatchBundle],
    #[serde(skip_serializing_if = "Option::is_none")]
    profile_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile_version: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    device: Option<&'a str>,
}

/// Compute the digest a snapshot's `snapshot_hash` must equal.
pub fn compute_snapshot_hash(snapshot: &Snapshot) -> BluxResult<String> {
    hash_canonical(&SnapshotHashInput {
        contract_version: &snapshot.contract_version,
        created_at: &snapshot.created_at,
        inputs: &snapshot.inputs,
        outputs: &snapshot.outputs,
        output_bundles: &snapshot.output_bundles,
        patch_bundles: &snapshot.patch_bundles,
        profile_id: snapshot.profile_id.as_deref(),
        profile_version: snapshot.profile_version.as_deref(),
        device: snapshot.device.as_deref(),
    })
}

/// Build a self-hashing snapshot. Only malformed records fail.
pub fn build_snapshot(input: SnapshotInput, config: &BuildConfig) -> BluxResult<Snapshot> {
    let created_at = input
        .created_at
        .filter(|ts| !ts.is_empty())
        .unwrap_or_else(|| config.timestamp());

    let mut snapshot = Snapshot {
        contract_version: input
            .contract_version
            .unwrap_or_else(|| CONTRACT_VERSION.to_string()),
        created_at,
        inputs: normalize_files("inputs", input.inputs)?,
        outputs: normalize_files("outputs", input.outputs)?,
        output_bundles: normalize_output_bundles(input.output_bundles)?,
        patch_bundles: normalize_patch_bundles(input.patch_bundles)?,
        profile_id: input.profile_id,
        profile_version: input.profile_version,
        device: input.device,
        snapshot_hash: String::new(),
    };
    snapshot.snapshot_hash = compute_snapshot_hash(&snapshot)?;

    tracing::debug!(
        inputs = snapshot.inputs.len(),
        outputs = snapshot.outputs.len(),
        output_bundles = snapshot.output_bundles.len(),
        patch_bundles = snapshot.patch_bundles.len(),
        snapshot_hash = %snapshot.snapshot_hash,
        "built snapshot"
    );
    Ok(snapshot)
}

/// Build a snapshot from an input and an output location on disk.
///
/// Each location may be a directory (walked recursively) or a single file.
pub fn build_snapshot_from_dirs(
    input_dir: &Path,
    output_dir: &Path,
    config: &BuildConfig,
) -> BluxResult<Snapshot> {
    let inputs = collect_files(input_dir)?;
    let outputs = collect_files(output_dir)?;
    build_snapshot(SnapshotInput::new(inputs, outputs), config)
}

/// Hash every file under `root`, paths relative to `root` in POSIX form, sorted.
///
/// A file `root` yields one record relative to its parent directory.
pub fn collect_files(root: &Path) -> BluxResult<Vec<FileRecord>> {
    let root = root.canonicalize().map_err(|e| BluxError::io(root, e))?;
    let (base, mut paths) = if root.is_file() {
        let base = root.parent().map(Path::to_path_buf).unwrap_or_default();
        (base, vec![root.clone()])
    } else {
        let mut paths = Vec::new();
        collect_files_recursive(&root, &mut paths)?;
        (root.clone(), paths)
    };
    paths.sort();

    let mut records = Vec::with_capacity(paths.len());
    for path in &paths {
        let size = std::fs::metadata(path)
            .map_err(|e| BluxError::io(path, e))?
            .len();
        records.push(FileRecord {
            path: posix_relative(path, &base)?,
            hash: hash_file(path)?,
            size,
        });
    }
    records.sort_by(|a, b| a.path.cmp(&b.path));

    tracing::debug!(root = %root.display(), files = records.len(), "collected files");
    Ok(records)
}

fn collect_files_recursive(dir: &Path, out: &mut Vec<PathBuf>) -> BluxResult<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| BluxError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| BluxError::io(dir, e))?;
        let path = entry.path();
        let ft = entry.file_type().map_err(|e| BluxError::io(&path, e))?;
        if ft.is_dir() {
            collect_files_recursive(&path, out)?;
        } else if path.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

/// Non-UTF-8 names are refused: a lossy conversion could map two files to one path.
fn posix_relative(path: &Path, base: &Path) -> BluxResult<String> {
    let rel = path.strip_prefix(base).unwrap_or(path);
    let parts = rel
        .components()
        .map(|c| {
            c.as_os_str().to_str().ok_or_else(|| {
                BluxError::malformed("files", format!("non-UTF-8 path {}", path.display()))
            })
        })
        .collect::<BluxResult<Vec<_>>>()?;
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::digest::{hash_bytes, hash_without};
    use serde_json::json;

    const TS: &str = "2024-01-01T00:00:00Z";

    fn config() -> BuildConfig {
        BuildConfig::with_timestamp(TS)
    }

    #[test]
    fn test_snapshot_hash_excludes_itself() {
        let snapshot = build_snapshot(
            SnapshotInput::new(
                vec![json!({"path": "inputs/data.txt", "hash": hash_bytes(b"data"), "size": 12})],
                vec![json!({"path": "outputs/result.json", "hash": hash_bytes(b"result"), "size": 34})],
            ),
            &config(),
        )
        .unwrap();

        let doc = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(
            hash_without(&doc, "snapshot_hash").unwrap(),
            snapshot.snapshot_hash
        );
    }

    #[test]
    fn test_profile_fields_covered_by_hash() {
        let base = SnapshotInput::new(Vec::<FileRecord>::new(), Vec::<FileRecord>::new());
        let plain = build_snapshot(base.clone(), &config()).unwrap();
        let profiled =
            build_snapshot(base.with_profile("profile-basic", "2024.04", "cpu"), &config())
                .unwrap();

        assert_ne!(plain.snapshot_hash, profiled.snapshot_hash);
        let doc = serde_json::to_value(&profiled).unwrap();
        assert_eq!(doc["device"], "cpu");
        assert_eq!(
            hash_without(&doc, "snapshot_hash").unwrap(),
            profiled.snapshot_hash
        );
        assert!(serde_json::to_value(&plain)
            .unwrap()
            .get("profile_id")
            .is_none());
    }

    #[test]
    fn test_explicit_created_at_wins_over_config() {
        let snapshot = build_snapshot(
            SnapshotInput::new(Vec::<FileRecord>::new(), Vec::<FileRecord>::new())
                .with_created_at("1999-12-31T23:59:59Z")
                .with_contract_version("9.9"),
            &config(),
        )
        .unwrap();
        assert_eq!(snapshot.created_at, "1999-12-31T23:59:59Z");
        assert_eq!(snapshot.contract_version, "9.9");
    }

    #[test]
    fn test_collect_files_walks_nested_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub/deeper")).unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("sub/deeper/a.txt"), "a").unwrap();

        let records = collect_files(dir.path()).unwrap();
        let paths: Vec<_> = records.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["b.txt", "sub/deeper/a.txt"]);
        assert_eq!(records[1].hash, hash_bytes(b"a"));
        assert_eq!(records[1].size, 1);
    }

    #[test]
    fn test_collect_single_file_relative_to_parent() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("only.json");
        std::fs::write(&file, "{}").unwrap();

        let records = collect_files(&file).unwrap();
        assert_eq!(records, vec![FileRecord::new("only.json", hash_bytes(b"{}"), 2)]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_collect_rejects_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(OsStr::from_bytes(b"bad\xff.txt")), "x").unwrap();
        std::fs::write(dir.path().join(OsStr::from_bytes(b"bad\xfe.txt")), "y").unwrap();

        let err = collect_files(dir.path()).unwrap_err();
        assert!(err.is_malformed_record(), "{err}");
        assert!(err.to_string().contains("non-UTF-8"), "{err}");
    }

    #[test]
    fn test_collect_missing_root_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = collect_files(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, BluxError::Io { .. }));
    }
}
