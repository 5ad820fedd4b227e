//! Record normalization.
//!
//! Turns loosely-shaped caller input into the concrete, sorted records every
//! digest is computed over. Output never depends on input order (duplicate
//! file paths aside, where the last record wins).
//!
//! Accepted shapes are narrow: a typed record, or a JSON object carrying the
//! record's fields. Anything else is a [`BluxError::MalformedRecord`].

use crate::error::{BluxError, BluxResult};
use crate::types::{
    DatasetFixture, FileRecord, OutputBundle, PackRef, PatchBundle, RunStep, UNKNOWN,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Either an already-typed record or a JSON mapping with the record's fields.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordShape<T> {
    Typed(T),
    Mapping(Value),
}

macro_rules! record_shape_from {
    ($($ty:ty),*) => {$(
        impl From<$ty> for RecordShape<$ty> {
            fn from(record: $ty) -> Self {
                RecordShape::Typed(record)
            }
        }

        impl From<Value> for RecordShape<$ty> {
            fn from(value: Value) -> Self {
                RecordShape::Mapping(value)
            }
        }

        impl From<&Value> for RecordShape<$ty> {
            fn from(value: &Value) -> Self {
                RecordShape::Mapping(value.clone())
            }
        }
    )*};
}

record_shape_from!(FileRecord, OutputBundle, PatchBundle, RunStep);

fn as_object<'a>(value: &'a Value, collection: &'static str) -> BluxResult<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| BluxError::malformed(collection, format!("expected object, got {value}")))
}

fn required_str(
    map: &Map<String, Value>,
    field: &str,
    collection: &'static str,
) -> BluxResult<String> {
    match map.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(BluxError::malformed(
            collection,
            format!("field '{field}' must be a string, got {other}"),
        )),
        None => Err(BluxError::malformed(
            collection,
            format!("missing field '{field}'"),
        )),
    }
}

fn optional_str(
    map: &Map<String, Value>,
    field: &str,
    collection: &'static str,
) -> BluxResult<Option<String>> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(BluxError::malformed(
            collection,
            format!("field '{field}' must be a string, got {other}"),
        )),
    }
}

/// Array stored under `key` of a document; absent or null reads as empty.
pub fn array_field<'a>(
    document: &'a Value,
    key: &str,
    collection: &'static str,
) -> BluxResult<&'a [Value]> {
    match document.get(key) {
        None | Some(Value::Null) => Ok(&[][..]),
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(other) => Err(BluxError::malformed(
            collection,
            format!("field '{key}' must be an array, got {other}"),
        )),
    }
}

/// Build a [`FileRecord`] from a mapping with `path`, `hash` and optional `size`.
pub fn file_record_from_value(value: &Value, collection: &'static str) -> BluxResult<FileRecord> {
    let map = as_object(value, collection)?;
    let path = required_str(map, "path", collection)?;
    let hash = required_str(map, "hash", collection)?;
    let size = match map.get("size") {
        None | Some(Value::Null) => 0,
        Some(v) => v.as_u64().ok_or_else(|| {
            BluxError::malformed(
                collection,
                format!("field 'size' of '{path}' must be a non-negative integer, got {v}"),
            )
        })?,
    };
    Ok(FileRecord { path, hash, size })
}

fn file_record(shape: RecordShape<FileRecord>, collection: &'static str) -> BluxResult<FileRecord> {
    match shape {
        RecordShape::Typed(record) => Ok(record),
        RecordShape::Mapping(value) => file_record_from_value(&value, collection),
    }
}

/// Normalize a file collection: sorted ascending by path, last record wins per path.
pub fn normalize_files<I, R>(collection: &'static str, records: I) -> BluxResult<Vec<FileRecord>>
where
    I: IntoIterator<Item = R>,
    R: Into<RecordShape<FileRecord>>,
{
    let mut by_path = BTreeMap::new();
    for record in records {
        let record = file_record(record.into(), collection)?;
        by_path.insert(record.path.clone(), record);
    }
    Ok(by_path.into_values().collect())
}

fn files_of(
    map: &Map<String, Value>,
    key: &str,
    collection: &'static str,
) -> BluxResult<Vec<FileRecord>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => normalize_files(collection, items),
        Some(other) => Err(BluxError::malformed(
            collection,
            format!("field '{key}' must be an array, got {other}"),
        )),
    }
}

fn output_bundle(shape: RecordShape<OutputBundle>) -> BluxResult<OutputBundle> {
    const COLLECTION: &str = "output_bundles";
    match shape {
        RecordShape::Typed(bundle) => Ok(OutputBundle {
            files: normalize_files(COLLECTION, bundle.files)?,
            bundle_id: bundle.bundle_id,
        }),
        RecordShape::Mapping(value) => {
            let map = as_object(&value, COLLECTION)?;
            Ok(OutputBundle {
                bundle_id: required_str(map, "bundle_id", COLLECTION)?,
                files: files_of(map, "files", COLLECTION)?,
            })
        }
    }
}

/// Normalize output bundles: sorted by bundle_id, files sorted by path.
pub fn normalize_output_bundles<I, R>(bundles: I) -> BluxResult<Vec<OutputBundle>>
where
    I: IntoIterator<Item = R>,
    R: Into<RecordShape<OutputBundle>>,
{
    let mut by_id = BTreeMap::new();
    for bundle in bundles {
        let bundle = output_bundle(bundle.into())?;
        by_id.insert(bundle.bundle_id.clone(), bundle);
    }
    Ok(by_id.into_values().collect())
}

fn patch_bundle(shape: RecordShape<PatchBundle>) -> BluxResult<PatchBundle> {
    const COLLECTION: &str = "patch_bundles";
    match shape {
        RecordShape::Typed(bundle) => Ok(PatchBundle {
            patches: normalize_files(COLLECTION, bundle.patches)?,
            outputs: normalize_files(COLLECTION, bundle.outputs)?,
            bundle_id: bundle.bundle_id,
            base_path: bundle.base_path,
        }),
        RecordShape::Mapping(value) => {
            let map = as_object(&value, COLLECTION)?;
            Ok(PatchBundle {
                bundle_id: required_str(map, "bundle_id", COLLECTION)?,
                base_path: required_str(map, "base_path", COLLECTION)?,
                patches: files_of(map, "patches", COLLECTION)?,
                outputs: files_of(map, "outputs", COLLECTION)?,
            })
        }
    }
}

/// Normalize patch bundles: sorted by bundle_id, patches and outputs sorted by path.
pub fn normalize_patch_bundles<I, R>(bundles: I) -> BluxResult<Vec<PatchBundle>>
where
    I: IntoIterator<Item = R>,
    R: Into<RecordShape<PatchBundle>>,
{
    let mut by_id = BTreeMap::new();
    for bundle in bundles {
        let bundle = patch_bundle(bundle.into())?;
        by_id.insert(bundle.bundle_id.clone(), bundle);
    }
    Ok(by_id.into_values().collect())
}

/// Flatten every output record of a snapshot into one list sorted by `(path, hash)`.
///
/// Records from different collections may share a path; all are kept.
pub fn flatten_output_hashes(
    outputs: &[FileRecord],
    output_bundles: &[OutputBundle],
    patch_bundles: &[PatchBundle],
) -> Vec<FileRecord> {
    let mut flat: Vec<FileRecord> = outputs
        .iter()
        .chain(output_bundles.iter().flat_map(|b| b.files.iter()))
        .chain(
            patch_bundles
                .iter()
                .flat_map(|b| b.patches.iter().chain(b.outputs.iter())),
        )
        .cloned()
        .collect();
    flat.sort();
    flat
}

impl TryFrom<&Value> for RunStep {
    type Error = BluxError;

    fn try_from(value: &Value) -> BluxResult<Self> {
        const COLLECTION: &str = "run_graph";
        let map = as_object(value, COLLECTION)?;
        let or_unknown = |field: &str| -> BluxResult<String> {
            Ok(optional_str(map, field, COLLECTION)?.unwrap_or_else(|| UNKNOWN.to_string()))
        };
        Ok(RunStep {
            id: required_str(map, "id", COLLECTION)?,
            agent: or_unknown("agent")?,
            input_ref: or_unknown("input_ref")?,
            output_ref: or_unknown("output_ref")?,
            status: or_unknown("status")?,
        })
    }
}

/// Normalize run-graph steps: sorted by id (remaining fields break ties).
pub fn normalize_run_steps<I, R>(steps: I) -> BluxResult<Vec<RunStep>>
where
    I: IntoIterator<Item = R>,
    R: Into<RecordShape<RunStep>>,
{
    let mut steps = steps
        .into_iter()
        .map(|s| match s.into() {
            RecordShape::Typed(step) => Ok(step),
            RecordShape::Mapping(value) => RunStep::try_from(&value),
        })
        .collect::<BluxResult<Vec<_>>>()?;
    steps.sort_by(|a, b| {
        (&a.id, &a.agent, &a.input_ref, &a.output_ref, &a.status).cmp(&(
            &b.id,
            &b.agent,
            &b.input_ref,
            &b.output_ref,
            &b.status,
        ))
    });
    Ok(steps)
}

impl TryFrom<&Value> for PackRef {
    type Error = BluxError;

    fn try_from(value: &Value) -> BluxResult<Self> {
        const COLLECTION: &str = "pack";
        let map = as_object(value, COLLECTION)?;
        Ok(PackRef {
            id: required_str(map, "id", COLLECTION)?,
            version: required_str(map, "version", COLLECTION)?,
        })
    }
}

impl TryFrom<&Value> for DatasetFixture {
    type Error = BluxError;

    fn try_from(value: &Value) -> BluxResult<Self> {
        const COLLECTION: &str = "dataset_fixture";
        let map = as_object(value, COLLECTION)?;
        Ok(DatasetFixture {
            id: required_str(map, "id", COLLECTION)?,
            hash: optional_str(map, "hash", COLLECTION)?,
            path: optional_str(map, "path", COLLECTION)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mixed_shapes_normalize_to_sorted_records() {
        let records: Vec<RecordShape<FileRecord>> = vec![
            json!({"path": "z.txt", "hash": "sha256:02", "size": 4}).into(),
            FileRecord::new("a.txt", "sha256:01", 1).into(),
        ];
        let out = normalize_files("inputs", records).unwrap();
        assert_eq!(
            out,
            vec![
                FileRecord::new("a.txt", "sha256:01", 1),
                FileRecord::new("z.txt", "sha256:02", 4),
            ]
        );
    }

    #[test]
    fn test_missing_size_defaults_to_zero() {
        let out = normalize_files("outputs", vec![json!({"path": "a", "hash": "sha256:00"})])
            .unwrap();
        assert_eq!(out[0].size, 0);
    }

    #[test]
    fn test_extra_fields_dropped() {
        let out = normalize_files(
            "outputs",
            vec![json!({"path": "a", "hash": "sha256:00", "mtime": 123})],
        )
        .unwrap();
        assert_eq!(
            serde_json::to_value(&out[0]).unwrap(),
            json!({"path": "a", "hash": "sha256:00", "size": 0})
        );
    }

    #[test]
    fn test_permutation_invariant() {
        let a = json!({"path": "a", "hash": "sha256:0a", "size": 1});
        let b = json!({"path": "b", "hash": "sha256:0b", "size": 2});
        let c = json!({"path": "c/d", "hash": "sha256:0c", "size": 3});

        let forward = normalize_files("inputs", vec![a.clone(), b.clone(), c.clone()]).unwrap();
        let shuffled = normalize_files("inputs", vec![c, a, b]).unwrap();
        assert_eq!(forward, shuffled);
    }

    #[test]
    fn test_duplicate_path_last_write_wins() {
        let out = normalize_files(
            "inputs",
            vec![
                json!({"path": "a", "hash": "sha256:old"}),
                json!({"path": "a", "hash": "sha256:new"}),
            ],
        )
        .unwrap();
        assert_eq!(out, vec![FileRecord::new("a", "sha256:new", 0)]);
    }

    #[test]
    fn test_missing_hash_is_structural_error() {
        let err = normalize_files("outputs", vec![json!({"path": "a"})]).unwrap_err();
        assert!(err.is_malformed_record());
        assert!(err.to_string().contains("hash"), "{err}");
    }

    #[test]
    fn test_non_object_rejected() {
        let err = normalize_files("inputs", vec![json!("a.txt")]).unwrap_err();
        assert!(err.is_malformed_record());
    }

    #[test]
    fn test_negative_size_rejected() {
        let err =
            normalize_files("inputs", vec![json!({"path": "a", "hash": "sha256:0", "size": -1})])
                .unwrap_err();
        assert!(err.is_malformed_record());
    }

    #[test]
    fn test_bundles_sorted_by_id_and_files_by_path() {
        let bundles = normalize_output_bundles(vec![
            json!({"bundle_id": "zeta", "files": [
                {"path": "z/2.txt", "hash": "sha256:2"},
                {"path": "z/1.txt", "hash": "sha256:1"}
            ]}),
            json!({"bundle_id": "alpha"}),
        ])
        .unwrap();
        assert_eq!(bundles[0].bundle_id, "alpha");
        assert!(bundles[0].files.is_empty());
        assert_eq!(bundles[1].files[0].path, "z/1.txt");
    }

    #[test]
    fn test_typed_bundle_files_resorted() {
        let bundle = OutputBundle {
            bundle_id: "b".into(),
            files: vec![
                FileRecord::new("2", "sha256:2", 0),
                FileRecord::new("1", "sha256:1", 0),
            ],
        };
        let out = normalize_output_bundles(vec![bundle]).unwrap();
        assert_eq!(out[0].files[0].path, "1");
    }

    #[test]
    fn test_patch_bundle_requires_base_path() {
        let err = normalize_patch_bundles(vec![json!({"bundle_id": "p"})]).unwrap_err();
        assert!(err.to_string().contains("base_path"), "{err}");
    }

    #[test]
    fn test_flatten_sorts_by_path_then_hash() {
        let outputs = vec![FileRecord::new("b.txt", "sha256:09", 1)];
        let bundles = vec![OutputBundle {
            bundle_id: "x".into(),
            files: vec![FileRecord::new("a.txt", "sha256:05", 1)],
        }];
        let patches = vec![PatchBundle {
            bundle_id: "p".into(),
            base_path: "a.txt".into(),
            patches: vec![FileRecord::new("a.txt", "sha256:01", 1)],
            outputs: vec![FileRecord::new("c.txt", "sha256:00", 1)],
        }];
        let flat = flatten_output_hashes(&outputs, &bundles, &patches);
        let keys: Vec<_> = flat
            .iter()
            .map(|r| format!("{}@{}", r.path, r.hash))
            .collect();
        assert_eq!(
            keys,
            vec!["a.txt@sha256:01", "a.txt@sha256:05", "b.txt@sha256:09", "c.txt@sha256:00"]
        );
    }

    #[test]
    fn test_run_steps_sorted_and_defaulted() {
        let steps = normalize_run_steps(vec![
            json!({"id": "step-2", "agent": "writer", "status": "ok", "extra": 1}),
            json!({"id": "step-1", "agent": "reader", "input_ref": "in", "output_ref": "out", "status": "ok"}),
        ])
        .unwrap();
        assert_eq!(steps[0].id, "step-1");
        assert_eq!(steps[1].input_ref, UNKNOWN);
    }

    #[test]
    fn test_pack_requires_version() {
        let err = PackRef::try_from(&json!({"id": "policy-core"})).unwrap_err();
        assert!(err.is_malformed_record());
    }

    #[test]
    fn test_fixture_optional_fields() {
        let fixture = DatasetFixture::try_from(&json!({"id": "fx", "path": null})).unwrap();
        assert_eq!(fixture.path, None);
        assert_eq!(fixture.hash, None);
    }

    #[test]
    fn test_array_field_rejects_scalar() {
        let doc = json!({"outputs": "nope"});
        assert!(array_field(&doc, "outputs", "outputs").is_err());
        assert!(array_field(&doc, "inputs", "inputs").unwrap().is_empty());
    }
}
