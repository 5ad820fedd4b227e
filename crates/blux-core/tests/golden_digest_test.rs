//! Golden digests for fixed inputs.
//!
//! These pin the canonical encoding and the self-hash layout. Any change to
//! either (including a `serde_jcs` upgrade) shows up here before it silently
//! invalidates stored documents.

use blux_core::crypto::digest::{hash_bytes, hash_canonical};
use blux_core::{build_receipt, build_snapshot_from_dirs, BuildConfig, ReceiptOptions};
use serde_json::json;
use std::fs;

const TS: &str = "2024-01-01T00:00:00Z";
const ALPHA_HASH: &str = "sha256:8ed3f6ad685b959ead7022518e1af76cd816f8e8ec7ccdda1ed4018e8f2223f8";
const RESULT_HASH: &str = "sha256:4062edaf750fb8074e7e83e0c9028c94e32468a8b6f1614774328ef045150f93";
const SNAPSHOT_HASH: &str =
    "sha256:84cf2f6b495f8c0cc5b813a8837bc9287afefe78691aaf87ff84ad64d38c1c7c";
const RECEIPT_HASH: &str =
    "sha256:b79d68ae21e8fd1b454ba4e951b725eeaa4f6c6fd29804500a6a1be34db9da17";

#[test]
fn golden_file_digests() {
    assert_eq!(hash_bytes(b"alpha"), ALPHA_HASH);
    assert_eq!(hash_bytes(br#"{"ok":true}"#), RESULT_HASH);
}

#[test]
fn golden_canonical_digests() {
    assert_eq!(
        hash_canonical(&json!({})).unwrap(),
        "sha256:44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
    );
    assert_eq!(
        hash_canonical(&json!({"b": [2, 1], "a": "é"})).unwrap(),
        "sha256:265cdd44ca612f13fd2b8e14f6913a5513adf3142e6c82317e55ba51948f43f2"
    );
}

#[test]
fn golden_snapshot_and_receipt() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = dir.path().join("inputs");
    let outputs = dir.path().join("outputs");
    fs::create_dir_all(&inputs).unwrap();
    fs::create_dir_all(&outputs).unwrap();
    fs::write(inputs.join("alpha.txt"), "alpha").unwrap();
    fs::write(outputs.join("result.json"), r#"{"ok":true}"#).unwrap();

    let config = BuildConfig::with_timestamp(TS);
    let snapshot = build_snapshot_from_dirs(&inputs, &outputs, &config).unwrap();
    assert_eq!(snapshot.inputs[0].hash, ALPHA_HASH);
    assert_eq!(snapshot.outputs[0].size, 11);
    assert_eq!(snapshot.snapshot_hash, SNAPSHOT_HASH);

    let document = serde_json::to_value(&snapshot).unwrap();
    let receipt = build_receipt(&document, ReceiptOptions::default(), &config).unwrap();
    assert_eq!(receipt.snapshot_hash, SNAPSHOT_HASH);
    assert_eq!(receipt.receipt_hash, RECEIPT_HASH);
}
