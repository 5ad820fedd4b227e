//! Content digests.
//!
//! # Invariants
//!
//! 1. Every digest is `"sha256:"` followed by 64 lowercase hex characters.
//! 2. A self-hash field (`snapshot_hash`, `receipt_hash`, `report_hash`) MUST NOT
//!    be part of its own hash input.
//! 3. Hash inputs are canonical JSON ([`crate::crypto::jcs`]).

use crate::crypto::jcs;
use crate::error::{BluxError, BluxResult};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Prefix carried by every digest string.
pub const DIGEST_PREFIX: &str = "sha256:";

/// Read size for streamed file hashing.
const CHUNK_SIZE: usize = 8192;

/// Hash a byte sequence.
///
/// # Example
///
/// ```
/// use blux_core::crypto::digest::hash_bytes;
///
/// assert_eq!(
///     hash_bytes(b""),
///     "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
/// );
/// ```
pub fn hash_bytes(data: &[u8]) -> String {
    format!("{}{}", DIGEST_PREFIX, hex::encode(Sha256::digest(data)))
}

/// Hash a file's contents, streamed in fixed-size chunks.
pub fn hash_file(path: &Path) -> BluxResult<String> {
    let mut file = File::open(path).map_err(|e| BluxError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).map_err(|e| BluxError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{}{}", DIGEST_PREFIX, hex::encode(hasher.finalize())))
}

/// Hash the canonical encoding of a value.
pub fn hash_canonical<T: Serialize>(value: &T) -> BluxResult<String> {
    Ok(hash_bytes(&jcs::to_vec(value)?))
}

/// Hash the canonical encoding of a document with one top-level key removed.
///
/// This is how a self-hash is recomputed from a stored document. Non-object
/// values are hashed unchanged.
pub fn hash_without(document: &Value, key: &str) -> BluxResult<String> {
    match document {
        Value::Object(map) => {
            let mut body = map.clone();
            body.remove(key);
            hash_canonical(&body)
        }
        other => hash_canonical(other),
    }
}

/// Returns true if `s` is a well-formed digest string.
pub fn is_digest(s: &str) -> bool {
    s.strip_prefix(DIGEST_PREFIX).is_some_and(|hex| {
        hex.len() == 64 && hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    })
}
