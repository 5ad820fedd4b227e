//! Canonical JSON encoding (RFC 8785 / JCS).
//!
//! Every digest in a snapshot, receipt or replay report is computed over the
//! bytes produced here. `serde_jcs` guarantees:
//!
//! - Lexicographic key ordering, recursively into nested objects
//! - No insignificant whitespace
//! - UTF-8 output, non-ASCII characters written as-is
//! - Array order preserved exactly as given
//!
//! Arrays are never reordered; sorting collections is the job of
//! [`crate::normalize`].

use crate::error::{BluxError, BluxResult};
use serde::Serialize;

/// Serialize a value to canonical JSON bytes.
///
/// # Example
///
/// ```
/// use blux_core::crypto::jcs;
/// use serde_json::json;
///
/// let value = json!({"b": 2, "a": 1});
/// let bytes = jcs::to_vec(&value).unwrap();
/// assert_eq!(bytes, br#"{"a":1,"b":2}"#);
/// ```
pub fn to_vec<T: Serialize>(value: &T) -> BluxResult<Vec<u8>> {
    serde_jcs::to_vec(value).map_err(|e| BluxError::Canonical(e.to_string()))
}

/// Serialize a value to a canonical JSON string.
///
/// # Example
///
/// ```
/// use blux_core::crypto::jcs;
/// use serde_json::json;
///
/// let value = json!({"z": 1, "a": 2});
/// let s = jcs::to_string(&value).unwrap();
/// assert_eq!(s, r#"{"a":2,"z":1}"#);
/// ```
pub fn to_string<T: Serialize>(value: &T) -> BluxResult<String> {
    serde_jcs::to_string(value).map_err(|e| BluxError::Canonical(e.to_string()))
}
