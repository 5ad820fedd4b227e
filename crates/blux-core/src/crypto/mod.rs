//! Canonical encoding and content digests shared by every builder.

pub mod digest;
pub mod jcs;

pub use digest::{hash_bytes, hash_canonical, hash_file, hash_without, DIGEST_PREFIX};
