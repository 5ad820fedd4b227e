//! Deterministic run attestation.
//!
//! Three self-hashing documents, each built from the one before:
//!
//! * [`snapshot`]: the files a run consumed and produced.
//! * [`receipt`]: binds a snapshot digest to agent and run metadata.
//! * [`replay`]: re-verifies a receipt against a directory on disk.
//!
//! Every digest is SHA-256 over RFC 8785 canonical JSON, so identical inputs
//! under a fixed [`BuildConfig`] produce byte-identical documents.

pub mod config;
pub mod crypto;
pub mod document;
pub mod error;
pub mod normalize;
pub mod receipt;
pub mod replay;
pub mod schema;
pub mod snapshot;
pub mod types;

pub use config::BuildConfig;
pub use document::{load_document, write_document};
pub use error::{BluxError, BluxResult};
pub use receipt::{build_receipt, build_receipt_from_snapshot_file, ReceiptOptions};
pub use replay::build_replay_report;
pub use schema::{JsonSchemaValidator, SchemaKind, SchemaValidator};
pub use snapshot::{build_snapshot, build_snapshot_from_dirs, SnapshotInput};
pub use types::{ExecutionReceipt, FileRecord, ReplayReport, Snapshot};
