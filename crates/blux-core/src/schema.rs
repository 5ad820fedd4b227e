//! Schema validation.
//!
//! The replay verifier depends on the [`SchemaValidator`] trait only.
//! [`JsonSchemaValidator`] is the bundled engine over the embedded draft
//! 2020-12 schemas; tests may supply their own implementation.

use crate::error::{BluxError, BluxResult};
use jsonschema::Draft;
use serde_json::Value;
use std::sync::OnceLock;

// NOTE: Use CARGO_MANIFEST_DIR to avoid fragile relative paths from src/.
const SNAPSHOT_SCHEMA_JSON: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../schemas/snapshot.schema.json"
));
const EXECUTION_RECEIPT_SCHEMA_JSON: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../schemas/execution_receipt.schema.json"
));
const REPLAY_REPORT_SCHEMA_JSON: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../schemas/replay_report.schema.json"
));

/// The document schemas known to the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    Snapshot,
    ExecutionReceipt,
    ReplayReport,
}

impl SchemaKind {
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Snapshot => "snapshot.schema.json",
            Self::ExecutionReceipt => "execution_receipt.schema.json",
            Self::ReplayReport => "replay_report.schema.json",
        }
    }

    fn source(self) -> &'static str {
        match self {
            Self::Snapshot => SNAPSHOT_SCHEMA_JSON,
            Self::ExecutionReceipt => EXECUTION_RECEIPT_SCHEMA_JSON,
            Self::ReplayReport => REPLAY_REPORT_SCHEMA_JSON,
        }
    }
}

/// Validates a document against one of the known schemas.
pub trait SchemaValidator {
    /// `Ok(())` when valid, otherwise the first diagnostic message.
    fn validate(&self, kind: SchemaKind, document: &Value) -> Result<(), String>;
}

/// [`SchemaValidator`] backed by the `jsonschema` crate and the embedded schemas.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSchemaValidator;

static SNAPSHOT: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();
static EXECUTION_RECEIPT: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();
static REPLAY_REPORT: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

fn compile(kind: SchemaKind) -> Result<jsonschema::Validator, String> {
    let schema: Value = serde_json::from_str(kind.source())
        .map_err(|e| format!("failed to parse embedded {}: {e}", kind.file_name()))?;

    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .map_err(|e| format!("failed to compile {}: {e}", kind.file_name()))
}

fn compiled_validator(kind: SchemaKind) -> Result<&'static jsonschema::Validator, String> {
    let cell = match kind {
        SchemaKind::Snapshot => &SNAPSHOT,
        SchemaKind::ExecutionReceipt => &EXECUTION_RECEIPT,
        SchemaKind::ReplayReport => &REPLAY_REPORT,
    };
    cell.get_or_init(|| compile(kind)).as_ref().map_err(|e| e.clone())
}

impl JsonSchemaValidator {
    /// Compile every embedded schema, surfacing the first failure.
    pub fn check_schemas() -> BluxResult<()> {
        for kind in [
            SchemaKind::Snapshot,
            SchemaKind::ExecutionReceipt,
            SchemaKind::ReplayReport,
        ] {
            compiled_validator(kind).map_err(BluxError::Schema)?;
        }
        Ok(())
    }
}

impl SchemaValidator for JsonSchemaValidator {
    fn validate(&self, kind: SchemaKind, document: &Value) -> Result<(), String> {
        let validator = compiled_validator(kind)?;
        match validator.iter_errors(document).next() {
            None => Ok(()),
            Some(err) => Err(format!("{} validation failed: {err}", kind.file_name())),
        }
    }
}
