//! Loading and persisting JSON documents.
//!
//! Documents are always written as canonical bytes so that a written file's
//! own digest is reproducible.

use crate::crypto::jcs;
use crate::error::{BluxError, BluxResult};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

/// Read a UTF-8 JSON document.
pub fn load_document(path: &Path) -> BluxResult<Value> {
    let text = std::fs::read_to_string(path).map_err(|e| BluxError::io(path, e))?;
    serde_json::from_str(&text).map_err(|source| BluxError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a document as canonical JSON, creating parent directories as needed.
pub fn write_document<T: Serialize>(path: &Path, document: &T) -> BluxResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| BluxError::io(parent, e))?;
    }
    let bytes = jcs::to_vec(document)?;
    std::fs::write(path, bytes).map_err(|e| BluxError::io(path, e))?;
    tracing::debug!(path = %path.display(), "wrote canonical document");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn write_then_load_is_canonical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/doc.json");

        write_document(&path, &json!({"b": [2, 1], "a": "é"})).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw, r#"{"a":"é","b":[2,1]}"#);
        assert_eq!(load_document(&path).unwrap(), json!({"a": "é", "b": [2, 1]}));
    }

    #[test]
    fn invalid_json_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = load_document(&path).unwrap_err();
        assert!(matches!(err, BluxError::Parse { .. }), "{err}");
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_document(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, BluxError::Io { .. }), "{err}");
    }
}
