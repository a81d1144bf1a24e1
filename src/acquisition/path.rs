//! Dotted-path extraction from JSON documents.

use serde_json::Value;

use crate::acquisition::AcquisitionError;

/// Walk `path` (e.g. `data.proxy_list`) through nested objects.
///
/// An empty path yields the whole document. Every segment must exist and
/// every intermediate value must be an object.
pub fn extract_path<'a>(document: &'a Value, path: &str) -> Result<&'a Value, AcquisitionError> {
    if path.is_empty() {
        return Ok(document);
    }

    let mut current = document;
    for key in path.split('.') {
        let object = current.as_object().ok_or_else(|| {
            AcquisitionError::Parse(format!("cannot access key '{}' in non-object value (path '{}')", key, path))
        })?;
        current = object.get(key).ok_or_else(|| {
            AcquisitionError::Parse(format!("key '{}' not found in path '{}'", key, path))
        })?;
    }
    Ok(current)
}
