//! Whole-file read and write helpers shared by both collection shapes.

use crate::error::{StoreError, StoreResult};
use serde::de::DeserializeOwned;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// A single-entry JSON object `{ key: body }` serialised without cloning `body`.
struct Section<'a, T: ?Sized> {
    key: &'a str,
    body: &'a T,
}

impl<T: Serialize + ?Sized> Serialize for Section<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.key, self.body)?;
        map.end()
    }
}

/// Reads the document at `path` and returns the value under `key`.
///
/// Returns `Ok(None)` when the file does not exist.
///
/// # Errors
///
/// - [`StoreError::StorageUnavailable`] if the file exists but cannot be read.
/// - [`StoreError::StorageCorruption`] if the contents are not JSON, are not an object, lack
///   `key`, or do not match the expected record shape. The detail names the offending JSON path.
pub(crate) fn read_section<T: DeserializeOwned>(path: &Path, key: &str) -> StoreResult<Option<T>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::StorageUnavailable {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let corruption = |detail: String| StoreError::StorageCorruption {
        path: path.to_path_buf(),
        detail,
    };

    let document: serde_json::Value =
        serde_json::from_str(&contents).map_err(|e| corruption(e.to_string()))?;
    let serde_json::Value::Object(mut document) = document else {
        return Err(corruption("top-level value is not an object".into()));
    };
    let section = document
        .remove(key)
        .ok_or_else(|| corruption(format!("missing top-level key '{key}'")))?;

    let parsed = serde_path_to_error::deserialize(section).map_err(|e| {
        let at = match e.path().to_string() {
            p if p == "." => key.to_string(),
            p if p.starts_with('[') => format!("{key}{p}"),
            p => format!("{key}.{p}"),
        };
        corruption(format!("{at}: {}", e.inner()))
    })?;
    Ok(Some(parsed))
}

/// Rewrites the document at `path` as `{ key: body }`, indented with four spaces.
///
/// The document is written to a hidden temporary file next to `path` and renamed into place.
pub(crate) fn write_section<T: Serialize + ?Sized>(
    path: &Path,
    key: &str,
    body: &T,
) -> StoreResult<()> {
    let unavailable = |source: std::io::Error| StoreError::StorageUnavailable {
        path: path.to_path_buf(),
        source,
    };

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    Section { key, body }
        .serialize(&mut serializer)
        .map_err(StoreError::Serialization)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(unavailable)?;
    }

    let tmp = temp_path(path);
    fs::write(&tmp, &buf).map_err(unavailable)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(unavailable(e));
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "collection".into());
    path.with_file_name(format!(".{name}.tmp"))
}
