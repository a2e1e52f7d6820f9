//! Catalog persistence as a JSON array.
//!
//! Files are written with sorted keys and four-space indentation, via a
//! temp file renamed into place so an interrupted run never leaves a
//! truncated catalog behind.

use std::path::Path;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use fdrdict_shared::{Catalog, FdrError, Result};

/// Load a catalog file. Entries are re-sorted by id on load.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn read_catalog(path: &Path) -> Result<Catalog> {
    let raw = std::fs::read_to_string(path).map_err(|e| FdrError::io(path, e))?;
    let catalog: Catalog = serde_json::from_str(&raw)
        .map_err(|e| FdrError::parse(format!("{}: invalid catalog JSON: {e}", path.display())))?;

    debug!(entries = catalog.len(), "catalog loaded");
    Ok(catalog)
}

/// Write `catalog` to `path` atomically, creating parent directories.
#[instrument(skip_all, fields(path = %path.display(), entries = catalog.len()))]
pub fn write_catalog(path: &Path, catalog: &Catalog) -> Result<()> {
    let value = serde_json::to_value(catalog)
        .map_err(|e| FdrError::validation(format!("JSON serialization failed: {e}")))?;
    let json = to_sorted_pretty(value)?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| FdrError::validation(format!("invalid output path {}", path.display())))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| FdrError::io(&dir, e))?;

    let temp = dir.join(format!(".{file_name}.tmp"));
    std::fs::write(&temp, json).map_err(|e| FdrError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| {
        let _ = std::fs::remove_file(&temp);
        FdrError::io(path, e)
    })?;

    info!("catalog written");
    Ok(())
}

/// Pretty-print with four-space indentation and every object's keys sorted.
fn to_sorted_pretty(value: Value) -> Result<Vec<u8>> {
    let sorted = sort_keys(value);
    let mut out = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
    sorted
        .serialize(&mut serializer)
        .map_err(|e| FdrError::validation(format!("JSON serialization failed: {e}")))?;
    out.push(b'\n');
    Ok(out)
}

/// Any crate in the build can enable serde_json's `preserve_order`, which
/// turns `Map` into an insertion-ordered map, so keys are sorted here.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut pairs: Vec<(String, Value)> = map.into_iter().collect();
            pairs.sort_by(|a, b| a.0.cmp(&b.0));
            let sorted: Map<String, Value> =
                pairs.into_iter().map(|(k, v)| (k, sort_keys(v))).collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}
