use crate::data::Database;
use crate::error::{Result, SyncError};
use crate::normalize::normalize_from_local_json;
use glob::glob;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const PROGRESS_EVERY: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub found: usize,
    pub ok: u64,
    pub errors: u64,
}

/// All `*.json` files below `dir`, sorted by path.
pub fn collect_json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(SyncError::Config(format!(
            "Templates directory not found: {}",
            dir.display()
        )));
    }

    let pattern = dir.join("**").join("*.json");
    let pattern = pattern.to_string_lossy();
    let entries = glob(&pattern)
        .map_err(|e| SyncError::Config(format!("Invalid directory pattern {}: {}", pattern, e)))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(path) => path.is_file().then_some(path),
            Err(e) => {
                warn!("Unreadable path during scan: {}", e);
                None
            }
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Source id for an exported workflow: `meta.id` when present, otherwise
/// the file stem.
pub fn local_source_id(data: &Value, path: &Path) -> String {
    let from_meta = data.get("meta").and_then(|m| m.get("id")).and_then(|id| match id {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });

    from_meta.unwrap_or_else(|| {
        path.file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    })
}

fn import_file(path: &Path, database: &Database) -> Result<bool> {
    let raw = fs::read_to_string(path)?;
    let data: Value = serde_json::from_str(&raw)?;

    let has_nodes = data
        .get("nodes")
        .and_then(Value::as_array)
        .is_some_and(|nodes| !nodes.is_empty());
    if !has_nodes {
        return Ok(false);
    }

    let source_id = local_source_id(&data, path);
    let source_url = data
        .get("meta")
        .and_then(|m| m.get("site"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    let template = normalize_from_local_json(&data, &source_id, source_url);
    database.upsert_template(&template)?;
    Ok(true)
}

/// Import exported workflow files from disk into the store.
pub fn import_local(dir: &Path, skip: usize, limit: usize, database: &Database) -> Result<ImportSummary> {
    let files = collect_json_files(dir)?;
    info!("Found {} JSON files", files.len());

    let mut summary = ImportSummary {
        found: files.len(),
        ..Default::default()
    };

    let remaining = files.into_iter().skip(skip);
    let files: Vec<PathBuf> = if limit > 0 {
        remaining.take(limit).collect()
    } else {
        remaining.collect()
    };

    let total = files.len();
    for (index, path) in files.iter().enumerate() {
        match import_file(path, database) {
            Ok(true) => summary.ok += 1,
            Ok(false) => summary.errors += 1,
            Err(e) => {
                summary.errors += 1;
                warn!("Error {}: {}", path.display(), e);
            }
        }

        if (index + 1) % PROGRESS_EVERY == 0 {
            info!("  {}/{} ok={} err={}", index + 1, total, summary.ok, summary.errors);
        }
    }

    info!("Done. ok={} err={}", summary.ok, summary.errors);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn source_id_prefers_meta_id() {
        let path = Path::new("/tmp/exports/1234-slack-digest.json");
        assert_eq!(local_source_id(&json!({"meta": {"id": 77}}), path), "77");
        assert_eq!(local_source_id(&json!({"meta": {"id": "abc"}}), path), "abc");
        assert_eq!(local_source_id(&json!({"meta": {}}), path), "1234-slack-digest");
        assert_eq!(local_source_id(&json!({}), path), "1234-slack-digest");
    }
}
