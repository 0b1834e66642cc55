//! Result snapshots on disk.
//!
//! A snapshot is the JSON form of a [`ResultSet`]: either an array of records, or an object
//! mapping status labels to arrays of records. Both are accepted on load.
//!
//! ```text
//! results.json
//! ├── [ {record}, ... ]                     # flat
//! └── { "FAILED": [ {record}, ... ], ... }  # grouped by status
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{QueryError, Result};
use crate::model::ResultSet;

pub const DEFAULT_RESULTS_PATH: &str = "./results.json";

pub fn default_path() -> PathBuf {
    PathBuf::from(DEFAULT_RESULTS_PATH)
}

/// Read a snapshot. Missing or corrupt files fail with [`QueryError::Load`].
pub fn load(path: &Path) -> Result<ResultSet> {
    let load_error = |source: Box<dyn std::error::Error + Send + Sync>| QueryError::Load {
        path: path.to_path_buf(),
        source,
    };

    let content = fs::read_to_string(path).map_err(|e| load_error(e.into()))?;
    let results: ResultSet = serde_json::from_str(&content).map_err(|e| load_error(e.into()))?;
    tracing::debug!(path = %path.display(), records = results.len(), "loaded snapshot");
    Ok(results)
}

/// Write a snapshot, replacing any existing file.
///
/// Writes to a temporary sibling first and renames it into place.
pub fn save(results: &ResultSet, path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    if !dir.exists() {
        fs::create_dir_all(&dir).map_err(QueryError::Io)?;
    }

    let content = serde_json::to_string_pretty(results).map_err(QueryError::Serialization)?;
    let tmp_file = dir.join(format!(".results-{}.tmp", Uuid::new_v4()));
    fs::write(&tmp_file, content).map_err(QueryError::Io)?;
    if let Err(e) = fs::rename(&tmp_file, path) {
        let _ = fs::remove_file(&tmp_file);
        return Err(QueryError::Io(e));
    }

    tracing::debug!(path = %path.display(), records = results.len(), "saved snapshot");
    Ok(())
}

/// Remove a snapshot. Returns whether a file was removed.
pub fn clear(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    fs::remove_file(path).map_err(QueryError::Io)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Record, Value};
    use indexmap::IndexMap;
    use tempfile::tempdir;

    fn record(id: &str, timestamp: i64) -> Record {
        [("_id", Value::from(id)), ("timestamp", Value::from(timestamp))]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_save_then_load_flat() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results.json");
        let results = ResultSet::Flat(vec![record("a", 1), record("b", 2)]);

        save(&results, &path).unwrap();
        assert_eq!(load(&path).unwrap(), results);
    }

    #[test]
    fn test_save_then_load_grouped_keeps_status_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("results.json");
        let mut groups = IndexMap::new();
        groups.insert("SUCCESS".to_string(), vec![record("s", 3)]);
        groups.insert("FAILED".to_string(), vec![record("f", 4)]);
        let results = ResultSet::ByStatus(groups);

        save(&results, &path).unwrap();
        assert_eq!(load(&path).unwrap(), results);
    }

    #[test]
    fn test_save_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results.json");
        save(&ResultSet::default(), &path).unwrap();

        for entry in fs::read_dir(dir.path()).unwrap() {
            let name = entry.unwrap().file_name();
            assert!(
                !name.to_string_lossy().ends_with(".tmp"),
                "leftover temp file {:?}",
                name
            );
        }
    }

    #[test]
    fn test_failed_rename_cleans_up_temp_file() {
        let dir = tempdir().unwrap();
        // A non-empty directory in the way makes the rename fail.
        let path = dir.path().join("results.json");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), "").unwrap();

        let err = save(&ResultSet::default(), &path).unwrap_err();
        assert!(matches!(err, QueryError::Io(_)));
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .filter(|name| name.to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "leftover temp files {:?}", leftovers);
    }

    #[test]
    fn test_missing_file_is_a_load_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let err = load(&path).unwrap_err();
        assert!(matches!(err, QueryError::Load { path: ref p, .. } if p == &path));
    }

    #[test]
    fn test_corrupt_file_is_a_load_error_with_cause() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results.json");
        fs::write(&path, "{ not json").unwrap();

        let err = load(&path).unwrap_err();
        assert!(matches!(err, QueryError::Load { .. }));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_clear_reports_whether_a_file_existed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results.json");
        assert!(!clear(&path).unwrap());

        save(&ResultSet::default(), &path).unwrap();
        assert!(clear(&path).unwrap());
        assert!(!path.exists());
    }
}
