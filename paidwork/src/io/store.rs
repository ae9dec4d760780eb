//! Marker load/save with schema + invariant validation.
//!
//! The marker always lives at the root of whatever branch is checked out, so
//! the store is bound to a working-tree root rather than to a branch. The
//! branch passed to [`MarkerStore::load`] only tags the resulting item.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use jsonschema::validator_for;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::core::invariants::validate_invariants;
use crate::core::work_item::{MARKER_FILE, MarkerRecord, WorkItem};

const MARKER_SCHEMA: &str = include_str!("../../schemas/execution_ready.schema.json");

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no marker at {}", path.display())]
    NotFound { path: PathBuf },
    #[error("malformed marker {}: {err}", path.display())]
    Malformed { path: PathBuf, err: serde_json::Error },
    #[error("invalid marker {}: {}", path.display(), problems.join("; "))]
    Invalid { path: PathBuf, problems: Vec<String> },
    #[error("marker i/o at {}: {err}", path.display())]
    Io { path: PathBuf, err: std::io::Error },
}

/// Reads and writes `.execution-ready.json` in one working tree.
#[derive(Debug, Clone)]
pub struct MarkerStore {
    path: PathBuf,
}

impl MarkerStore {
    pub fn new(root: &Path) -> Self {
        Self {
            path: root.join(MARKER_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the marker of the checked-out branch and tag it with `branch`.
    pub fn load(&self, branch: &str) -> Result<WorkItem, StoreError> {
        let contents = self.read_raw()?.ok_or_else(|| StoreError::NotFound {
            path: self.path.clone(),
        })?;
        let value: Value = serde_json::from_str(&contents).map_err(|err| self.malformed(err))?;
        self.validate_schema(&value)?;
        let record: MarkerRecord =
            serde_json::from_value(value).map_err(|err| self.malformed(err))?;

        let problems = validate_invariants(&record);
        if !problems.is_empty() {
            return Err(self.invalid(problems));
        }
        let item = WorkItem::new(branch, record).map_err(|err| self.invalid(vec![err.to_string()]))?;
        debug!(branch, public_issue = item.public_issue(), status = %item.status(), "marker loaded");
        Ok(item)
    }

    /// Overwrite the marker with `item`'s record (temp file + rename).
    pub fn save(&self, item: &WorkItem) -> Result<(), StoreError> {
        debug!(branch = item.branch(), status = %item.status(), "writing marker");
        let mut buf = serde_json::to_string_pretty(item.record()).map_err(|err| self.malformed(err))?;
        buf.push('\n');
        self.write_raw(&buf)
    }

    /// Raw marker contents, or `None` if the file does not exist.
    pub fn read_raw(&self) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(self.io(err)),
        }
    }

    /// Replace the marker with exactly `contents`.
    pub fn write_raw(&self, contents: &str) -> Result<(), StoreError> {
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, contents).map_err(|err| self.io(err))?;
        fs::rename(&tmp_path, &self.path).map_err(|err| self.io(err))
    }

    fn validate_schema(&self, value: &Value) -> Result<(), StoreError> {
        let schema: Value = serde_json::from_str(MARKER_SCHEMA).map_err(|err| self.malformed(err))?;
        let compiled = validator_for(&schema)
            .map_err(|err| self.invalid(vec![format!("invalid marker schema: {err}")]))?;
        if compiled.is_valid(value) {
            return Ok(());
        }
        let problems = compiled
            .iter_errors(value)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        Err(self.invalid(problems))
    }

    fn malformed(&self, err: serde_json::Error) -> StoreError {
        StoreError::Malformed {
            path: self.path.clone(),
            err,
        }
    }

    fn invalid(&self, problems: Vec<String>) -> StoreError {
        StoreError::Invalid {
            path: self.path.clone(),
            problems,
        }
    }

    fn io(&self, err: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::work_item::WorkStatus;
    use crate::test_support::ready_item;
    use chrono::{TimeZone, Utc};

    fn store() -> (tempfile::TempDir, MarkerStore) {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = MarkerStore::new(temp.path());
        (temp, store)
    }

    #[test]
    fn save_then_load_keeps_record() {
        let (_temp, store) = store();
        let mut item = ready_item("paid/42", 7);
        item.mark_executed(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap())
            .expect("transition");
        store.save(&item).expect("save");

        let raw = fs::read_to_string(store.path()).expect("read");
        assert!(raw.ends_with("}\n"));
        assert!(raw.contains("\"executed_at\": \"2026-03-01T12:00:00Z\""));

        let loaded = store.load("paid/42").expect("load");
        assert_eq!(loaded, item);
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn missing_marker_is_not_found() {
        let (_temp, store) = store();
        assert!(matches!(store.load("paid/1"), Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn unparseable_marker_is_malformed() {
        let (_temp, store) = store();
        fs::write(store.path(), "{ not json").expect("write");
        assert!(matches!(store.load("paid/1"), Err(StoreError::Malformed { .. })));
    }

    #[test]
    fn schema_violation_is_invalid() {
        let (_temp, store) = store();
        fs::write(
            store.path(),
            r#"{"public_repo":"acme/widgets","public_issue":0,"private_issue":3,"invoice_id":"inv","status":"ready_for_execution"}"#,
        )
        .expect("write");
        let err = store.load("paid/1").unwrap_err();
        assert!(matches!(err, StoreError::Invalid { .. }), "{err}");
    }

    #[test]
    fn executed_without_timestamp_is_invalid() {
        let (_temp, store) = store();
        fs::write(
            store.path(),
            r#"{"public_repo":"acme/widgets","public_issue":7,"private_issue":3,"invoice_id":"inv","status":"executed"}"#,
        )
        .expect("write");
        match store.load("paid/1") {
            Err(StoreError::Invalid { problems, .. }) => {
                assert_eq!(problems, vec!["status executed requires executed_at"]);
            }
            other => panic!("expected invalid, got {other:?}"),
        }
    }

    #[test]
    fn raw_round_trip_preserves_unknown_keys() {
        let (_temp, store) = store();
        let original = r#"{"public_repo":"acme/widgets","public_issue":7,"private_issue":3,"invoice_id":"inv","status":"ready_for_execution","branch":"paid/9"}"#;
        store.write_raw(original).expect("write");
        let item = store.load("paid/9").expect("load");
        assert_eq!(item.status(), WorkStatus::ReadyForExecution);
        assert_eq!(store.read_raw().expect("read").as_deref(), Some(original));
    }
}
