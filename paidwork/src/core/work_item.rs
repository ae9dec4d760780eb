//! Work-item model.
//!
//! A work item is one paid issue awaiting (or done with) execution. The persisted
//! half lives in [`MarkerRecord`], stored as `.execution-ready.json` at the root of
//! the item's `paid/*` branch. The branch name itself is never persisted: it is
//! attached in memory when the scanner finds the marker, which is what
//! [`WorkItem`] models.

use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix every private work-item branch carries.
pub const BRANCH_PREFIX: &str = "paid/";

/// Marker file name at the repository root of a work-item branch.
pub const MARKER_FILE: &str = ".execution-ready.json";

/// Execution status. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    ReadyForExecution,
    Executed,
}

impl WorkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkStatus::ReadyForExecution => "ready_for_execution",
            WorkStatus::Executed => "executed",
        }
    }
}

impl fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields persisted in `.execution-ready.json`.
///
/// Unknown keys are ignored on load, so markers that carry extra bookkeeping
/// (older ones include `branch`) still parse; they are not written back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerRecord {
    /// `owner/name` of the public repository holding the paid issue.
    pub public_repo: String,
    /// Issue number on the public repository.
    pub public_issue: u64,
    /// Internal tracking issue number.
    pub private_issue: u64,
    /// Opaque payment reference. Never rewritten.
    pub invoice_id: String,
    /// `owner/name` of the private repository, when the payment step recorded it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_repo: Option<String>,
    pub status: WorkStatus,
    /// Set exactly once, on the transition to [`WorkStatus::Executed`].
    #[serde(default, skip_serializing_if = "Option::is_none", with = "timestamp")]
    pub executed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkItemError {
    #[error("branch '{0}' is not a work-item branch (expected prefix 'paid/')")]
    InvalidBranch(String),
    #[error("work item on {branch} is already executed")]
    AlreadyExecuted { branch: String },
}

/// A marker record tagged with the branch it was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    branch: String,
    record: MarkerRecord,
}

impl WorkItem {
    pub fn new(branch: impl Into<String>, record: MarkerRecord) -> Result<Self, WorkItemError> {
        let branch = branch.into();
        if !is_work_branch(&branch) {
            return Err(WorkItemError::InvalidBranch(branch));
        }
        Ok(Self { branch, record })
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn record(&self) -> &MarkerRecord {
        &self.record
    }

    pub fn public_issue(&self) -> u64 {
        self.record.public_issue
    }

    pub fn status(&self) -> WorkStatus {
        self.record.status
    }

    pub fn is_ready(&self) -> bool {
        self.record.status == WorkStatus::ReadyForExecution
    }

    /// Transition `ready_for_execution -> executed`, stamping `executed_at`
    /// with `now` truncated to whole seconds.
    pub fn mark_executed(&mut self, now: DateTime<Utc>) -> Result<(), WorkItemError> {
        if !self.is_ready() {
            return Err(WorkItemError::AlreadyExecuted {
                branch: self.branch.clone(),
            });
        }
        self.record.status = WorkStatus::Executed;
        self.record.executed_at = Some(now.trunc_subsecs(0));
        Ok(())
    }
}

/// True if `branch` follows the `paid/<name>` convention.
pub fn is_work_branch(branch: &str) -> bool {
    branch
        .strip_prefix(BRANCH_PREFIX)
        .is_some_and(|rest| !rest.is_empty())
}

/// `executed_at` is written as `YYYY-MM-DDTHH:MM:SSZ`; any RFC 3339 value is accepted.
mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(at) => serializer.serialize_str(&at.format(FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|at| at.with_timezone(&Utc))
                .map_err(serde::de::Error::custom)
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record() -> MarkerRecord {
        MarkerRecord {
            public_repo: "acme/widgets".to_string(),
            public_issue: 7,
            private_issue: 3,
            invoice_id: "inv_001".to_string(),
            private_repo: None,
            status: WorkStatus::ReadyForExecution,
            executed_at: None,
        }
    }

    #[test]
    fn rejects_branch_without_prefix() {
        let err = WorkItem::new("feature/7", record()).unwrap_err();
        assert_eq!(err, WorkItemError::InvalidBranch("feature/7".to_string()));
        assert!(WorkItem::new("paid/", record()).is_err());
    }

    #[test]
    fn mark_executed_stamps_whole_seconds_once() {
        let mut item = WorkItem::new("paid/42", record()).expect("item");
        let now = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap()
            + chrono::Duration::milliseconds(750);

        item.mark_executed(now).expect("transition");
        assert_eq!(item.status(), WorkStatus::Executed);
        assert_eq!(
            item.record().executed_at,
            Some(Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap())
        );

        let err = item.mark_executed(now).unwrap_err();
        assert!(matches!(err, WorkItemError::AlreadyExecuted { .. }));
    }

    #[test]
    fn serializes_without_branch_and_with_compact_timestamp() {
        let mut item = WorkItem::new("paid/42", record()).expect("item");
        item.mark_executed(Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap())
            .expect("transition");

        let json = serde_json::to_string(item.record()).expect("serialize");
        assert_eq!(
            json,
            r#"{"public_repo":"acme/widgets","public_issue":7,"private_issue":3,"invoice_id":"inv_001","status":"executed","executed_at":"2026-01-02T03:04:05Z"}"#
        );
    }

    #[test]
    fn parses_marker_with_extra_branch_key() {
        let raw = r#"{
            "public_repo": "acme/widgets",
            "public_issue": 7,
            "private_issue": 3,
            "invoice_id": "inv_001",
            "private_repo": "acme/widgets-private",
            "status": "ready_for_execution",
            "branch": "paid/42"
        }"#;
        let parsed: MarkerRecord = serde_json::from_str(raw).expect("parse");
        assert_eq!(parsed.private_repo.as_deref(), Some("acme/widgets-private"));
        assert_eq!(parsed.executed_at, None);
    }
}
