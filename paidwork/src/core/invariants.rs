//! Semantic invariants for marker records not expressible via JSON Schema.

use super::work_item::{MarkerRecord, WorkStatus};

/// Check semantic invariants not expressible in JSON Schema:
/// - `public_repo` looks like `owner/name`
/// - `invoice_id` is non-blank
/// - `executed_at` is present iff `status == executed`
pub fn validate_invariants(record: &MarkerRecord) -> Vec<String> {
    let mut errors = Vec::new();

    if !is_repo_slug(&record.public_repo) {
        errors.push(format!(
            "public_repo '{}' must be in owner/name form",
            record.public_repo
        ));
    }
    if let Some(private_repo) = &record.private_repo
        && !is_repo_slug(private_repo)
    {
        errors.push(format!(
            "private_repo '{private_repo}' must be in owner/name form"
        ));
    }
    if record.invoice_id.trim().is_empty() {
        errors.push("invoice_id must not be blank".to_string());
    }

    match (record.status, record.executed_at) {
        (WorkStatus::Executed, None) => {
            errors.push("status executed requires executed_at".to_string());
        }
        (WorkStatus::ReadyForExecution, Some(_)) => {
            errors.push("status ready_for_execution must not carry executed_at".to_string());
        }
        _ => {}
    }

    errors
}

fn is_repo_slug(value: &str) -> bool {
    match value.split_once('/') {
        Some((owner, name)) => {
            !owner.trim().is_empty() && !name.trim().is_empty() && !name.contains('/')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

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
    fn valid_record_has_no_errors() {
        assert!(validate_invariants(&record()).is_empty());
    }

    #[test]
    fn reports_status_timestamp_mismatch() {
        let mut executed = record();
        executed.status = WorkStatus::Executed;
        let errors = validate_invariants(&executed);
        assert!(errors.iter().any(|e| e.contains("requires executed_at")));

        let mut stamped = record();
        stamped.executed_at = Some(Utc::now());
        let errors = validate_invariants(&stamped);
        assert!(errors.iter().any(|e| e.contains("must not carry executed_at")));
    }

    #[test]
    fn reports_bad_repo_and_blank_invoice() {
        let mut bad = record();
        bad.public_repo = "widgets".to_string();
        bad.private_repo = Some("a/b/c".to_string());
        bad.invoice_id = "  ".to_string();
        let errors = validate_invariants(&bad);
        assert_eq!(errors.len(), 3, "{errors:?}");
    }
}
