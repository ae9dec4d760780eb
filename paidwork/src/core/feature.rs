//! Feature description rendered from a source-repository issue.

/// Issue fields needed to describe a feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueDetails {
    pub title: String,
    pub body: Option<String>,
    pub labels: Vec<String>,
    pub url: String,
    pub created_at: String,
}

/// Render the plain-text feature description printed by `extract-feature`.
pub fn render_feature(issue: &IssueDetails) -> String {
    format!(
        "Feature: {}\n\n{}\n\n# Labels: {}\n# Issue URL: {}\n# Created: {}\n",
        issue.title,
        issue.body.as_deref().unwrap_or_default(),
        issue.labels.join(", "),
        issue.url,
        issue.created_at,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_all_sections() {
        let issue = IssueDetails {
            title: "Remove URL box".to_string(),
            body: Some("The box is unused.".to_string()),
            labels: vec!["paid".to_string(), "ui".to_string()],
            url: "https://github.com/acme/widgets/issues/7".to_string(),
            created_at: "2026-01-02T03:04:05Z".to_string(),
        };
        assert_eq!(
            render_feature(&issue),
            "Feature: Remove URL box\n\nThe box is unused.\n\n# Labels: paid, ui\n# Issue URL: https://github.com/acme/widgets/issues/7\n# Created: 2026-01-02T03:04:05Z\n"
        );
    }

    #[test]
    fn missing_body_and_labels_render_empty() {
        let issue = IssueDetails {
            title: "t".to_string(),
            body: None,
            labels: Vec::new(),
            url: "u".to_string(),
            created_at: "c".to_string(),
        };
        assert_eq!(
            render_feature(&issue),
            "Feature: t\n\n\n\n# Labels: \n# Issue URL: u\n# Created: c\n"
        );
    }
}
