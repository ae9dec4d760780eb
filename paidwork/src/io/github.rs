//! Code-host capability backed by the `gh` CLI.
//!
//! Commands are built as argument vectors (never shell strings) and run with
//! `GH_TOKEN` set in the child environment only.

use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::core::feature::IssueDetails;
use crate::core::filter::scrub_secret;
use crate::core::types::PullRequestRef;
use crate::io::process::run_command_with_timeout;

const GH_OUTPUT_LIMIT_BYTES: usize = 1024 * 1024;

/// Draft pull request to open on `repo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRequest {
    pub repo: String,
    pub title: String,
    pub body: String,
    pub base_branch: String,
    pub head_branch: String,
}

/// Remote operations the pipeline needs from the code host.
pub trait CodeHost {
    fn create_draft_pull_request(&self, request: &PullRequestRequest) -> Result<PullRequestRef>;
    fn fetch_issue(&self, repo: &str, number: u64) -> Result<IssueDetails>;
}

/// [`CodeHost`] that shells out to `gh`.
#[derive(Debug, Clone)]
pub struct GhCli {
    token: String,
    timeout: Duration,
}

impl GhCli {
    pub fn new(token: impl Into<String>, timeout: Duration) -> Self {
        Self {
            token: token.into(),
            timeout,
        }
    }

    fn run_gh(&self, args: &[String]) -> Result<String> {
        let mut cmd = Command::new("gh");
        cmd.args(args).env("GH_TOKEN", &self.token);
        let output = run_command_with_timeout(cmd, self.timeout, GH_OUTPUT_LIMIT_BYTES)
            .context("run gh")?;
        if !output.succeeded() {
            let reason = scrub_secret(&output.failure_reason(), &self.token);
            return Err(anyhow!("gh {} failed: {reason}", render_args(args)));
        }
        Ok(output.stdout_lossy())
    }
}

impl CodeHost for GhCli {
    #[instrument(skip_all, fields(repo = %request.repo, head = %request.head_branch))]
    fn create_draft_pull_request(&self, request: &PullRequestRequest) -> Result<PullRequestRef> {
        let stdout = self.run_gh(&create_draft_pr_args(request))?;
        let url = extract_pull_request_url(&stdout)
            .ok_or_else(|| anyhow!("gh pr create did not print a pull request URL"))?;
        let number = parse_pull_request_number(&url)?;
        info!(number, url = %url, "draft pull request created");
        Ok(PullRequestRef { number, url })
    }

    #[instrument(skip_all, fields(repo, number))]
    fn fetch_issue(&self, repo: &str, number: u64) -> Result<IssueDetails> {
        let args = vec![
            "issue".to_string(),
            "view".to_string(),
            number.to_string(),
            "--repo".to_string(),
            repo.to_string(),
            "--json".to_string(),
            "title,body,labels,url,createdAt".to_string(),
        ];
        let stdout = self.run_gh(&args)?;
        let issue = parse_issue_json(&stdout)
            .with_context(|| format!("parse issue {repo}#{number}"))?;
        debug!(title = %issue.title, labels = issue.labels.len(), "issue fetched");
        Ok(issue)
    }
}

fn create_draft_pr_args(request: &PullRequestRequest) -> Vec<String> {
    vec![
        "pr".to_string(),
        "create".to_string(),
        "--draft".to_string(),
        "--repo".to_string(),
        request.repo.clone(),
        "--title".to_string(),
        request.title.clone(),
        "--body".to_string(),
        request.body.clone(),
        "--base".to_string(),
        request.base_branch.clone(),
        "--head".to_string(),
        request.head_branch.clone(),
    ]
}

/// Render args for diagnostics, eliding the PR body.
fn render_args(args: &[String]) -> String {
    let mut rendered = Vec::with_capacity(args.len());
    let mut hide_next = false;
    for arg in args {
        if hide_next {
            rendered.push("<body>");
            hide_next = false;
            continue;
        }
        hide_next = arg == "--body";
        rendered.push(arg.as_str());
    }
    rendered.join(" ")
}

fn extract_pull_request_url(text: &str) -> Option<String> {
    text.split_whitespace()
        .map(|token| {
            token
                .trim_matches(|ch: char| ch == '"' || ch == '\'' || ch == '(' || ch == ')')
                .trim_end_matches([',', ';', '.'])
        })
        .find(|token| token.starts_with("https://") && token.contains("/pull/"))
        .map(str::to_string)
}

fn parse_pull_request_number(url: &str) -> Result<u64> {
    let Some(segment) = url.split("/pull/").nth(1) else {
        bail!("pull request URL did not include `/pull/`: {url}");
    };
    let digits: String = segment.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() {
        bail!("pull request URL did not include a number: {url}");
    }
    digits
        .parse::<u64>()
        .with_context(|| format!("parse pull request number from {url}"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GhIssue {
    title: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    labels: Vec<GhLabel>,
    url: String,
    created_at: String,
}

#[derive(Debug, Deserialize)]
struct GhLabel {
    name: String,
}

fn parse_issue_json(raw: &str) -> Result<IssueDetails> {
    let issue: GhIssue = serde_json::from_str(raw)?;
    Ok(IssueDetails {
        title: issue.title,
        body: issue.body.filter(|body| !body.trim().is_empty()),
        labels: issue.labels.into_iter().map(|label| label.name).collect(),
        url: issue.url,
        created_at: issue.created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_url_from_gh_output() {
        let out = "Creating draft pull request for feat/7 into main\n\nhttps://github.com/acme/widgets/pull/12\n";
        let url = extract_pull_request_url(out).expect("url");
        assert_eq!(url, "https://github.com/acme/widgets/pull/12");
        assert_eq!(parse_pull_request_number(&url).expect("number"), 12);
    }

    #[test]
    fn rejects_url_without_number() {
        assert!(parse_pull_request_number("https://github.com/acme/widgets/pull/").is_err());
        assert!(parse_pull_request_number("https://github.com/acme/widgets").is_err());
        assert_eq!(extract_pull_request_url("no url here"), None);
    }

    #[test]
    fn create_args_are_an_argument_vector() {
        let request = PullRequestRequest {
            repo: "acme/widgets".to_string(),
            title: "Implement #7".to_string(),
            body: "multi\nline; rm -rf /".to_string(),
            base_branch: "main".to_string(),
            head_branch: "feat/7-implementation-1".to_string(),
        };
        let args = create_draft_pr_args(&request);
        assert_eq!(&args[..5], ["pr", "create", "--draft", "--repo", "acme/widgets"]);
        assert!(args.contains(&"multi\nline; rm -rf /".to_string()));
        assert_eq!(
            render_args(&args),
            "pr create --draft --repo acme/widgets --title Implement #7 --body <body> --base main --head feat/7-implementation-1"
        );
    }

    #[test]
    fn parses_issue_json_from_gh() {
        let raw = r#"{"title":"Add export","body":"","labels":[{"id":"x","name":"paid"},{"name":"feature"}],"url":"https://github.com/acme/widgets/issues/7","createdAt":"2026-01-02T03:04:05Z"}"#;
        let issue = parse_issue_json(raw).expect("parse");
        assert_eq!(issue.title, "Add export");
        assert_eq!(issue.body, None);
        assert_eq!(issue.labels, vec!["paid", "feature"]);
        assert_eq!(issue.created_at, "2026-01-02T03:04:05Z");
    }
}
