//! Print a feature description for a source-repository issue.
//!
//! Used by the implementation agent to turn a paid issue into the text its
//! templates start from.

use std::process;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use tracing::debug;

use paidwork::core::feature::render_feature;
use paidwork::io::config::PipelineConfig;
use paidwork::io::credentials::{env_lookup, source_token};
use paidwork::io::github::{CodeHost, GhCli};
use paidwork::logging;

#[derive(Parser, Debug)]
#[command(
    name = "extract-feature",
    version,
    about = "Print a feature description for a GitHub issue"
)]
struct Cli {
    /// Issue number.
    #[arg(long, value_name = "ID")]
    issue: u64,

    /// Repository as owner/name (default: $GITHUB_REPOSITORY).
    #[arg(long, value_name = "OWNER/NAME")]
    repo: Option<String>,
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let token = source_token(env_lookup)
        .ok_or_else(|| anyhow!("no GitHub token; set GH_TOKEN or GITHUB_TOKEN"))?;
    let repo = resolve_repo(cli.repo, env_lookup)?;
    let host = GhCli::new(token, PipelineConfig::default().network_timeout());
    print!("{}", extract(&host, &repo, cli.issue)?);
    Ok(())
}

fn resolve_repo<F>(flag: Option<String>, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let repo = flag
        .or_else(|| lookup("GITHUB_REPOSITORY"))
        .map(|repo| repo.trim().to_string())
        .filter(|repo| !repo.is_empty())
        .ok_or_else(|| anyhow!("repository unknown; pass --repo or set GITHUB_REPOSITORY"))?;
    match repo.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok(repo)
        }
        _ => bail!("repository '{repo}' must be in owner/name form"),
    }
}

fn extract(host: &dyn CodeHost, repo: &str, issue: u64) -> Result<String> {
    debug!(repo, issue, "fetching issue");
    let details = host
        .fetch_issue(repo, issue)
        .with_context(|| format!("fetch issue {repo}#{issue}"))?;
    Ok(render_feature(&details))
}

#[cfg(test)]
mod tests {
    use super::*;
    use paidwork::test_support::{FailingHost, RecordingHost};

    #[test]
    fn repo_flag_wins_over_environment() {
        let repo = resolve_repo(Some("acme/widgets".to_string()), |_| {
            Some("other/repo".to_string())
        })
        .expect("repo");
        assert_eq!(repo, "acme/widgets");

        let repo = resolve_repo(None, |name| {
            (name == "GITHUB_REPOSITORY").then(|| "acme/from-env".to_string())
        })
        .expect("repo");
        assert_eq!(repo, "acme/from-env");
    }

    #[test]
    fn unknown_or_malformed_repo_is_rejected() {
        assert!(resolve_repo(None, |_| None).is_err());
        assert!(resolve_repo(Some("widgets".to_string()), |_| None).is_err());
        assert!(resolve_repo(Some("a/b/c".to_string()), |_| None).is_err());
    }

    #[test]
    fn extract_renders_fetched_issue() {
        let text = extract(&RecordingHost::default(), "acme/widgets", 7).expect("extract");
        assert_eq!(
            text,
            "Feature: Issue 7\n\n\n\n# Labels: \n# Issue URL: https://github.com/acme/widgets/issues/7\n# Created: 2026-01-02T03:04:05Z\n"
        );
    }

    #[test]
    fn fetch_failure_is_reported_with_issue() {
        let host = FailingHost {
            message: "HTTP 404".to_string(),
        };
        let err = extract(&host, "acme/widgets", 7).unwrap_err();
        assert_eq!(format!("{err:#}"), "fetch issue acme/widgets#7: HTTP 404");
    }
}
