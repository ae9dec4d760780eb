//! Paid-issue pipeline CLI.
//!
//! Scans the private repository for `paid/*` work items, then lists them,
//! executes one (by public issue or the next ready), or re-publishes an
//! executed one. Results go to stdout; diagnostics go to stderr.

use std::env;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result, bail};
use clap::{ArgGroup, Parser};

use paidwork::core::filter::ContentFilter;
use paidwork::core::selector::{Selection, select_executed, select_ready};
use paidwork::core::types::PublishOutcome;
use paidwork::core::work_item::WorkItem;
use paidwork::execute::{ExecuteOptions, ExecutionError};
use paidwork::exit_codes;
use paidwork::io::agent::CommandAgent;
use paidwork::io::config::{default_config_path, load_config};
use paidwork::io::credentials::{env_lookup, public_token};
use paidwork::io::git::Git;
use paidwork::io::github::GhCli;
use paidwork::io::templates::MessageTemplates;
use paidwork::logging;
use paidwork::pipeline::{PipelineContext, PipelineError, publish_executed, run_work_item};
use paidwork::publish::{PublishError, PublishOptions, Publisher};
use paidwork::scan::scan_work_items;

#[derive(Parser, Debug)]
#[command(
    name = "paidwork",
    version,
    about = "Execute paid issues and publish them as draft pull requests"
)]
#[command(group(
    ArgGroup::new("action")
        .required(true)
        .args(["list", "issue", "next", "publish"])
))]
struct Cli {
    /// List work items with their status.
    #[arg(long)]
    list: bool,

    /// Execute the ready work item for this public issue number.
    #[arg(long, value_name = "ID")]
    issue: Option<u64>,

    /// Execute the lowest-numbered ready work item.
    #[arg(long)]
    next: bool,

    /// Publish the already executed work item for this public issue number.
    #[arg(long, value_name = "ID")]
    publish: Option<u64>,

    /// Execute without publishing.
    #[arg(long, conflicts_with_all = ["list", "publish"])]
    skip_publish: bool,

    /// Private repository working tree (default: current directory).
    #[arg(long, value_name = "PATH")]
    repo: Option<PathBuf>,

    /// Config file (default: `.git/paidwork/paidwork.toml` in the repository).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

impl Cli {
    fn needs_publish(&self) -> bool {
        self.publish.is_some() || ((self.issue.is_some() || self.next) && !self.skip_publish)
    }
}

fn main() {
    logging::init();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() {
                exit_codes::INVALID
            } else {
                exit_codes::OK
            };
            let _ = err.print();
            process::exit(code);
        }
    };
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            exit_codes::INVALID
        }
    };
    process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let root = match &cli.repo {
        Some(path) => path.clone(),
        None => env::current_dir().context("resolve current directory")?,
    };
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| default_config_path(&root));
    let config = load_config(&config_path)?;

    let token = public_token(env_lookup);
    if cli.needs_publish() && token.is_none() {
        bail!("{}", PublishError::MissingCredential);
    }

    let git = Git::new(&root);
    let items = scan_work_items(&git, &config.remote, config.network_timeout())
        .with_context(|| format!("scan work items in {}", root.display()))?;
    if cli.list {
        print_items(&items);
        return Ok(exit_codes::OK);
    }

    let filter = ContentFilter::new(&config.filter).context("compile filter rules")?;
    let templates = MessageTemplates::new();
    let host = GhCli::new(token.clone().unwrap_or_default(), config.network_timeout());
    let agent = CommandAgent::new(config.agent.command.clone());
    let ctx = PipelineContext {
        git: &git,
        agent: &agent,
        templates: &templates,
        publisher: Publisher {
            host: &host,
            filter: &filter,
            templates: &templates,
            token: token.as_deref(),
        },
        execute_options: ExecuteOptions::from_config(&config),
        publish_options: PublishOptions::from_config(&config, &root),
    };

    if let Some(issue) = cli.publish {
        let Some(item) = select_executed(&items, issue) else {
            eprintln!("no executed work item for issue {issue}");
            return Ok(exit_codes::NOT_FOUND);
        };
        return Ok(match publish_executed(&ctx, item) {
            Ok(outcome) => report_publish(&outcome),
            Err(err) => {
                eprintln!("publish failed: {err}");
                exit_codes::PUBLISH_FAILED
            }
        });
    }

    let selection = match cli.issue {
        Some(issue) => Selection::Issue(issue),
        None => Selection::Next,
    };
    let Some(item) = select_ready(&items, selection) else {
        return Ok(match selection {
            Selection::Issue(issue) => {
                eprintln!("no ready work item for issue {issue}");
                exit_codes::NOT_FOUND
            }
            Selection::Next => {
                println!("no work items ready for execution");
                exit_codes::OK
            }
        });
    };

    Ok(match run_work_item(&ctx, item, cli.skip_publish) {
        Ok(report) => {
            let executed = &report.execution.item;
            println!(
                "executed issue {} on {}",
                executed.public_issue(),
                executed.branch()
            );
            match &report.publish {
                Some(outcome) => report_publish(outcome),
                None => exit_codes::OK,
            }
        }
        Err(PipelineError::Execution(err)) => {
            eprintln!("execution failed: {err}");
            match err {
                ExecutionError::NotReady { .. } => exit_codes::NOT_FOUND,
                _ => exit_codes::EXECUTION_FAILED,
            }
        }
        Err(PipelineError::Publish(err)) => {
            eprintln!("publish failed: {err}");
            exit_codes::PUBLISH_FAILED
        }
    })
}

fn print_items(items: &[WorkItem]) {
    if items.is_empty() {
        println!("no work items found");
        return;
    }
    for item in items {
        let executed_at = item
            .record()
            .executed_at
            .map(|at| at.format("%Y-%m-%dT%H:%M:%SZ").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}\t{}\t{}\t{}",
            item.public_issue(),
            item.status(),
            item.branch(),
            executed_at
        );
    }
}

fn report_publish(outcome: &PublishOutcome) -> i32 {
    match outcome {
        PublishOutcome::Published {
            branch,
            pull_request,
        } => {
            println!(
                "opened draft pull request #{} from {branch}: {}",
                pull_request.number, pull_request.url
            );
        }
        PublishOutcome::PushedWithoutPullRequest { branch, warning } => {
            println!("pushed {branch}");
            eprintln!("warning: pull request not created: {warning}");
        }
        PublishOutcome::NoChanges => {
            println!("public repository already up to date; nothing published");
        }
    }
    exit_codes::OK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_issue_with_modifiers() {
        let cli = Cli::parse_from(["paidwork", "--issue", "7", "--skip-publish", "--repo", "/r"]);
        assert_eq!(cli.issue, Some(7));
        assert!(cli.skip_publish);
        assert_eq!(cli.repo, Some(PathBuf::from("/r")));
        assert!(!cli.needs_publish());
    }

    #[test]
    fn actions_are_mutually_exclusive_and_required() {
        assert!(Cli::try_parse_from(["paidwork", "--list", "--next"]).is_err());
        assert!(Cli::try_parse_from(["paidwork"]).is_err());
        assert!(Cli::try_parse_from(["paidwork", "--list", "--skip-publish"]).is_err());
    }

    #[test]
    fn publish_needs_credential_unless_skipped() {
        assert!(Cli::parse_from(["paidwork", "--next"]).needs_publish());
        assert!(Cli::parse_from(["paidwork", "--publish", "7"]).needs_publish());
        assert!(!Cli::parse_from(["paidwork", "--list"]).needs_publish());
    }
}
