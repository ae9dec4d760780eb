//! Commit message and pull request text rendered from embedded templates.

use anyhow::Result;
use minijinja::{Environment, context};

use crate::core::types::AgentContext;

const EXECUTION_COMMIT_TEMPLATE: &str = include_str!("templates/execution_commit.txt");
const PUBLISH_COMMIT_TEMPLATE: &str = include_str!("templates/publish_commit.txt");
const PR_TITLE_TEMPLATE: &str = include_str!("templates/pr_title.txt");
const PR_BODY_TEMPLATE: &str = include_str!("templates/pr_body.md");

/// Template engine wrapper around minijinja.
pub struct MessageTemplates {
    env: Environment<'static>,
}

impl Default for MessageTemplates {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageTemplates {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("execution_commit", EXECUTION_COMMIT_TEMPLATE)
            .expect("execution commit template should be valid");
        env.add_template("publish_commit", PUBLISH_COMMIT_TEMPLATE)
            .expect("publish commit template should be valid");
        env.add_template("pr_title", PR_TITLE_TEMPLATE)
            .expect("pr title template should be valid");
        env.add_template("pr_body", PR_BODY_TEMPLATE)
            .expect("pr body template should be valid");
        Self { env }
    }

    /// Private-branch commit recording a finished execution.
    pub fn execution_commit(&self, ctx: &AgentContext) -> Result<String> {
        self.render("execution_commit", ctx)
    }

    /// Public-clone commit carrying the filtered artifacts.
    pub fn publish_commit(&self, ctx: &AgentContext) -> Result<String> {
        self.render("publish_commit", ctx)
    }

    pub fn pr_title(&self, ctx: &AgentContext) -> Result<String> {
        self.render("pr_title", ctx)
    }

    pub fn pr_body(&self, ctx: &AgentContext) -> Result<String> {
        self.render("pr_body", ctx)
    }

    fn render(&self, name: &str, ctx: &AgentContext) -> Result<String> {
        let template = self.env.get_template(name)?;
        let rendered = template.render(context! {
            public_repo => &ctx.public_repo,
            public_issue => ctx.public_issue,
            private_issue => ctx.private_issue,
            invoice_id => &ctx.invoice_id,
            branch => &ctx.branch,
        })?;
        Ok(rendered.trim_end().to_string())
    }
}
