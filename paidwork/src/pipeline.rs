//! End-to-end handling of one work item: execute, then publish.

use chrono::Utc;
use thiserror::Error;
use tracing::{info, instrument};

use crate::core::types::{PublishOutcome, PublishStage};
use crate::core::work_item::WorkItem;
use crate::execute::{ExecuteOptions, ExecutionError, ExecutionReport, execute};
use crate::io::agent::ImplementationAgent;
use crate::io::git::{CheckoutGuard, Git};
use crate::io::templates::MessageTemplates;
use crate::publish::{PublishError, PublishOptions, Publisher, publish};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// Result of [`run_work_item`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub execution: ExecutionReport,
    /// `None` when publishing was skipped.
    pub publish: Option<PublishOutcome>,
}

/// Everything a pipeline run needs besides the work item.
pub struct PipelineContext<'a> {
    pub git: &'a Git,
    pub agent: &'a dyn ImplementationAgent,
    pub templates: &'a MessageTemplates,
    pub publisher: Publisher<'a>,
    pub execute_options: ExecuteOptions,
    pub publish_options: PublishOptions,
}

/// Execute `item` and, unless `skip_publish`, publish its artifacts.
///
/// The branch checked out on entry is restored on every exit path.
#[instrument(skip_all, fields(branch = item.branch(), skip_publish))]
pub fn run_work_item(
    ctx: &PipelineContext<'_>,
    item: &WorkItem,
    skip_publish: bool,
) -> Result<RunReport, PipelineError> {
    let _guard = CheckoutGuard::new(ctx.git);
    let execution = execute(ctx.git, item, ctx.agent, ctx.templates, &ctx.execute_options)?;
    if skip_publish {
        info!("publish skipped");
        return Ok(RunReport {
            execution,
            publish: None,
        });
    }
    let outcome = publish(
        ctx.git.workdir(),
        &execution.item,
        &ctx.publisher,
        &ctx.publish_options,
        Utc::now().timestamp(),
    )?;
    Ok(RunReport {
        execution,
        publish: Some(outcome),
    })
}

/// Publish an already executed item again from its private branch.
#[instrument(skip_all, fields(branch = item.branch()))]
pub fn publish_executed(ctx: &PipelineContext<'_>, item: &WorkItem) -> Result<PublishOutcome, PublishError> {
    let _guard = CheckoutGuard::new(ctx.git);
    ctx.git
        .ensure_clean()
        .and_then(|()| {
            ctx.git
                .checkout_remote_branch(&ctx.execute_options.remote, item.branch())
        })
        .map_err(|cause| PublishError::Stage {
            stage: PublishStage::Checkout,
            cause,
        })?;
    publish(
        ctx.git.workdir(),
        item,
        &ctx.publisher,
        &ctx.publish_options,
        Utc::now().timestamp(),
    )
}
