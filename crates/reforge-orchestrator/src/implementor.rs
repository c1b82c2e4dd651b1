//! Implementation workflow: apply the plan through an agent

use reforge_agent::{AgentRunOptions, AgentRunResult};
use reforge_core::{validate_and_normalize, Config, MatchedTask, ReforgeError, Result};
use reforge_git::PrepareRequest;
use reforge_github::OpenPullRequestParams;
use std::collections::BTreeMap;
use tracing::info;

use crate::prompt::build_implementation_prompt;
use crate::run::{derive_timeout, resolve_workspace_root, Deadline, RunOptions};
use crate::services::Services;

/// Run the implementation workflow for a matched task.
///
/// The agent is instructed to apply `task_dir/plan.md`; a missing plan is
/// reported by the agent, not validated here. When the run succeeds and
/// the task requires review, an implementation pull request is ensured
/// (idempotently) with a title derived from repo, branch and task
/// directory.
pub async fn implement_task(
    matched: &MatchedTask,
    services: &Services,
    config: &Config,
    options: &RunOptions,
) -> Result<AgentRunResult> {
    let task = validate_and_normalize(&matched.task)?;

    let (owner, repo_name) = task.repo_parts().ok_or_else(|| {
        ReforgeError::InvalidTask(format!(
            "task repo must be in \"owner/name\" form, got \"{}\"",
            task.repo
        ))
    })?;

    let workspace_root = resolve_workspace_root(options.workspace_root.as_deref(), config);
    info!(
        "Preparing workspace for implementation: {}@{} (root: {})",
        task.repo,
        task.branch,
        workspace_root.display()
    );

    let prepared = services
        .workspace
        .prepare(&PrepareRequest {
            repo: task.repo.clone(),
            branch: task.branch.clone(),
            additional_repos: task.additional_repos.clone().unwrap_or_default(),
            root_dir: workspace_root,
        })
        .await?;

    if prepared.is_empty() {
        return Err(ReforgeError::WorkspacePreparation(
            "workspace preparation returned no paths".to_string(),
        ));
    }

    let main_workspace = prepared[0].clone();
    let additional_workspaces = prepared[1..].to_vec();

    let agent = services.agents.get(matched.selected_agent)?;
    let timeout_ms = derive_timeout(&task, options.timeout_ms, config.default_timeout_ms);
    let deadline = Deadline::start("Implementor", timeout_ms, options.external_cancel.clone());

    let prompt = build_implementation_prompt(&task, &main_workspace);
    let mut metadata = BTreeMap::new();
    metadata.insert(
        "plan_path".to_string(),
        main_workspace
            .join(&task.task_dir)
            .join("plan.md")
            .display()
            .to_string(),
    );

    let mut run_options = AgentRunOptions::new(main_workspace, prompt)
        .with_model(matched.selected_agent.canonical())
        .with_additional_workspaces(additional_workspaces)
        .with_metadata(metadata);
    if let Some(sender) = &options.on_data {
        run_options = run_options.with_on_data(sender.clone());
    }

    let result = agent.run(run_options, deadline.token()).await;
    info!("Implementor finished with status: {}", result.status);

    if result.is_success() && task.requires_review() {
        let title = format!("feat({}@{}): {}", task.repo, task.branch, task.task_dir);
        info!(
            "Ensuring implementation PR exists for {}@{} (title: \"{}\")",
            task.repo, task.branch, title
        );
        services
            .pr
            .open_or_get_pull_request(&OpenPullRequestParams {
                owner: owner.to_string(),
                repo: repo_name.to_string(),
                head_branch: task.branch.clone(),
                base_branch: None,
                title,
                body: Some(result.logs.clone()),
                draft: false,
            })
            .await?;
    }

    Ok(result)
}
