//! Planning workflow: bootstrap a branch and pull request, then drive an
//! agent to produce a plan document
//!
//! The `init` command walks a fixed sequence against the auxiliary tasks
//! repository: sync the task branch, push a bootstrap empty commit, open
//! (or retrieve) the planning pull request, persist the task descriptor on
//! the base branch, and merge the base branch back into the task branch so
//! the pull request carries the descriptor commit. Any failure aborts the
//! remaining sequence; completed remote side effects are left in place for
//! manual recovery or an idempotent retry via `update`.

use reforge_agent::AgentRunOptions;
use reforge_core::{
    validate_and_normalize, write_yaml, AdditionalRepo, Config, MatchedTask, ReforgeError, Result,
    Stage, Task,
};
use reforge_git::PrepareRequest;
use reforge_github::OpenPullRequestParams;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::prompt::{build_planning_prompt, AGENT_PROMPT, PROMPT_FILE_NAME};
use crate::run::{derive_timeout, resolve_workspace_root, Deadline, RunOptions};
use crate::services::Services;
use crate::task_repository::TASK_FILENAME;

/// Planning workflow command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanCommand {
    /// Bootstrap branch, pull request and descriptor, then plan
    Init,
    /// Re-plan against the existing planning pull request
    Update,
}

impl std::fmt::Display for PlanCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Update => write!(f, "update"),
        }
    }
}

impl std::str::FromStr for PlanCommand {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "init" => Ok(Self::Init),
            "update" => Ok(Self::Update),
            _ => Err(format!("Unsupported planner command: {}", s)),
        }
    }
}

/// What a planning run produced
#[derive(Debug)]
pub struct PlanOutcome {
    /// The task after its planning transitions (new value; the input task
    /// is never mutated)
    pub task: Task,
    pub result: reforge_agent::AgentRunResult,
}

/// Run the planning workflow for a matched task
pub async fn plan_task(
    command: PlanCommand,
    matched: &MatchedTask,
    services: &Services,
    config: &Config,
    options: &RunOptions,
) -> Result<PlanOutcome> {
    // Validation happens before any side effect.
    let task = validate_and_normalize(&matched.task)?;

    match command {
        PlanCommand::Init => {
            if task.idea.is_none() {
                return Err(ReforgeError::MissingIdea);
            }
        }
        PlanCommand::Update => {
            if task.planning_pr_id.is_none() {
                return Err(ReforgeError::MissingPlanningPr(command.to_string()));
            }
        }
    }

    if task.task_dir.is_empty() {
        return Err(ReforgeError::InvalidTask(
            "task_dir must be set for planning".to_string(),
        ));
    }

    let workspace_root = resolve_workspace_root(options.workspace_root.as_deref(), config);

    // The tasks repository rides along as one more working copy.
    let mut additional_repos = task.additional_repos.clone().unwrap_or_default();
    additional_repos.push(AdditionalRepo {
        repo: config.tasks_repo.clone(),
        branch: Some(config.base_branch.clone()),
        directory_name: Some(config.tasks_repo_dir.clone()),
    });

    let prepared = services
        .workspace
        .prepare(&PrepareRequest {
            repo: task.repo.clone(),
            branch: task.branch.clone(),
            additional_repos,
            root_dir: workspace_root,
        })
        .await?;

    if prepared.is_empty() {
        return Err(ReforgeError::WorkspacePreparation(
            "workspace preparation returned no paths".to_string(),
        ));
    }

    let main_workspace = prepared[0].clone();
    let tasks_workspace = find_tasks_workspace(&prepared, &config.tasks_repo_dir)?;
    let additional_workspaces: Vec<PathBuf> = prepared[1..]
        .iter()
        .filter(|path| **path != tasks_workspace)
        .cloned()
        .collect();

    let task = match command {
        PlanCommand::Init => {
            bootstrap_planning_pr(&task, services, config, &tasks_workspace).await?
        }
        PlanCommand::Update => task,
    };

    let prompt = build_planning_prompt(command, &task, &tasks_workspace);
    let prompt_path = main_workspace.join(PROMPT_FILE_NAME);
    std::fs::write(&prompt_path, &prompt)?;
    info!("Planning prompt written to: {}", prompt_path.display());

    let agent = services.agents.get(matched.selected_agent)?;
    let timeout_ms = derive_timeout(&task, options.timeout_ms, config.default_timeout_ms);
    let deadline = Deadline::start("Planner", timeout_ms, options.external_cancel.clone());

    // The tasks-repo copy is handed to the agent as one more workspace so
    // it can write the plan document there.
    let mut agent_workspaces = additional_workspaces;
    agent_workspaces.push(tasks_workspace);

    let mut run_options = AgentRunOptions::new(main_workspace, AGENT_PROMPT)
        .with_model(matched.selected_agent.canonical())
        .with_additional_workspaces(agent_workspaces);
    if let Some(sender) = &options.on_data {
        run_options = run_options.with_on_data(sender.clone());
    }

    let result = agent.run(run_options, deadline.token()).await;
    info!("Planner finished with status: {}", result.status);

    Ok(PlanOutcome { task, result })
}

fn find_tasks_workspace(prepared: &[PathBuf], tasks_repo_dir: &str) -> Result<PathBuf> {
    prepared
        .iter()
        .find(|path| {
            path.file_name()
                .map(|name| name.to_string_lossy() == tasks_repo_dir)
                .unwrap_or(false)
        })
        .cloned()
        .ok_or_else(|| {
            ReforgeError::WorkspacePreparation(format!(
                "tasks repository directory {} not found in prepared workspaces",
                tasks_repo_dir
            ))
        })
}

/// `init` steps 2-5: bootstrap commit, pull request, descriptor, merge.
///
/// Returns the task bound to the new pull request with `stage=planning`.
async fn bootstrap_planning_pr(
    task: &Task,
    services: &Services,
    config: &Config,
    tasks_workspace: &Path,
) -> Result<Task> {
    let git = &services.git;
    let (tasks_owner, tasks_repo_name) = config.tasks_repo_parts()?;
    let base = config.base_branch.as_str();

    git.ensure_branch_and_sync(tasks_workspace, &task.branch, None)
        .await?;

    info!(
        "Git: Committing empty commit in {}",
        tasks_workspace.display()
    );
    let created = git.commit_empty(tasks_workspace, "Empty commit").await?;
    if !created {
        return Err(ReforgeError::BootstrapCommit);
    }

    info!(
        "Git: Pushing branch {} to upstream from {}",
        task.branch,
        tasks_workspace.display()
    );
    git.push(tasks_workspace, &task.branch, true).await?;

    let pr = services
        .pr
        .open_or_get_pull_request(&OpenPullRequestParams {
            owner: tasks_owner.to_string(),
            repo: tasks_repo_name.to_string(),
            head_branch: task.branch.clone(),
            base_branch: Some(base.to_string()),
            title: "Auto created PR".to_string(),
            body: Some(format!(
                "Auto-created planning PR for task with idea:\n{}",
                task.idea.as_deref().unwrap_or("")
            )),
            draft: false,
        })
        .await?;
    info!(
        "Planning PR {} {}",
        pr.url,
        if pr.created { "created" } else { "already existed" }
    );

    // Descriptor lands on the base branch, then the base branch is merged
    // back so the PR branch carries it too.
    info!(
        "Git: Ensuring and syncing branch '{}' in {}",
        base,
        tasks_workspace.display()
    );
    git.ensure_branch_and_sync(tasks_workspace, base, None)
        .await?;

    let task = task
        .clone()
        .with_planning_pr(pr.number.to_string())
        .with_stage(Stage::Planning);

    let descriptor_path = tasks_workspace.join(&task.task_dir).join(TASK_FILENAME);
    write_yaml(&descriptor_path, &task)?;

    let message = format!("chore(task): add {}/task.yaml", task.task_dir);
    info!(
        "Git: Committing all changes in {} with message: \"{}\"",
        tasks_workspace.display(),
        message
    );
    git.commit_all(tasks_workspace, &message).await?;

    info!(
        "Git: Pushing branch '{}' from {}",
        base,
        tasks_workspace.display()
    );
    git.push(tasks_workspace, base, false).await?;

    info!(
        "Git: Ensuring and syncing branch {} in {}",
        task.branch,
        tasks_workspace.display()
    );
    git.ensure_branch_and_sync(tasks_workspace, &task.branch, None)
        .await?;

    info!(
        "Git: Merging branch '{}' into {} in {}",
        base,
        task.branch,
        tasks_workspace.display()
    );
    git.merge_branch(tasks_workspace, base).await?;

    info!(
        "Git: Pushing branch {} from {}",
        task.branch,
        tasks_workspace.display()
    );
    git.push(tasks_workspace, &task.branch, false).await?;

    Ok(task)
}
