//! Reforge CLI - unattended task orchestration for coding agents
//!
//! Usage:
//!   reforge pick <ideas.yaml>            Pick the next task and match an agent
//!   reforge take-from-pr --pr-number N   Locate a task by planning PR
//!   reforge plan <init|update> <file>    Run the planning workflow
//!   reforge implement <file>             Run the implementation workflow
//!   reforge house-keep                   Retire tasks with merged planning PRs
//!   reforge usage                        Show agent usage details

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use reforge_core::{AgentId, Config, MatchedTask, Stage, Task};
use reforge_github::{CodexUsage, GithubPrService, TokenCache, UsageServiceAdapter};
use reforge_orchestrator::{
    find_task_by_pr_id, implement_task, match_task_agent, pick_next_task, plan_task,
    run_house_keeper, FsTaskRepository, HouseKeeperOptions, PlanCommand, RunOptions, Services,
};
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "reforge")]
#[command(author, version, about = "Unattended task orchestration for coding agents")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pick the next task from a backlog file and match an agent
    Pick {
        /// Backlog file with a top-level `ideas:` or `tasks:` list
        ideas_file: PathBuf,

        /// Where the matched-task hand-off JSON is written
        #[arg(long, default_value = "task.json")]
        output_file: PathBuf,
    },

    /// Locate a task by its planning pull request and match an agent
    TakeFromPr {
        /// Planning pull request number
        #[arg(long)]
        pr_number: String,

        /// Directory tree scanned for task descriptors
        #[arg(long, default_value = "tasks")]
        tasks_dir: PathBuf,

        /// Where the matched-task hand-off JSON is written
        #[arg(long, default_value = "task.json")]
        output_file: PathBuf,
    },

    /// Run the planning workflow for a matched task
    Plan {
        /// init bootstraps branch/PR/descriptor; update re-plans
        command: CliPlanCommand,

        /// Matched-task hand-off JSON produced by pick/take-from-pr
        task_data: PathBuf,

        /// Overrides the configured workspace root
        #[arg(long)]
        workspace_root: Option<String>,

        /// Overrides the agent execution budget
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Run the implementation workflow for a matched task
    Implement {
        /// Matched-task hand-off JSON produced by pick/take-from-pr
        task_data: PathBuf,

        /// Overrides the configured workspace root
        #[arg(long)]
        workspace_root: Option<String>,

        /// Overrides the agent execution budget
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Retire tasks whose planning pull request has merged
    HouseKeep {
        /// Directory holding active task records
        #[arg(long)]
        tasks_root: Option<PathBuf>,

        /// Sibling directory completed records move into
        #[arg(long)]
        completed_dir: Option<String>,
    },

    /// Show usage details for an agent account
    Usage {
        /// Agent to inspect
        #[arg(long, default_value = "codex")]
        agent: String,
    },
}

/// CLI-friendly planning command
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliPlanCommand {
    Init,
    Update,
}

impl From<CliPlanCommand> for PlanCommand {
    fn from(command: CliPlanCommand) -> Self {
        match command {
            CliPlanCommand::Init => PlanCommand::Init,
            CliPlanCommand::Update => PlanCommand::Update,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Pick {
            ideas_file,
            output_file,
        } => cmd_pick(ideas_file, output_file).await,
        Commands::TakeFromPr {
            pr_number,
            tasks_dir,
            output_file,
        } => cmd_take_from_pr(pr_number, tasks_dir, output_file).await,
        Commands::Plan {
            command,
            task_data,
            workspace_root,
            timeout_ms,
        } => cmd_plan(command.into(), task_data, workspace_root, timeout_ms).await,
        Commands::Implement {
            task_data,
            workspace_root,
            timeout_ms,
        } => cmd_implement(task_data, workspace_root, timeout_ms).await,
        Commands::HouseKeep {
            tasks_root,
            completed_dir,
        } => cmd_house_keep(tasks_root, completed_dir).await,
        Commands::Usage { agent } => cmd_usage(agent).await,
    }
}

async fn write_matched_task(entry: &Task, output_file: &PathBuf) -> Result<()> {
    let usage = UsageServiceAdapter::new();
    let matched = match_task_agent(entry, &usage).await?;

    let serialized = serde_json::to_string(&matched)?;
    std::fs::write(output_file, serialized)
        .with_context(|| format!("failed to write {}", output_file.display()))?;

    info!("Task data written to {}", output_file.display());
    println!(
        "Matched {}@{} -> {}",
        matched.task.repo, matched.task.branch, matched.selected_agent
    );

    Ok(())
}

async fn cmd_pick(ideas_file: PathBuf, output_file: PathBuf) -> Result<()> {
    info!("Reading backlog file: {}", ideas_file.display());
    let task = pick_next_task(&ideas_file)?;
    write_matched_task(&task, &output_file).await
}

async fn cmd_take_from_pr(
    pr_number: String,
    tasks_dir: PathBuf,
    output_file: PathBuf,
) -> Result<()> {
    let found = find_task_by_pr_id(&tasks_dir, &pr_number).with_context(|| {
        format!(
            "no task found for PR number {} in {}",
            pr_number,
            tasks_dir.display()
        )
    })?;

    let contents = std::fs::read_to_string(&found)?;
    let task: Task = serde_yaml::from_str(&contents)
        .with_context(|| format!("failed to parse {}", found.display()))?;

    write_matched_task(&task, &output_file).await
}

fn read_matched_task(task_data: &PathBuf, expected_stage: Stage) -> Result<MatchedTask> {
    let contents = std::fs::read_to_string(task_data)
        .with_context(|| format!("failed to read {}", task_data.display()))?;
    let matched: MatchedTask = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse {}", task_data.display()))?;

    if matched.task.stage != expected_stage {
        warn!(
            "Warning: task stage is \"{}\", but \"{}\" is expected. Continuing...",
            matched.task.stage, expected_stage
        );
    }

    Ok(matched)
}

fn print_run_result(label: &str, result: &reforge_agent::AgentRunResult) {
    println!("{} finished with status: {}", label, result.status);
    if !result.logs.is_empty() {
        println!("{} logs:\n{}", label, result.logs);
    }
    if let Some(diagnostics) = &result.diagnostics {
        println!("{} diagnostics: {:?}", label, diagnostics);
    }
}

async fn cmd_plan(
    command: PlanCommand,
    task_data: PathBuf,
    workspace_root: Option<String>,
    timeout_ms: Option<u64>,
) -> Result<()> {
    let matched = read_matched_task(&task_data, Stage::Planning)?;
    let config = Config::load_or_default(&std::env::current_dir()?)?;
    let services = Services::default_services()?;

    let options = RunOptions {
        workspace_root,
        timeout_ms,
        ..RunOptions::default()
    };

    let outcome = plan_task(command, &matched, &services, &config, &options).await?;
    print_run_result("Planner", &outcome.result);

    if let Some(pr_id) = &outcome.task.planning_pr_id {
        println!("Planning PR: #{}", pr_id);
    }

    if !outcome.result.is_success() {
        bail!("Planner finished with status {}", outcome.result.status);
    }

    Ok(())
}

async fn cmd_implement(
    task_data: PathBuf,
    workspace_root: Option<String>,
    timeout_ms: Option<u64>,
) -> Result<()> {
    let matched = read_matched_task(&task_data, Stage::Implementing)?;
    let config = Config::load_or_default(&std::env::current_dir()?)?;
    let services = Services::default_services()?;

    let options = RunOptions {
        workspace_root,
        timeout_ms,
        ..RunOptions::default()
    };

    let result = implement_task(&matched, &services, &config, &options).await?;
    print_run_result("Implementor", &result);

    if !result.is_success() {
        bail!("Implementor finished with status {}", result.status);
    }

    Ok(())
}

async fn cmd_house_keep(
    tasks_root: Option<PathBuf>,
    completed_dir: Option<String>,
) -> Result<()> {
    let config = Config::load_or_default(&std::env::current_dir()?)?;
    let tasks_root = tasks_root.unwrap_or_else(|| PathBuf::from(&config.tasks_root));
    let completed_dir = completed_dir.unwrap_or_else(|| config.completed_dir.clone());

    let tokens = TokenCache::new();
    let pull_requests = GithubPrService::from_env(&tokens)?;
    let repository = FsTaskRepository::new(completed_dir);

    run_house_keeper(
        &HouseKeeperOptions { tasks_root },
        &repository,
        &pull_requests,
    )
    .await?;

    Ok(())
}

async fn cmd_usage(agent: String) -> Result<()> {
    let agent: AgentId = agent
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    match agent {
        AgentId::OpenaiCodex => {
            let details = CodexUsage::new()?.usage_details().await?;
            println!("Plan: {}", details.plan_type);
            println!("Weekly usage so far: {:.2}%", details.consumed_allowance);
            println!(
                "Remaining for today: {:.2}%",
                details.remaining_for_today
            );
            println!(
                "Primary limit resets in {}",
                reforge_github::format_seconds(details.primary_window.reset_after_seconds)
            );
            println!(
                "Weekly limit resets in {}",
                reforge_github::format_seconds(details.secondary_window.reset_after_seconds)
            );
            if details.limit_reached {
                println!("Limit reached for this window.");
            }
        }
        AgentId::GoogleGemini25Pro | AgentId::GoogleGemini25Flash => {
            println!("Usage reporting is not available for {} yet.", agent);
        }
    }

    Ok(())
}
