//! # reforge-orchestrator
//!
//! Task orchestration workflows for reforge.
//!
//! This crate provides:
//! - The task matcher/picker selecting the next unit of work from a backlog
//! - The planning workflow bootstrapping a branch and pull request, then
//!   driving an agent to produce a plan document
//! - The implementation workflow applying a plan through an agent
//! - The house keeper retiring tasks whose planning pull request merged
//! - The `Services` composition root wiring the real collaborators

mod house_keeper;
mod implementor;
mod matcher;
mod planner;
mod prompt;
mod run;
mod services;
mod task_repository;

#[cfg(test)]
mod testutil;

pub use house_keeper::{run_house_keeper, HouseKeeperOptions};
pub use implementor::implement_task;
pub use matcher::{find_task_by_pr_id, match_task_agent, pick_next_task};
pub use planner::{plan_task, PlanCommand, PlanOutcome};
pub use prompt::{build_implementation_prompt, build_planning_prompt, AGENT_PROMPT, PROMPT_FILE_NAME};
pub use run::{derive_timeout, resolve_workspace_root, Deadline, RunOptions};
pub use services::Services;
pub use task_repository::{FsTaskRepository, TaskRecord, TaskRepository, TASK_FILENAME};
