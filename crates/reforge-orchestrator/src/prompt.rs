//! Prompt builders for the planning and implementation workflows

use reforge_core::Task;
use std::path::Path;

use crate::planner::PlanCommand;

/// File the rendered planning prompt is written to inside the main
/// working copy
pub const PROMPT_FILE_NAME: &str = "planning-prompt.md";

/// The instruction actually sent to the agent after the prompt file is
/// written
pub const AGENT_PROMPT: &str =
    "Read the prompt file ./planning-prompt.md in this workspace and execute.";

/// Build the planning prompt for one task
///
/// The `init` variant asks for a fresh plan from the idea; the `update`
/// variant asks for a revision of the existing one. Both instruct the
/// agent to write the plan document into the tasks-repository working
/// copy.
pub fn build_planning_prompt(
    command: PlanCommand,
    task: &Task,
    tasks_repo_workspace: &Path,
) -> String {
    let mut prompt = String::new();

    match command {
        PlanCommand::Init => {
            prompt.push_str("# PLANNING TASK\n\n");
            prompt.push_str("Produce an implementation plan for the idea below.\n\n");
            prompt.push_str("## IDEA\n\n");
            prompt.push_str(task.idea.as_deref().unwrap_or(""));
            prompt.push_str("\n\n");
        }
        PlanCommand::Update => {
            prompt.push_str("# PLANNING UPDATE\n\n");
            prompt.push_str(
                "Revise the existing implementation plan for this task. Read the current plan, incorporate review feedback left on the planning pull request, and rewrite the plan document in place.\n\n",
            );
            if let Some(pr_id) = &task.planning_pr_id {
                prompt.push_str(&format!("Planning pull request: #{}\n\n", pr_id));
            }
        }
    }

    prompt.push_str("## TARGET\n\n");
    prompt.push_str(&format!("- Repository: {}\n", task.repo));
    prompt.push_str(&format!("- Branch: {}\n", task.branch));
    if !task.kind.is_empty() {
        prompt.push_str(&format!("- Kind: {}\n", task.kind));
    }
    prompt.push('\n');

    prompt.push_str("## OUTPUT\n\n");
    prompt.push_str(&format!(
        "Write the plan as markdown to {}/plan.md inside the tasks repository working copy at {}.\n",
        task.task_dir,
        tasks_repo_workspace.display()
    ));
    prompt.push_str(
        "Explore the main repository in the current workspace to ground the plan in the real code. Do not implement anything yet; the plan is the only deliverable.\n",
    );

    prompt
}

/// Build the implementation prompt for one task
pub fn build_implementation_prompt(task: &Task, main_workspace: &Path) -> String {
    let plan_path = format!("{}/plan.md", task.task_dir);

    let lines = [
        format!(
            "Implement the work described in the plan located at {}.",
            plan_path
        ),
        "If the plan file is missing, report the issue and stop.".to_string(),
        format!(
            "Work inside the current repository at {}.",
            main_workspace.display()
        ),
        "Coordinate with additional workspaces when provided.".to_string(),
        format!(
            "Ensure changes align with the branch {} and respect review settings.",
            task.branch
        ),
    ];

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use reforge_core::{Priority, Stage};

    fn task() -> Task {
        Task {
            repo: "owner/app".to_string(),
            branch: "feat/x".to_string(),
            kind: "feature".to_string(),
            stage: Stage::Planning,
            priority: Priority::Medium,
            agents: Vec::new(),
            idea: Some("add dark mode".to_string()),
            planning_pr_id: Some("42".to_string()),
            review_required: None,
            task_dir: "tasks/dark-mode".to_string(),
            additional_repos: None,
            timeout_ms: None,
        }
    }

    #[test]
    fn test_init_prompt_contains_idea_and_plan_target() {
        let prompt = build_planning_prompt(PlanCommand::Init, &task(), Path::new("/ws/tasks-repo"));
        assert!(prompt.contains("add dark mode"));
        assert!(prompt.contains("tasks/dark-mode/plan.md"));
        assert!(prompt.contains("/ws/tasks-repo"));
    }

    #[test]
    fn test_update_prompt_references_pr() {
        let prompt =
            build_planning_prompt(PlanCommand::Update, &task(), Path::new("/ws/tasks-repo"));
        assert!(prompt.contains("PLANNING UPDATE"));
        assert!(prompt.contains("#42"));
        assert!(!prompt.contains("add dark mode"));
    }

    #[test]
    fn test_implementation_prompt_names_plan_and_branch() {
        let prompt = build_implementation_prompt(&task(), Path::new("/ws"));
        assert!(prompt.contains("tasks/dark-mode/plan.md"));
        assert!(prompt.contains("branch feat/x"));
        assert!(prompt.contains("report the issue and stop"));
    }
}
