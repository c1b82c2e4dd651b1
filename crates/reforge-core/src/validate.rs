//! Task entry validation and normalization

use crate::error::{ReforgeError, Result};
use crate::types::Task;

/// Validate a raw backlog/descriptor entry and return a normalized task.
///
/// String fields are trimmed; `repo` and `branch` must be non-empty. The
/// caller decides which optional fields (idea, planning_pr_id) its command
/// additionally requires.
pub fn validate_and_normalize(entry: &Task) -> Result<Task> {
    let mut task = entry.clone();

    task.repo = task.repo.trim().to_string();
    task.branch = task.branch.trim().to_string();
    task.kind = task.kind.trim().to_string();
    task.task_dir = task.task_dir.trim().to_string();

    if task.repo.is_empty() || task.branch.is_empty() {
        return Err(ReforgeError::InvalidTask(
            "task repo and branch must be defined".to_string(),
        ));
    }

    if let Some(idea) = &task.idea {
        let trimmed = idea.trim();
        task.idea = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
    }

    Ok(task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Priority, Stage};

    fn entry() -> Task {
        Task {
            repo: "  owner/name ".to_string(),
            branch: " main".to_string(),
            kind: "feature ".to_string(),
            stage: Stage::Planning,
            priority: Priority::Medium,
            agents: Vec::new(),
            idea: Some("  idea text ".to_string()),
            planning_pr_id: None,
            review_required: None,
            task_dir: " tasks/x ".to_string(),
            additional_repos: None,
            timeout_ms: None,
        }
    }

    #[test]
    fn test_trims_fields() {
        let task = validate_and_normalize(&entry()).unwrap();
        assert_eq!(task.repo, "owner/name");
        assert_eq!(task.branch, "main");
        assert_eq!(task.kind, "feature");
        assert_eq!(task.task_dir, "tasks/x");
        assert_eq!(task.idea.as_deref(), Some("idea text"));
    }

    #[test]
    fn test_rejects_empty_repo() {
        let mut bad = entry();
        bad.repo = "   ".to_string();
        assert!(matches!(
            validate_and_normalize(&bad),
            Err(ReforgeError::InvalidTask(_))
        ));
    }

    #[test]
    fn test_rejects_empty_branch() {
        let mut bad = entry();
        bad.branch = String::new();
        assert!(matches!(
            validate_and_normalize(&bad),
            Err(ReforgeError::InvalidTask(_))
        ));
    }

    #[test]
    fn test_blank_idea_becomes_none() {
        let mut e = entry();
        e.idea = Some("   ".to_string());
        let task = validate_and_normalize(&e).unwrap();
        assert!(task.idea.is_none());
    }
}
