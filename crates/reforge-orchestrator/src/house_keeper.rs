//! House keeper: retire tasks whose planning pull request has merged

use reforge_core::{Result, Stage};
use reforge_github::PullRequestService;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use crate::task_repository::{TaskRecord, TaskRepository};

/// Options for one sweep
#[derive(Debug, Clone)]
pub struct HouseKeeperOptions {
    pub tasks_root: PathBuf,
}

fn should_skip(record: &TaskRecord) -> bool {
    record.task.planning_pr_id.is_none() || record.task.stage == Stage::Completed
}

/// Sweep all active task records, relocating those whose planning pull
/// request has merged.
///
/// Failures are isolated per task: a record with a malformed descriptor
/// is skipped with a warning, a pull-request query error is logged and
/// the sweep continues. The sweep itself only fails when the records
/// cannot be listed at all.
pub async fn run_house_keeper(
    options: &HouseKeeperOptions,
    repository: &dyn TaskRepository,
    pull_requests: &dyn PullRequestService,
) -> Result<()> {
    let records = repository.list_active_tasks(&options.tasks_root)?;

    if records.is_empty() {
        info!(
            "No active tasks found under {}.",
            options.tasks_root.display()
        );
        return Ok(());
    }

    for record in records {
        if should_skip(&record) {
            continue;
        }

        let pr_id = record.task.planning_pr_id.as_deref().unwrap_or_default();
        let Ok(pull_number) = pr_id.parse::<u64>() else {
            warn!(
                "Skipping task at {}; invalid planning_pr_id \"{}\".",
                record.relative_dir, pr_id
            );
            continue;
        };

        let Some((owner, repo)) = record.task.repo_parts() else {
            warn!(
                "Skipping task at {}; invalid repo slug \"{}\".",
                record.relative_dir, record.task.repo
            );
            continue;
        };

        let status = match pull_requests
            .get_pull_request_status(owner, repo, pull_number)
            .await
        {
            Ok(status) => status,
            Err(e) => {
                error!(
                    "Failed to fetch PR status for {}#{}: {}",
                    record.task.repo, pull_number, e
                );
                continue;
            }
        };

        if !status.merged {
            debug!(
                "PR {}#{} ({}) not merged; task {} remains active.",
                record.task.repo, pull_number, status.state, record.relative_dir
            );
            continue;
        }

        match repository.mark_task_completed(&record) {
            Ok(destination) => {
                info!(
                    "Task {} moved to {} after PR merge.",
                    record.relative_dir,
                    destination.display()
                );
            }
            Err(e) => {
                error!(
                    "Failed to relocate task {} after PR merge: {}",
                    record.relative_dir, e
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task_repository::{FsTaskRepository, TASK_FILENAME};
    use reforge_core::{read_yaml, write_yaml, Task};
    use reforge_github::MockPullRequestService;
    use std::path::Path;

    fn write_task(root: &Path, dir: &str, yaml: &str) {
        let task: Task = serde_yaml::from_str(yaml).unwrap();
        write_yaml(&root.join(dir).join(TASK_FILENAME), &task).unwrap();
    }

    #[tokio::test]
    async fn test_only_merged_tasks_are_relocated() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write_task(
            root,
            "merged-task",
            "repo: o/r\nbranch: a\nplanning_pr_id: '101'\ntask_dir: tasks/merged-task\n",
        );
        write_task(
            root,
            "open-task",
            "repo: o/r\nbranch: b\nplanning_pr_id: '102'\ntask_dir: tasks/open-task\n",
        );

        let repository = FsTaskRepository::default();
        let pull_requests = MockPullRequestService::new(0)
            .with_status(101, true)
            .with_status(102, false);

        run_house_keeper(
            &HouseKeeperOptions {
                tasks_root: root.to_path_buf(),
            },
            &repository,
            &pull_requests,
        )
        .await
        .unwrap();

        assert!(root.join("completed/merged-task").is_dir());
        assert!(root.join("open-task").is_dir());
        assert!(!root.join("merged-task").exists());

        let moved: Task =
            read_yaml(&root.join("completed/merged-task").join(TASK_FILENAME)).unwrap();
        assert_eq!(moved.stage, Stage::Completed);
        assert_eq!(moved.task_dir, "tasks/completed/merged-task");
    }

    #[tokio::test]
    async fn test_invalid_pr_id_and_repo_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write_task(
            root,
            "bad-pr",
            "repo: o/r\nbranch: a\nplanning_pr_id: not-a-number\ntask_dir: tasks/bad-pr\n",
        );
        write_task(
            root,
            "bad-repo",
            "repo: noslash\nbranch: a\nplanning_pr_id: '103'\ntask_dir: tasks/bad-repo\n",
        );
        write_task(root, "no-pr", "repo: o/r\nbranch: a\ntask_dir: tasks/no-pr\n");

        let repository = FsTaskRepository::default();
        let pull_requests = MockPullRequestService::new(0);

        run_house_keeper(
            &HouseKeeperOptions {
                tasks_root: root.to_path_buf(),
            },
            &repository,
            &pull_requests,
        )
        .await
        .unwrap();

        // Nothing was queried and nothing moved.
        assert!(pull_requests.call_log().is_empty());
        assert!(root.join("bad-pr").is_dir());
        assert!(root.join("bad-repo").is_dir());
        assert!(root.join("no-pr").is_dir());
    }

    #[tokio::test]
    async fn test_status_error_does_not_abort_sweep() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write_task(
            root,
            "a-erroring",
            "repo: o/r\nbranch: a\nplanning_pr_id: '201'\ntask_dir: tasks/a-erroring\n",
        );
        write_task(
            root,
            "b-merged",
            "repo: o/r\nbranch: b\nplanning_pr_id: '202'\ntask_dir: tasks/b-merged\n",
        );

        let repository = FsTaskRepository::default();
        // 201 has no scripted status -> the mock errors for it; 202 merged.
        let pull_requests = MockPullRequestService::new(0).with_status(202, true);

        run_house_keeper(
            &HouseKeeperOptions {
                tasks_root: root.to_path_buf(),
            },
            &repository,
            &pull_requests,
        )
        .await
        .unwrap();

        assert!(root.join("completed/b-merged").is_dir());
        assert!(root.join("a-erroring").is_dir());
    }

    #[tokio::test]
    async fn test_empty_root_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let repository = FsTaskRepository::default();
        let pull_requests = MockPullRequestService::new(0);

        run_house_keeper(
            &HouseKeeperOptions {
                tasks_root: dir.path().join("missing"),
            },
            &repository,
            &pull_requests,
        )
        .await
        .unwrap();

        assert!(pull_requests.call_log().is_empty());
    }
}
