//! Filesystem task repository: list active records, retire completed ones

use reforge_core::{read_yaml_if_exists, write_yaml, ReforgeError, Result, Stage, Task};
use std::path::{Path, PathBuf};

/// Name of the task descriptor inside a task directory
pub const TASK_FILENAME: &str = "task.yaml";

const DEFAULT_COMPLETED_DIR: &str = "completed";

/// A task plus its on-disk location
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub task: Task,
    /// Absolute path of the directory holding the task files
    pub absolute_path: PathBuf,
    /// Directory name relative to the tasks root
    pub relative_dir: String,
}

/// Port over the durable task records
pub trait TaskRepository: Send + Sync {
    /// Non-completed task records directly under `tasks_root`.
    /// Listing follows OS directory-entry order, which is not guaranteed
    /// stable across filesystems.
    fn list_active_tasks(&self, tasks_root: &Path) -> Result<Vec<TaskRecord>>;

    /// Relocate a record into the completed namespace, rewriting its
    /// descriptor. Returns the new absolute path.
    fn mark_task_completed(&self, record: &TaskRecord) -> Result<PathBuf>;
}

/// Flat-file implementation over `tasks_root/<name>/task.yaml`
pub struct FsTaskRepository {
    completed_dir: String,
}

impl FsTaskRepository {
    pub fn new(completed_dir: impl Into<String>) -> Self {
        Self {
            completed_dir: completed_dir.into(),
        }
    }
}

impl Default for FsTaskRepository {
    fn default() -> Self {
        Self::new(DEFAULT_COMPLETED_DIR)
    }
}

fn posix_path(value: &str) -> String {
    value.replace(std::path::MAIN_SEPARATOR, "/")
}

impl TaskRepository for FsTaskRepository {
    fn list_active_tasks(&self, tasks_root: &Path) -> Result<Vec<TaskRecord>> {
        let absolute_root = if tasks_root.is_absolute() {
            tasks_root.to_path_buf()
        } else {
            std::env::current_dir()?.join(tasks_root)
        };

        if !absolute_root.exists() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();

        for entry in std::fs::read_dir(&absolute_root)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name == self.completed_dir {
                continue;
            }

            let absolute_dir = absolute_root.join(&name);
            let Some(task) = read_yaml_if_exists::<Task>(&absolute_dir.join(TASK_FILENAME))?
            else {
                continue;
            };

            if task.stage == Stage::Completed {
                continue;
            }
            if posix_path(&task.task_dir).contains(&format!("/{}/", self.completed_dir)) {
                continue;
            }

            records.push(TaskRecord {
                task,
                absolute_path: absolute_dir,
                relative_dir: name,
            });
        }

        Ok(records)
    }

    fn mark_task_completed(&self, record: &TaskRecord) -> Result<PathBuf> {
        let task_file = record.absolute_path.join(TASK_FILENAME);
        let task = read_yaml_if_exists::<Task>(&task_file)?.ok_or_else(|| {
            ReforgeError::TaskRepository(format!("task file not found at {}", task_file.display()))
        })?;

        // Re-base the task_dir field under the completed namespace.
        let original_dir = if task.task_dir.is_empty() {
            format!("tasks/{}", record.relative_dir)
        } else {
            posix_path(&task.task_dir)
        };

        let segments: Vec<&str> = original_dir.split('/').collect();
        let item_name = segments
            .last()
            .copied()
            .unwrap_or(record.relative_dir.as_str());
        let base_segments = &segments[..segments.len().saturating_sub(1)];
        let base = if base_segments.is_empty() {
            "tasks".to_string()
        } else {
            base_segments.join("/")
        };
        let new_task_dir = format!("{}/{}/{}", base, self.completed_dir, item_name);

        let mut updated = task.with_stage(Stage::Completed);
        updated.task_dir = new_task_dir;
        write_yaml(&task_file, &updated)?;

        let parent = record.absolute_path.parent().ok_or_else(|| {
            ReforgeError::TaskRepository(format!(
                "task directory {} has no parent",
                record.absolute_path.display()
            ))
        })?;
        let completed_root = parent.join(&self.completed_dir);
        std::fs::create_dir_all(&completed_root)?;

        let dir_name = record.absolute_path.file_name().ok_or_else(|| {
            ReforgeError::TaskRepository(format!(
                "task directory {} has no name",
                record.absolute_path.display()
            ))
        })?;
        let destination = completed_root.join(dir_name);

        if destination.exists() {
            std::fs::remove_dir_all(&destination)?;
        }
        std::fs::rename(&record.absolute_path, &destination)?;

        Ok(destination)
    }
}
