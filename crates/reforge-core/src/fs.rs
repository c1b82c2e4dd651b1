//! Typed YAML file helpers shared by workflows and the task repository

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

use crate::Result;

/// Read and deserialize a YAML file
pub fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&contents)?)
}

/// Read a YAML file, returning `None` when it does not exist
pub fn read_yaml_if_exists<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(serde_yaml::from_str(&contents)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Serialize a value to YAML, creating parent directories as needed
pub fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let serialized = serde_yaml::to_string(value)?;
    std::fs::write(path, serialized)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Priority, Stage, Task};

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/task.yaml");

        let task = Task {
            repo: "owner/name".to_string(),
            branch: "main".to_string(),
            kind: "feature".to_string(),
            stage: Stage::Implementing,
            priority: Priority::Low,
            agents: vec!["codex".to_string()],
            idea: None,
            planning_pr_id: Some("7".to_string()),
            review_required: Some(false),
            task_dir: "tasks/x".to_string(),
            additional_repos: None,
            timeout_ms: None,
        };

        write_yaml(&path, &task).unwrap();
        let back: Task = read_yaml(&path).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn test_read_if_exists_missing() {
        let dir = tempfile::tempdir().unwrap();
        let value: Option<Task> = read_yaml_if_exists(&dir.path().join("nope.yaml")).unwrap();
        assert!(value.is_none());
    }
}
