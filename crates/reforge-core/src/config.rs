//! Configuration management for reforge
//!
//! Invocation-level settings loaded from `reforge.toml` in the working
//! directory, with defaults matching the unattended pipeline's layout.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{ReforgeError, Result};

/// Invocation configuration
///
/// Loaded from `reforge.toml` when present, defaults otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory for prepared working copies
    #[serde(default = "default_workspace_root")]
    pub workspace_root: String,

    /// Default agent execution budget in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// Slug of the auxiliary tasks repository ("owner/name")
    #[serde(default = "default_tasks_repo")]
    pub tasks_repo: String,

    /// Checkout directory name for the tasks repository under the
    /// workspace root
    #[serde(default = "default_tasks_repo_dir")]
    pub tasks_repo_dir: String,

    /// Directory holding active task records
    #[serde(default = "default_tasks_root")]
    pub tasks_root: String,

    /// Sibling directory name for retired task records
    #[serde(default = "default_completed_dir")]
    pub completed_dir: String,

    /// Base branch pull requests target
    #[serde(default = "default_base_branch")]
    pub base_branch: String,
}

// Default value providers
fn default_workspace_root() -> String {
    "./workspace".to_string()
}

fn default_timeout_ms() -> u64 {
    300_000
}

fn default_tasks_repo() -> String {
    "reforge-ai/reforge-tasks".to_string()
}

fn default_tasks_repo_dir() -> String {
    "tasks-repo".to_string()
}

fn default_tasks_root() -> String {
    "tasks".to_string()
}

fn default_completed_dir() -> String {
    "completed".to_string()
}

fn default_base_branch() -> String {
    "main".to_string()
}

impl Config {
    /// Load configuration from `reforge.toml` under `root`, or use defaults
    pub fn load_or_default(root: &Path) -> Result<Self> {
        let config_path = root.join("reforge.toml");

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)
                .map_err(|e| ReforgeError::Config(format!("failed to parse {}: {}", config_path.display(), e)))
        } else {
            Ok(Self::default())
        }
    }

    /// Owner/name pair of the tasks repository
    pub fn tasks_repo_parts(&self) -> Result<(&str, &str)> {
        self.tasks_repo
            .split_once('/')
            .filter(|(owner, name)| !owner.is_empty() && !name.is_empty())
            .ok_or_else(|| {
                ReforgeError::Config(format!(
                    "tasks_repo must be in \"owner/name\" form, got \"{}\"",
                    self.tasks_repo
                ))
            })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_root: default_workspace_root(),
            default_timeout_ms: default_timeout_ms(),
            tasks_repo: default_tasks_repo(),
            tasks_repo_dir: default_tasks_repo_dir(),
            tasks_root: default_tasks_root(),
            completed_dir: default_completed_dir(),
            base_branch: default_base_branch(),
        }
    }
}
