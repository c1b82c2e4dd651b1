//! Unified error types for reforge

use thiserror::Error;

/// Unified error type for all reforge operations
#[derive(Error, Debug)]
pub enum ReforgeError {
    // Validation errors, raised before any side effect
    #[error("invalid task: {0}")]
    InvalidTask(String),

    #[error("planning stage requires an idea to generate a plan")]
    MissingIdea,

    #[error("command \"{0}\" requires a planning_pr_id, but it's missing")]
    MissingPlanningPr(String),

    // Matching errors
    #[error("no tasks or ideas found: {0}")]
    NoTasksFound(String),

    #[error("no eligible task found after applying filters")]
    NoEligibleTask,

    #[error("no tokens available for agent {0}")]
    QuotaExceeded(String),

    // Workspace / version-control errors
    #[error("workspace preparation failed: {0}")]
    WorkspacePreparation(String),

    #[error("git operation failed: {0}")]
    VersionControl(String),

    #[error("failed to create bootstrap empty commit")]
    BootstrapCommit,

    // Collaborator errors
    #[error("pull request service error: {0}")]
    PullRequestService(String),

    #[error("usage service error: {0}")]
    Usage(String),

    #[error("agent run failed: {0}")]
    AgentRun(String),

    #[error("task repository error: {0}")]
    TaskRepository(String),

    #[error("configuration error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

/// Result type alias using ReforgeError
pub type Result<T> = std::result::Result<T, ReforgeError>;
