//! Core type definitions for reforge orchestration

use serde::{Deserialize, Serialize};

/// Task priority levels
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High = 0,
    #[default]
    Medium = 1,
    Low = 2,
}

impl Priority {
    /// Numeric rank used by the matcher; lower sorts first.
    pub fn rank(&self) -> u8 {
        *self as u8
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(format!("Invalid priority: {}", s)),
        }
    }
}

/// Deserialize a priority, normalizing unknown or absent values to the
/// default instead of failing the whole entry.
fn priority_or_default<'de, D>(deserializer: D) -> Result<Priority, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .and_then(|raw| raw.parse().ok())
        .unwrap_or_default())
}

/// Stage of a task in its lifecycle
///
/// Progression is monotonic except for explicit `update` re-entry into
/// `planning`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    #[default]
    Planning,
    ReadyForImplementing,
    Implementing,
    Completed,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Planning => write!(f, "planning"),
            Self::ReadyForImplementing => write!(f, "ready-for-implementing"),
            Self::Implementing => write!(f, "implementing"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "planning" => Ok(Self::Planning),
            "ready-for-implementing" => Ok(Self::ReadyForImplementing),
            "implementing" => Ok(Self::Implementing),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("Invalid stage: {}", s)),
        }
    }
}

/// Identifier of a coding agent runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentId {
    #[serde(rename = "gpt-5-codex")]
    OpenaiCodex,
    #[serde(rename = "gemini-2.5-pro")]
    GoogleGemini25Pro,
    #[serde(rename = "gemini-2.5-flash")]
    GoogleGemini25Flash,
}

/// Agents that may be selected for a task
pub const ALLOWED_AGENTS: [AgentId; 3] = [
    AgentId::OpenaiCodex,
    AgentId::GoogleGemini25Pro,
    AgentId::GoogleGemini25Flash,
];

/// Substituted when a task lists no (parseable) agents
pub const DEFAULT_AGENT: AgentId = AgentId::GoogleGemini25Flash;

impl AgentId {
    /// The canonical identifier passed to agent runtimes as the model name
    pub fn canonical(&self) -> &'static str {
        match self {
            Self::OpenaiCodex => "gpt-5-codex",
            Self::GoogleGemini25Pro => "gemini-2.5-pro",
            Self::GoogleGemini25Flash => "gemini-2.5-flash",
        }
    }

    /// Parse a user-supplied agent alias. Input is trimmed and lowercased;
    /// unknown aliases yield `None`.
    pub fn parse_alias(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "codex" | "openai-codex" | "gpt-5-codex" => Some(Self::OpenaiCodex),
            "google-gemini-2.5-pro" | "gemini-2.5-pro" => Some(Self::GoogleGemini25Pro),
            "google-gemini-2.5-flash" | "gemini-2.5-flash" => Some(Self::GoogleGemini25Flash),
            _ => None,
        }
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

impl std::str::FromStr for AgentId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_alias(s).ok_or_else(|| format!("Invalid agent: {}", s))
    }
}

/// Normalize a raw agent list: parse aliases, drop unknown entries,
/// deduplicate preserving first-seen order.
pub fn normalize_agent_list<I, S>(agents: I) -> Vec<AgentId>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen: Vec<AgentId> = Vec::new();

    for candidate in agents {
        if let Some(parsed) = AgentId::parse_alias(candidate.as_ref()) {
            if !seen.contains(&parsed) && ALLOWED_AGENTS.contains(&parsed) {
                seen.push(parsed);
            }
        }
    }

    seen
}

/// An extra repository prepared alongside the main one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalRepo {
    /// Repository slug in "owner/name" form
    pub repo: String,
    /// Branch to check out; the repository default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Folder name under the workspace root; defaults to the slug
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "directoryName")]
    pub directory_name: Option<String>,
}

/// The canonical, persisted unit of work
///
/// Round-trips through `task_dir/task.yaml`; optional fields are omitted
/// from the serialized form when unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Repository slug in "owner/name" form
    pub repo: String,
    /// Feature branch the task works on
    pub branch: String,
    /// Category used for review-blocking comparisons
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub stage: Stage,
    #[serde(default, deserialize_with = "priority_or_default")]
    pub priority: Priority,
    /// Raw agent aliases as written by backlog authors; normalized by the
    /// matcher
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<String>,
    /// Required when entering planning via `init`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idea: Option<String>,
    /// Set once a planning pull request exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planning_pr_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_required: Option<bool>,
    /// Relative directory holding the task descriptor and plan document
    #[serde(default)]
    pub task_dir: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        rename = "additionalRepos"
    )]
    pub additional_repos: Option<Vec<AdditionalRepo>>,
    /// Overrides the default agent execution budget
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl Task {
    /// Whether this task participates in review blocking
    pub fn requires_review(&self) -> bool {
        self.review_required.unwrap_or(false)
    }

    /// Key identifying the review-blocking group, when kind and repo are set
    pub fn blocking_key(&self) -> Option<String> {
        if self.kind.is_empty() || self.repo.is_empty() {
            return None;
        }
        Some(format!("{}::{}", self.kind, self.repo))
    }

    /// Split `repo` into `(owner, name)`
    pub fn repo_parts(&self) -> Option<(&str, &str)> {
        let (owner, name) = self.repo.split_once('/')?;
        if owner.is_empty() || name.is_empty() {
            return None;
        }
        Some((owner, name))
    }

    /// State transition: a new task value at the given stage
    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self
    }

    /// State transition: a new task value bound to a planning pull request
    pub fn with_planning_pr(mut self, pr_id: impl Into<String>) -> Self {
        self.planning_pr_id = Some(pr_id.into());
        self
    }
}

/// A backlog entry not yet promoted to a task
///
/// The same shape as [`Task`] minus `stage` and `planning_pr_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Idea {
    pub repo: String,
    pub branch: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default, deserialize_with = "priority_or_default")]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idea: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_required: Option<bool>,
    #[serde(default)]
    pub task_dir: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        rename = "additionalRepos"
    )]
    pub additional_repos: Option<Vec<AdditionalRepo>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl Idea {
    /// Promote the idea to a task entering the planning stage
    pub fn into_task(self) -> Task {
        Task {
            repo: self.repo,
            branch: self.branch,
            kind: self.kind,
            stage: Stage::Planning,
            priority: self.priority,
            agents: self.agents,
            idea: self.idea,
            planning_pr_id: None,
            review_required: self.review_required,
            task_dir: self.task_dir,
            additional_repos: self.additional_repos,
            timeout_ms: self.timeout_ms,
        }
    }
}

/// The matcher's output: a task with its agent fixed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedTask {
    pub selected_agent: AgentId,
    pub task: Task,
}
