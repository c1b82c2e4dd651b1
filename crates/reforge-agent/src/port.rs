//! Agent execution contract

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

/// Terminal status of an agent run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    /// The cancellation signal fired before the run finished
    Timeout,
    /// A failed agent turn or an unexpected transport fault; the two are
    /// distinguished only via diagnostics
    Error,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Timeout => write!(f, "timeout"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Normalized result of one agent run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRunResult {
    pub status: RunStatus,
    /// Full concatenated run logs
    pub logs: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<BTreeMap<String, String>>,
    /// When the run reached its terminal status
    pub completed_at: DateTime<Utc>,
}

impl AgentRunResult {
    pub fn success(logs: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Success,
            logs: logs.into(),
            diagnostics: None,
            completed_at: Utc::now(),
        }
    }

    pub fn timeout(logs: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Timeout,
            logs: logs.into(),
            diagnostics: None,
            completed_at: Utc::now(),
        }
    }

    pub fn error(logs: impl Into<String>, key: &str, value: impl Into<String>) -> Self {
        let mut diagnostics = BTreeMap::new();
        diagnostics.insert(key.to_string(), value.into());
        Self {
            status: RunStatus::Error,
            logs: logs.into(),
            diagnostics: Some(diagnostics),
            completed_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}

/// Options for one agent run
#[derive(Debug, Clone)]
pub struct AgentRunOptions {
    /// The working copy the agent operates in
    pub target_workspace: PathBuf,
    /// Further working copies the agent may read/write
    pub additional_workspaces: Vec<PathBuf>,
    pub prompt: String,
    /// Model identifier understood by the runtime
    pub model: Option<String>,
    /// Per-run metadata forwarded into diagnostics and logs
    pub run_metadata: Option<BTreeMap<String, String>>,
    /// Receives incremental formatted output lines
    pub on_data: Option<UnboundedSender<String>>,
}

impl AgentRunOptions {
    pub fn new(target_workspace: impl Into<PathBuf>, prompt: impl Into<String>) -> Self {
        Self {
            target_workspace: target_workspace.into(),
            additional_workspaces: Vec::new(),
            prompt: prompt.into(),
            model: None,
            run_metadata: None,
            on_data: None,
        }
    }

    pub fn with_additional_workspaces(mut self, workspaces: Vec<PathBuf>) -> Self {
        self.additional_workspaces = workspaces;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.run_metadata = Some(metadata);
        self
    }

    pub fn with_on_data(mut self, sender: UnboundedSender<String>) -> Self {
        self.on_data = Some(sender);
        self
    }
}

/// Port every agent runtime implements
///
/// A run never retries internally and never raises cancellation as an
/// error: when `cancel` fires the implementation stops consuming output,
/// releases the underlying stream, and reports `timeout`.
#[async_trait]
pub trait Agent: Send + Sync {
    async fn run(&self, options: AgentRunOptions, cancel: CancellationToken) -> AgentRunResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_constructors() {
        let ok = AgentRunResult::success("done");
        assert!(ok.is_success());
        assert!(ok.diagnostics.is_none());

        let err = AgentRunResult::error("logs", "reason", "missing-turn-completion");
        assert_eq!(err.status, RunStatus::Error);
        assert_eq!(
            err.diagnostics.unwrap().get("reason").unwrap(),
            "missing-turn-completion"
        );
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&RunStatus::Timeout).unwrap(),
            "\"timeout\""
        );
        assert_eq!(RunStatus::Success.to_string(), "success");
    }

    #[test]
    fn test_options_builder() {
        let options = AgentRunOptions::new("/ws", "do it")
            .with_model("gpt-5-codex")
            .with_additional_workspaces(vec![PathBuf::from("/other")]);
        assert_eq!(options.model.as_deref(), Some("gpt-5-codex"));
        assert_eq!(options.additional_workspaces.len(), 1);
    }
}
