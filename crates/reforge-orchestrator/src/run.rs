//! Per-invocation run options, timeout derivation and cancellation plumbing

use reforge_core::{Config, Task};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

const WORKSPACE_ROOT_ENV: &str = "WORKSPACE_ROOT";

/// Options shared by the workflow entry points
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Overrides config/env workspace root
    pub workspace_root: Option<String>,
    /// Overrides the task's timeout and the configured default
    pub timeout_ms: Option<u64>,
    /// External abort signal merged into the run's deadline
    pub external_cancel: Option<CancellationToken>,
    /// Receives incremental agent output
    pub on_data: Option<UnboundedSender<String>>,
}

/// Agent execution budget: explicit override, then the task's own, then
/// the configured default.
pub fn derive_timeout(task: &Task, override_ms: Option<u64>, default_ms: u64) -> u64 {
    override_ms.or(task.timeout_ms).unwrap_or(default_ms)
}

/// Workspace root resolution: CLI flag, then `WORKSPACE_ROOT`, then config
pub fn resolve_workspace_root(cli: Option<&str>, config: &Config) -> PathBuf {
    if let Some(root) = cli {
        return PathBuf::from(root);
    }
    if let Ok(root) = std::env::var(WORKSPACE_ROOT_ENV) {
        if !root.is_empty() {
            return PathBuf::from(root);
        }
    }
    PathBuf::from(&config.workspace_root)
}

/// A run deadline: one cancellation token fed by a timeout timer and,
/// optionally, an external abort signal.
///
/// Only the agent run is subject to the deadline; git and HTTP calls made
/// by the orchestrator itself are not. Dropping the deadline disarms the
/// timer.
pub struct Deadline {
    token: CancellationToken,
    timer: JoinHandle<()>,
}

impl Deadline {
    pub fn start(label: &'static str, timeout_ms: u64, external: Option<CancellationToken>) -> Self {
        let token = match external {
            Some(external) => external.child_token(),
            None => CancellationToken::new(),
        };

        let timer_token = token.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(timeout_ms)).await;
            warn!("{} timed out after {}ms. Aborting...", label, timeout_ms);
            timer_token.cancel();
        });

        Self { token, timer }
    }

    /// The token handed to the agent execution port
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        self.timer.abort();
    }
}
