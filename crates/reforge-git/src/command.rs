//! Git command execution abstraction

use async_trait::async_trait;
use reforge_core::{ReforgeError, Result};
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::Mutex;
use tokio::process::Command;
use tracing::debug;

/// Output from a git command
#[derive(Debug, Clone)]
pub struct GitOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl GitOutput {
    /// A successful output with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            success: true,
        }
    }

    /// A failed output with the given stderr
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            success: false,
        }
    }
}

impl From<Output> for GitOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
        }
    }
}

/// Trait for executing git commands in a working copy (allows mocking in
/// tests)
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Execute `git` with the given arguments inside `cwd`
    async fn exec(&self, cwd: &Path, args: &[&str]) -> Result<GitOutput>;
}

/// Real git command executor
#[derive(Debug, Clone, Default)]
pub struct GitProcess;

impl GitProcess {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for GitProcess {
    async fn exec(&self, cwd: &Path, args: &[&str]) -> Result<GitOutput> {
        debug!("Executing git {:?} in {}", args, cwd.display());

        let output = Command::new("git")
            .args(args)
            .current_dir(cwd)
            .output()
            .await
            .map_err(|e| ReforgeError::VersionControl(format!("failed to execute git: {}", e)))?;

        let git_output = GitOutput::from(output);

        if !git_output.success {
            debug!("git command failed: {}", git_output.stderr);
        }

        Ok(git_output)
    }
}

/// Mock git executor for testing
///
/// Records every call as `(cwd, joined-args)` and answers with scripted
/// responses; unscripted commands succeed with empty output.
#[derive(Default)]
pub struct MockRunner {
    responses: Mutex<std::collections::HashMap<String, GitOutput>>,
    calls: Mutex<Vec<(PathBuf, String)>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the response for an exact argument list (joined with spaces)
    pub fn with_response(self, command: &str, output: GitOutput) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(command.to_string(), output);
        self
    }

    /// Commands executed so far, in order
    pub fn calls(&self) -> Vec<(PathBuf, String)> {
        self.calls.lock().unwrap().clone()
    }

    /// Joined argument lists executed so far, in order
    pub fn commands(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, cmd)| cmd.clone())
            .collect()
    }
}

#[async_trait]
impl ProcessRunner for MockRunner {
    async fn exec(&self, cwd: &Path, args: &[&str]) -> Result<GitOutput> {
        let key = args.join(" ");
        self.calls
            .lock()
            .unwrap()
            .push((cwd.to_path_buf(), key.clone()));

        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_else(|| GitOutput::ok("")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_runner_scripted_response() {
        let runner = MockRunner::new().with_response(
            "status --porcelain",
            GitOutput::ok(" M src/lib.rs"),
        );

        let out = runner
            .exec(Path::new("/copy"), &["status", "--porcelain"])
            .await
            .unwrap();
        assert!(out.success);
        assert_eq!(out.stdout, " M src/lib.rs");

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, "status --porcelain");
    }

    #[tokio::test]
    async fn test_mock_runner_defaults_to_success() {
        let runner = MockRunner::new();
        let out = runner.exec(Path::new("/copy"), &["fetch"]).await.unwrap();
        assert!(out.success);
        assert!(out.stdout.is_empty());
    }
}
