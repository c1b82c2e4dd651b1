//! Codex runtime: streamed execution of `codex exec --json`

use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::port::{Agent, AgentRunOptions, AgentRunResult};
use crate::stream::{consume_stream, parse_event, EventStream, ThreadEvent};

const CODEX_BINARY: &str = "codex";

/// SDK-style streaming agent backed by the Codex CLI
///
/// One run starts one thread (`codex exec --json`) in the target
/// workspace and consumes its JSONL event stream until a terminal event,
/// a fault, or cancellation.
pub struct CodexAgent {
    binary: String,
}

impl CodexAgent {
    pub fn new() -> Self {
        Self {
            binary: CODEX_BINARY.to_string(),
        }
    }

    /// Override the launched binary (tests use a shim)
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn spawn_thread(&self, options: &AgentRunOptions) -> std::io::Result<CodexStream> {
        let mut command = Command::new(&self.binary);
        command
            .arg("exec")
            .arg("--json")
            .current_dir(&options.target_workspace)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        if let Some(model) = &options.model {
            command.arg("--model").arg(model);
        }

        for workspace in &options.additional_workspaces {
            command.arg("--add-dir").arg(workspace);
        }

        command.arg(&options.prompt);

        debug!(
            "Starting codex thread in {}",
            options.target_workspace.display()
        );

        let mut child = command.spawn()?;
        let stdout = child.stdout.take().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "child stdout not captured")
        })?;

        Ok(CodexStream {
            child,
            lines: BufReader::new(stdout).lines(),
        })
    }
}

impl Default for CodexAgent {
    fn default() -> Self {
        Self::new()
    }
}

/// Event stream over a running codex child process
struct CodexStream {
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
}

impl CodexStream {
    /// Reap the child after a normally-ended stream
    async fn finish(&mut self) {
        let _ = self.child.wait().await;
    }
}

#[async_trait]
impl EventStream for CodexStream {
    async fn next_event(&mut self) -> std::io::Result<Option<ThreadEvent>> {
        loop {
            match self.lines.next_line().await? {
                Some(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    return Ok(Some(parse_event(trimmed)));
                }
                None => return Ok(None),
            }
        }
    }

    async fn stop(&mut self) {
        let _ = self.child.start_kill();
        let _ = self.child.wait().await;
    }
}

#[async_trait]
impl Agent for CodexAgent {
    async fn run(&self, options: AgentRunOptions, cancel: CancellationToken) -> AgentRunResult {
        if cancel.is_cancelled() {
            return AgentRunResult::timeout("");
        }

        let mut stream = match self.spawn_thread(&options) {
            Ok(stream) => stream,
            Err(e) => {
                error!("Failed to start codex: {}", e);
                return AgentRunResult::error(
                    format!("failed to start codex: {}", e),
                    "message",
                    e.to_string(),
                );
            }
        };

        let outcome = consume_stream(&mut stream, &cancel, options.on_data.as_ref()).await;
        if !outcome.cancelled {
            stream.finish().await;
        }

        outcome.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::RunStatus;
    use std::time::Duration;

    fn write_shim(dir: &std::path::Path, body: &str) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("codex-shim.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_run_success_from_shim_events() {
        let dir = tempfile::tempdir().unwrap();
        let shim = write_shim(
            dir.path(),
            concat!(
                "echo '{\"type\":\"item.completed\",\"item\":{\"type\":\"agent_message\"}}'\n",
                "echo '{\"type\":\"turn.completed\",\"usage\":{\"input_tokens\":3}}'"
            ),
        );

        let agent = CodexAgent::with_binary(shim.to_str().unwrap());
        let options = AgentRunOptions::new(dir.path(), "do the thing");
        let result = agent.run(options, CancellationToken::new()).await;

        assert_eq!(result.status, RunStatus::Success);
        assert!(result.logs.contains("[item.completed:agent_message]"));
    }

    #[tokio::test]
    async fn test_run_without_turn_completion_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let shim = write_shim(
            dir.path(),
            "echo '{\"type\":\"item.completed\",\"item\":{\"type\":\"agent_message\"}}'",
        );

        let agent = CodexAgent::with_binary(shim.to_str().unwrap());
        let options = AgentRunOptions::new(dir.path(), "prompt");
        let result = agent.run(options, CancellationToken::new()).await;

        assert_eq!(result.status, RunStatus::Error);
        assert_eq!(
            result.diagnostics.unwrap().get("reason").unwrap(),
            "missing-turn-completion"
        );
    }

    #[tokio::test]
    async fn test_cancellation_kills_child_and_reports_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let shim = write_shim(
            dir.path(),
            concat!(
                "echo '{\"type\":\"item.started\",\"item\":{\"type\":\"reasoning\"}}'\n",
                "sleep 30\n",
                "echo '{\"type\":\"turn.completed\"}'"
            ),
        );

        let agent = CodexAgent::with_binary(shim.to_str().unwrap());
        let options = AgentRunOptions::new(dir.path(), "prompt");
        let cancel = CancellationToken::new();

        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel_clone.cancel();
        });

        let result = agent.run(options, cancel).await;
        assert_eq!(result.status, RunStatus::Timeout);
        assert!(result.logs.contains("[item.started:reasoning]"));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_error_result() {
        let dir = tempfile::tempdir().unwrap();
        let agent = CodexAgent::with_binary("/nonexistent/codex-binary");
        let options = AgentRunOptions::new(dir.path(), "prompt");

        let result = agent.run(options, CancellationToken::new()).await;
        assert_eq!(result.status, RunStatus::Error);
    }

    #[tokio::test]
    async fn test_already_cancelled_returns_timeout_without_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let agent = CodexAgent::with_binary("/nonexistent/codex-binary");
        let options = AgentRunOptions::new(dir.path(), "prompt");

        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = agent.run(options, cancel).await;
        assert_eq!(result.status, RunStatus::Timeout);
    }
}
