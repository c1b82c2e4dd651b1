//! Gemini runtime: process-spawn agent with the prompt on stdin

use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::port::{Agent, AgentRunOptions, AgentRunResult};

const GEMINI_BINARY: &str = "gemini";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Process-spawn agent backed by the Gemini CLI
///
/// The prompt goes to stdin; stdout and stderr are interleaved into the
/// run logs as they arrive, so a cancelled run still returns everything
/// collected so far.
pub struct GeminiAgent {
    binary: String,
}

impl GeminiAgent {
    pub fn new() -> Self {
        Self {
            binary: GEMINI_BINARY.to_string(),
        }
    }

    /// Override the launched binary (tests use a shim)
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for GeminiAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for GeminiAgent {
    async fn run(&self, options: AgentRunOptions, cancel: CancellationToken) -> AgentRunResult {
        if cancel.is_cancelled() {
            return AgentRunResult::timeout("");
        }

        let model = options.model.as_deref().unwrap_or(DEFAULT_MODEL);
        debug!(
            "Starting gemini ({}) in {}",
            model,
            options.target_workspace.display()
        );

        let spawned = Command::new(&self.binary)
            .arg("--model")
            .arg(model)
            .current_dir(&options.target_workspace)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                error!("Failed to start gemini: {}", e);
                return AgentRunResult::error(
                    format!("failed to start gemini: {}", e),
                    "message",
                    e.to_string(),
                );
            }
        };

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(options.prompt.as_bytes()).await {
                debug!("Failed to write prompt to gemini stdin: {}", e);
            }
            // Closing stdin signals end of prompt.
            drop(stdin);
        }

        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            _ => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                return AgentRunResult::error(
                    "child output not captured",
                    "message",
                    "child output not captured",
                );
            }
        };
        let mut out_lines = BufReader::new(stdout).lines();
        let mut err_lines = BufReader::new(stderr).lines();

        let mut logs = String::new();
        let mut out_done = false;
        let mut err_done = false;

        enum Step {
            Cancelled,
            Out(std::io::Result<Option<String>>),
            Err(std::io::Result<Option<String>>),
        }

        while !(out_done && err_done) {
            let step = tokio::select! {
                _ = cancel.cancelled() => Step::Cancelled,
                line = out_lines.next_line(), if !out_done => Step::Out(line),
                line = err_lines.next_line(), if !err_done => Step::Err(line),
            };

            match step {
                Step::Cancelled => {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    if let Some(sender) = &options.on_data {
                        let _ = sender.send("[cancelled]\n".to_string());
                    }
                    return AgentRunResult::timeout(logs);
                }
                Step::Out(Ok(Some(line))) | Step::Err(Ok(Some(line))) => {
                    if let Some(sender) = &options.on_data {
                        let _ = sender.send(format!("{}\n", line));
                    }
                    logs.push_str(&line);
                    logs.push('\n');
                }
                Step::Out(Ok(None)) => out_done = true,
                Step::Err(Ok(None)) => err_done = true,
                Step::Out(Err(e)) => {
                    logs.push_str(&format!("\nProcess error: {}\n", e));
                    out_done = true;
                }
                Step::Err(Err(e)) => {
                    logs.push_str(&format!("\nProcess error: {}\n", e));
                    err_done = true;
                }
            }
        }

        enum Exit {
            Cancelled,
            Status(std::io::Result<std::process::ExitStatus>),
        }

        let exit = tokio::select! {
            _ = cancel.cancelled() => Exit::Cancelled,
            status = child.wait() => Exit::Status(status),
        };

        match exit {
            Exit::Cancelled => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                AgentRunResult::timeout(logs)
            }
            Exit::Status(Ok(status)) if status.success() => AgentRunResult::success(logs),
            Exit::Status(Ok(status)) => {
                let code = status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string());
                AgentRunResult::error(logs, "exit_code", code)
            }
            Exit::Status(Err(e)) => {
                logs.push_str(&format!("\nProcess error: {}\n", e));
                AgentRunResult::error(logs, "message", e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::RunStatus;
    use std::time::Duration;

    fn write_shim(dir: &std::path::Path, body: &str) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("gemini-shim.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_successful_run_collects_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let shim = write_shim(dir.path(), "cat >/dev/null\necho 'plan applied'");

        let agent = GeminiAgent::with_binary(shim.to_str().unwrap());
        let options = AgentRunOptions::new(dir.path(), "implement the plan");
        let result = agent.run(options, CancellationToken::new()).await;

        assert_eq!(result.status, RunStatus::Success);
        assert!(result.logs.contains("plan applied"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_reports_error_with_code() {
        let dir = tempfile::tempdir().unwrap();
        let shim = write_shim(dir.path(), "cat >/dev/null\necho 'broken' >&2\nexit 3");

        let agent = GeminiAgent::with_binary(shim.to_str().unwrap());
        let options = AgentRunOptions::new(dir.path(), "prompt");
        let result = agent.run(options, CancellationToken::new()).await;

        assert_eq!(result.status, RunStatus::Error);
        assert!(result.logs.contains("broken"));
        assert_eq!(result.diagnostics.unwrap().get("exit_code").unwrap(), "3");
    }

    #[tokio::test]
    async fn test_cancellation_kills_process_and_keeps_logs() {
        let dir = tempfile::tempdir().unwrap();
        let shim = write_shim(dir.path(), "cat >/dev/null\necho 'started'\nsleep 30");

        let agent = GeminiAgent::with_binary(shim.to_str().unwrap());
        let options = AgentRunOptions::new(dir.path(), "prompt");
        let cancel = CancellationToken::new();

        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel_clone.cancel();
        });

        let result = agent.run(options, cancel).await;
        assert_eq!(result.status, RunStatus::Timeout);
        assert!(result.logs.contains("started"));
    }
}
