//! Version-control operations scoped to working copies

use async_trait::async_trait;
use reforge_core::{ReforgeError, Result};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

use crate::command::{GitOutput, GitProcess, ProcessRunner};

/// Port for the version-control operations the workflows need
///
/// Every operation is scoped to a working-copy path; implementations do not
/// keep per-copy state.
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Make `branch` the checked-out branch of the working copy, creating it
    /// when necessary and syncing it with its remote counterpart when one
    /// exists. With `base` set, a missing branch starts from `origin/<base>`.
    async fn ensure_branch_and_sync(
        &self,
        cwd: &Path,
        branch: &str,
        base: Option<&str>,
    ) -> Result<()>;

    /// Stage and commit all changes. Returns false when there was nothing to
    /// commit.
    async fn commit_all(&self, cwd: &Path, message: &str) -> Result<bool>;

    /// Create an empty commit. Returns whether the commit was created.
    async fn commit_empty(&self, cwd: &Path, message: &str) -> Result<bool>;

    /// Merge `from` into the currently checked-out branch
    async fn merge_branch(&self, cwd: &Path, from: &str) -> Result<()>;

    /// Push `branch` to origin, optionally establishing an upstream
    async fn push(&self, cwd: &Path, branch: &str, set_upstream: bool) -> Result<()>;
}

/// Version control backed by the `git` CLI
pub struct GitCli<R: ProcessRunner = GitProcess> {
    runner: R,
}

impl GitCli<GitProcess> {
    pub fn new() -> Self {
        Self {
            runner: GitProcess::new(),
        }
    }
}

impl Default for GitCli<GitProcess> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ProcessRunner> GitCli<R> {
    pub fn with_runner(runner: R) -> Self {
        Self { runner }
    }

    async fn run(&self, cwd: &Path, args: &[&str]) -> Result<GitOutput> {
        self.runner.exec(cwd, args).await
    }

    /// Run a command and map a non-zero exit into a `VersionControl` error
    async fn run_ok(&self, cwd: &Path, args: &[&str]) -> Result<GitOutput> {
        let output = self.run(cwd, args).await?;
        if !output.success {
            return Err(ReforgeError::VersionControl(format!(
                "git {} failed in {}: {}",
                args.join(" "),
                cwd.display(),
                output.stderr.trim()
            )));
        }
        Ok(output)
    }
}

#[async_trait]
impl<R: ProcessRunner> VersionControl for GitCli<R> {
    async fn ensure_branch_and_sync(
        &self,
        cwd: &Path,
        branch: &str,
        base: Option<&str>,
    ) -> Result<()> {
        self.run_ok(cwd, &["fetch", "--all", "--prune"]).await?;

        let checkout = self.run(cwd, &["checkout", branch]).await?;
        if checkout.success {
            // A branch without an upstream has nothing to pull; tolerate it.
            let pull = self.run(cwd, &["pull", "origin", branch]).await?;
            if !pull.success {
                debug!(
                    "pull origin {} failed in {} (no upstream?): {}",
                    branch,
                    cwd.display(),
                    pull.stderr.trim()
                );
            }
        } else if let Some(base) = base {
            let start_point = format!("origin/{}", base);
            self.run_ok(cwd, &["checkout", "-b", branch, &start_point])
                .await?;
        } else {
            self.run_ok(cwd, &["checkout", "-b", branch]).await?;
        }

        if let Some(base) = base {
            self.run_ok(cwd, &["pull", "origin", base]).await?;
        }

        Ok(())
    }

    async fn commit_all(&self, cwd: &Path, message: &str) -> Result<bool> {
        self.run_ok(cwd, &["add", "-A"]).await?;

        let status = self.run_ok(cwd, &["status", "--porcelain"]).await?;
        if status.stdout.trim().is_empty() {
            return Ok(false);
        }

        self.run_ok(cwd, &["commit", "-m", message]).await?;
        Ok(true)
    }

    async fn commit_empty(&self, cwd: &Path, message: &str) -> Result<bool> {
        let output = self
            .run(cwd, &["commit", "--allow-empty", "-m", message])
            .await?;
        Ok(output.success)
    }

    async fn merge_branch(&self, cwd: &Path, from: &str) -> Result<()> {
        self.run_ok(cwd, &["merge", from]).await?;
        Ok(())
    }

    async fn push(&self, cwd: &Path, branch: &str, set_upstream: bool) -> Result<()> {
        if set_upstream {
            let output = self
                .run(cwd, &["push", "--set-upstream", "origin", branch])
                .await?;
            if output.success {
                return Ok(());
            }
            if !output.stderr.to_lowercase().contains("set-upstream") {
                return Err(ReforgeError::VersionControl(format!(
                    "git push --set-upstream origin {} failed in {}: {}",
                    branch,
                    cwd.display(),
                    output.stderr.trim()
                )));
            }
            info!("push --set-upstream rejected; retrying plain push");
        }

        self.run_ok(cwd, &["push", "origin", branch]).await?;
        Ok(())
    }
}

/// Recorded call made against [`MockVersionControl`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitCall {
    EnsureBranchAndSync {
        cwd: PathBuf,
        branch: String,
        base: Option<String>,
    },
    CommitAll {
        cwd: PathBuf,
        message: String,
    },
    CommitEmpty {
        cwd: PathBuf,
        message: String,
    },
    MergeBranch {
        cwd: PathBuf,
        from: String,
    },
    Push {
        cwd: PathBuf,
        branch: String,
        set_upstream: bool,
    },
}

/// Mock version control for workflow tests
///
/// Records the operation sequence; `fail_empty_commit` simulates a
/// collaborator that cannot create the bootstrap commit.
#[derive(Default)]
pub struct MockVersionControl {
    calls: Mutex<Vec<GitCall>>,
    pub fail_empty_commit: bool,
    pub fail_merge: bool,
}

impl MockVersionControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_empty_commit() -> Self {
        Self {
            fail_empty_commit: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<GitCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VersionControl for MockVersionControl {
    async fn ensure_branch_and_sync(
        &self,
        cwd: &Path,
        branch: &str,
        base: Option<&str>,
    ) -> Result<()> {
        self.calls.lock().unwrap().push(GitCall::EnsureBranchAndSync {
            cwd: cwd.to_path_buf(),
            branch: branch.to_string(),
            base: base.map(str::to_string),
        });
        Ok(())
    }

    async fn commit_all(&self, cwd: &Path, message: &str) -> Result<bool> {
        self.calls.lock().unwrap().push(GitCall::CommitAll {
            cwd: cwd.to_path_buf(),
            message: message.to_string(),
        });
        Ok(true)
    }

    async fn commit_empty(&self, cwd: &Path, message: &str) -> Result<bool> {
        self.calls.lock().unwrap().push(GitCall::CommitEmpty {
            cwd: cwd.to_path_buf(),
            message: message.to_string(),
        });
        Ok(!self.fail_empty_commit)
    }

    async fn merge_branch(&self, cwd: &Path, from: &str) -> Result<()> {
        self.calls.lock().unwrap().push(GitCall::MergeBranch {
            cwd: cwd.to_path_buf(),
            from: from.to_string(),
        });
        if self.fail_merge {
            return Err(ReforgeError::VersionControl("merge conflict".to_string()));
        }
        Ok(())
    }

    async fn push(&self, cwd: &Path, branch: &str, set_upstream: bool) -> Result<()> {
        self.calls.lock().unwrap().push(GitCall::Push {
            cwd: cwd.to_path_buf(),
            branch: branch.to_string(),
            set_upstream,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::MockRunner;

    #[tokio::test]
    async fn test_ensure_branch_checkout_existing() {
        let runner = MockRunner::new();
        let git = GitCli::with_runner(runner);

        git.ensure_branch_and_sync(Path::new("/copy"), "feat/x", None)
            .await
            .unwrap();

        let commands = git.runner.commands();
        assert_eq!(
            commands,
            vec![
                "fetch --all --prune".to_string(),
                "checkout feat/x".to_string(),
                "pull origin feat/x".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_ensure_branch_creates_from_base() {
        let runner = MockRunner::new()
            .with_response("checkout feat/x", GitOutput::failed("unknown branch"));
        let git = GitCli::with_runner(runner);

        git.ensure_branch_and_sync(Path::new("/copy"), "feat/x", Some("main"))
            .await
            .unwrap();

        let commands = git.runner.commands();
        assert!(commands.contains(&"checkout -b feat/x origin/main".to_string()));
        assert!(commands.contains(&"pull origin main".to_string()));
    }

    #[tokio::test]
    async fn test_ensure_branch_tolerates_pull_failure() {
        let runner = MockRunner::new().with_response(
            "pull origin feat/x",
            GitOutput::failed("no tracking information"),
        );
        let git = GitCli::with_runner(runner);

        git.ensure_branch_and_sync(Path::new("/copy"), "feat/x", None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_commit_all_skips_when_clean() {
        let runner = MockRunner::new();
        let git = GitCli::with_runner(runner);

        let committed = git.commit_all(Path::new("/copy"), "msg").await.unwrap();
        assert!(!committed);

        let commands = git.runner.commands();
        assert_eq!(
            commands,
            vec!["add -A".to_string(), "status --porcelain".to_string()]
        );
    }

    #[tokio::test]
    async fn test_commit_all_commits_dirty_tree() {
        let runner = MockRunner::new()
            .with_response("status --porcelain", GitOutput::ok(" M a.rs\n"));
        let git = GitCli::with_runner(runner);

        let committed = git.commit_all(Path::new("/copy"), "msg").await.unwrap();
        assert!(committed);
        assert!(git.runner.commands().contains(&"commit -m msg".to_string()));
    }

    #[tokio::test]
    async fn test_commit_empty_reports_failure() {
        let runner = MockRunner::new().with_response(
            "commit --allow-empty -m Empty commit",
            GitOutput::failed("fatal: bad config"),
        );
        let git = GitCli::with_runner(runner);

        let created = git
            .commit_empty(Path::new("/copy"), "Empty commit")
            .await
            .unwrap();
        assert!(!created);
    }

    #[tokio::test]
    async fn test_push_set_upstream_falls_back() {
        let runner = MockRunner::new().with_response(
            "push --set-upstream origin feat/x",
            GitOutput::failed("error: unknown option `set-upstream'"),
        );
        let git = GitCli::with_runner(runner);

        git.push(Path::new("/copy"), "feat/x", true).await.unwrap();

        let commands = git.runner.commands();
        assert_eq!(
            commands,
            vec![
                "push --set-upstream origin feat/x".to_string(),
                "push origin feat/x".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_push_other_failure_propagates() {
        let runner = MockRunner::new().with_response(
            "push --set-upstream origin feat/x",
            GitOutput::failed("remote: permission denied"),
        );
        let git = GitCli::with_runner(runner);

        let err = git.push(Path::new("/copy"), "feat/x", true).await;
        assert!(matches!(err, Err(ReforgeError::VersionControl(_))));
    }
}
