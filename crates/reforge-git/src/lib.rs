//! # reforge-git
//!
//! Git working-copy operations and workspace preparation for reforge.
//!
//! This crate provides:
//! - A process-execution abstraction over the `git` CLI (mockable in tests)
//! - The [`VersionControl`] port used by the planning workflow
//! - The [`WorkspaceProvisioner`] port that clones and checks out the
//!   working copies a task needs
//!
//! All operations are scoped to an explicit working-copy path; one reforge
//! invocation juggles several working copies (main repo, tasks repo).

mod command;
mod service;
mod workspace;

pub use command::{GitOutput, GitProcess, MockRunner, ProcessRunner};
pub use service::{GitCall, GitCli, MockVersionControl, VersionControl};
pub use workspace::{GitWorkspaceManager, PrepareRequest, WorkspaceProvisioner};
