//! # reforge-core
//!
//! Core types for the reforge task orchestration engine.
//!
//! Reforge automates a human-like software-change workflow: pick the next
//! unit of work from a backlog, drive an external coding agent through a
//! planning phase and an implementation phase, manage the git and
//! pull-request mechanics those phases require, and retire tasks whose
//! planning pull request has merged.
//!
//! ## Core Paradigm
//!
//! - A task IS a YAML descriptor in a directory (`task_dir/task.yaml`)
//! - Progress IS the stage field (`planning` -> `ready-for-implementing`
//!   -> `implementing` -> `completed`)
//! - The plan IS a document the agent writes (`task_dir/plan.md`)
//! - One invocation processes exactly one task; flat files are the only
//!   persistent state

mod config;
mod error;
mod fs;
mod types;
mod validate;

pub use config::Config;
pub use error::{ReforgeError, Result};
pub use fs::{read_yaml, read_yaml_if_exists, write_yaml};
pub use types::*;
pub use validate::validate_and_normalize;
