//! Task matcher/picker: select the next unit of work

use reforge_core::{
    normalize_agent_list, read_yaml, validate_and_normalize, MatchedTask, ReforgeError, Result,
    Task, DEFAULT_AGENT,
};
use reforge_github::UsageService;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::task_repository::TASK_FILENAME;

#[derive(Debug, Deserialize)]
struct Backlog {
    #[serde(default)]
    ideas: Option<Vec<Task>>,
    #[serde(default)]
    tasks: Option<Vec<Task>>,
}

/// Review-blocking keys from sibling task directories of the backlog file.
///
/// Every sibling directory holding a descriptor with `review_required`
/// contributes its `kind::repo` key. Unreadable descriptors are skipped so
/// a broken record cannot wedge the queue.
fn collect_blocking_review_keys(ideas_file: &Path) -> HashSet<String> {
    let mut keys = HashSet::new();

    let Some(dir) = ideas_file.parent() else {
        return keys;
    };
    let Ok(entries) = std::fs::read_dir(dir) else {
        return keys;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let descriptor = path.join(TASK_FILENAME);
        if !descriptor.is_file() {
            continue;
        }

        let Ok(raw) = read_yaml::<Task>(&descriptor) else {
            continue;
        };
        let Ok(task) = validate_and_normalize(&raw) else {
            continue;
        };
        if task.requires_review() {
            if let Some(key) = task.blocking_key() {
                keys.insert(key);
            }
        }
    }

    keys
}

fn parse_task_entries(ideas_file: &Path) -> Result<Vec<Task>> {
    if !ideas_file.exists() {
        return Err(ReforgeError::NoTasksFound(format!(
            "ideas file not found at {}",
            ideas_file.display()
        )));
    }

    let backlog: Backlog = read_yaml(ideas_file).map_err(|_| {
        ReforgeError::NoTasksFound(
            "no tasks or ideas found in the YAML file or invalid format".to_string(),
        )
    })?;

    let entries = backlog
        .ideas
        .filter(|list| !list.is_empty())
        .or(backlog.tasks)
        .filter(|list| !list.is_empty())
        .ok_or_else(|| {
            ReforgeError::NoTasksFound(
                "no tasks or ideas found in the YAML file or invalid format".to_string(),
            )
        })?;

    entries.iter().map(validate_and_normalize).collect()
}

/// Pick the next task from a backlog file.
///
/// Candidates are ordered by priority rank, FIFO within equal priority.
/// A candidate that itself requires review is skipped while another task
/// of the same `kind`+`repo` pair holds a review slot.
pub fn pick_next_task(ideas_file: &Path) -> Result<Task> {
    let blocking_keys = collect_blocking_review_keys(ideas_file);
    let tasks = parse_task_entries(ideas_file)?;

    let mut prioritized: Vec<(usize, Task)> = tasks.into_iter().enumerate().collect();
    prioritized.sort_by_key(|(index, task)| (task.priority.rank(), *index));

    for (_, task) in prioritized {
        if task.requires_review() {
            if let Some(key) = task.blocking_key() {
                if blocking_keys.contains(&key) {
                    continue;
                }
            }
        }
        return Ok(task);
    }

    Err(ReforgeError::NoEligibleTask)
}

/// Locate the descriptor bound to a planning pull request.
///
/// Depth-first over the directory tree in OS-reported entry order, which
/// is not guaranteed stable across filesystems; the first match wins.
pub fn find_task_by_pr_id(tasks_dir: &Path, pr_id: &str) -> Option<PathBuf> {
    let entries = std::fs::read_dir(tasks_dir).ok()?;

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if let Some(found) = find_task_by_pr_id(&path, pr_id) {
                return Some(found);
            }
        } else if path
            .file_name()
            .map(|name| name.to_string_lossy().ends_with(TASK_FILENAME))
            .unwrap_or(false)
        {
            match read_yaml::<Task>(&path) {
                Ok(task) if task.planning_pr_id.as_deref() == Some(pr_id) => {
                    info!("Found matching task file: {}", path.display());
                    return Some(path);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Could not read or parse {}: {}", path.display(), e);
                }
            }
        }
    }

    None
}

/// Normalize an entry into a matched task with its agent fixed.
///
/// The selected agent is the first entry of the normalized, deduplicated
/// agent list; an empty or all-invalid list resolves to the default
/// agent. The usage quota is the only network-dependent step in matching.
pub async fn match_task_agent(entry: &Task, usage: &dyn UsageService) -> Result<MatchedTask> {
    let mut task = validate_and_normalize(entry)?;

    let mut agents = normalize_agent_list(&task.agents);
    if agents.is_empty() {
        agents.push(DEFAULT_AGENT);
    }

    let selected = agents[0];
    task.agents = agents.iter().map(|a| a.canonical().to_string()).collect();

    info!("Checking for available tokens...");
    if !usage.has_tokens(selected).await? {
        return Err(ReforgeError::QuotaExceeded(selected.to_string()));
    }
    info!("Tokens are available.");

    Ok(MatchedTask {
        selected_agent: selected,
        task,
    })
}
