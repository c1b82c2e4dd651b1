//! Shared mocks for workflow tests

use async_trait::async_trait;
use reforge_agent::{Agent, AgentRegistry, AgentRunOptions, AgentRunResult};
use reforge_core::{AgentId, Result};
use reforge_git::{MockVersionControl, PrepareRequest, WorkspaceProvisioner};
use reforge_github::{MockPullRequestService, TokenCache, UsageService};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::services::Services;

/// Workspace provisioner returning scripted paths
pub struct MockWorkspace {
    pub paths: Vec<PathBuf>,
    pub requests: Mutex<Vec<PrepareRequest>>,
}

impl MockWorkspace {
    pub fn returning(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl WorkspaceProvisioner for MockWorkspace {
    async fn prepare(&self, request: &PrepareRequest) -> Result<Vec<PathBuf>> {
        self.requests.lock().unwrap().push(request.clone());
        for path in &self.paths {
            std::fs::create_dir_all(path).unwrap();
        }
        Ok(self.paths.clone())
    }
}

/// Agent returning a scripted result and recording its run options
pub struct MockAgent {
    pub result: AgentRunResult,
    pub runs: Arc<Mutex<Vec<AgentRunOptions>>>,
}

impl MockAgent {
    pub fn succeeding() -> (Arc<Self>, Arc<Mutex<Vec<AgentRunOptions>>>) {
        let runs = Arc::new(Mutex::new(Vec::new()));
        let agent = Arc::new(Self {
            result: AgentRunResult::success("agent logs"),
            runs: runs.clone(),
        });
        (agent, runs)
    }

    pub fn with_result(result: AgentRunResult) -> (Arc<Self>, Arc<Mutex<Vec<AgentRunOptions>>>) {
        let runs = Arc::new(Mutex::new(Vec::new()));
        let agent = Arc::new(Self {
            result,
            runs: runs.clone(),
        });
        (agent, runs)
    }
}

#[async_trait]
impl Agent for MockAgent {
    async fn run(&self, options: AgentRunOptions, _cancel: CancellationToken) -> AgentRunResult {
        self.runs.lock().unwrap().push(options);
        self.result.clone()
    }
}

/// Usage service with a fixed answer
pub struct MockUsage {
    pub allowed: bool,
}

impl MockUsage {
    pub fn allowing() -> Self {
        Self { allowed: true }
    }

    pub fn denying() -> Self {
        Self { allowed: false }
    }
}

#[async_trait]
impl UsageService for MockUsage {
    async fn has_tokens(&self, _agent: AgentId) -> Result<bool> {
        Ok(self.allowed)
    }
}

/// Services bundle wired entirely from mocks
pub struct TestServices {
    pub services: Services,
    pub git: Arc<MockVersionControl>,
    pub pr: Arc<MockPullRequestService>,
    pub agent_runs: Arc<Mutex<Vec<AgentRunOptions>>>,
}

pub fn test_services(workspace_paths: Vec<PathBuf>, agent: Arc<MockAgent>) -> TestServices {
    let git = Arc::new(MockVersionControl::new());
    let pr = Arc::new(MockPullRequestService::new(42));
    let agent_runs = agent.runs.clone();

    let mut registry = AgentRegistry::new();
    for id in reforge_core::ALLOWED_AGENTS {
        let agent = agent.clone();
        registry.register(id, move || agent.clone() as Arc<dyn Agent>);
    }

    let services = Services {
        workspace: Arc::new(MockWorkspace::returning(workspace_paths)),
        git: git.clone(),
        pr: pr.clone(),
        agents: Arc::new(registry),
        usage: Arc::new(MockUsage::allowing()),
        tokens: Arc::new(TokenCache::new()),
    };

    TestServices {
        services,
        git,
        pr,
        agent_runs,
    }
}
