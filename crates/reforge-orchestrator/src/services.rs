//! Composition root bundling the workflow collaborators

use reforge_agent::AgentRegistry;
use reforge_core::Result;
use reforge_git::{GitCli, GitWorkspaceManager, VersionControl, WorkspaceProvisioner};
use reforge_github::{GithubPrService, PullRequestService, TokenCache, UsageService, UsageServiceAdapter};
use std::sync::Arc;

/// The collaborators a workflow invocation needs
///
/// Owned as trait objects so tests can substitute recording mocks for any
/// port. The token cache lives here so its reset operation has an owner.
pub struct Services {
    pub workspace: Arc<dyn WorkspaceProvisioner>,
    pub git: Arc<dyn VersionControl>,
    pub pr: Arc<dyn PullRequestService>,
    pub agents: Arc<AgentRegistry>,
    pub usage: Arc<dyn UsageService>,
    pub tokens: Arc<TokenCache>,
}

impl Services {
    /// Wire the real adapters from the environment
    pub fn default_services() -> Result<Self> {
        let tokens = Arc::new(TokenCache::new());
        let workspace_token = tokens.resolve(false)?;

        Ok(Self {
            workspace: Arc::new(GitWorkspaceManager::new(workspace_token)),
            git: Arc::new(GitCli::new()),
            pr: Arc::new(GithubPrService::from_env(&tokens)?),
            agents: Arc::new(AgentRegistry::with_defaults()),
            usage: Arc::new(UsageServiceAdapter::new()),
            tokens,
        })
    }
}
