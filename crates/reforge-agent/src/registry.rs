//! Capability-keyed agent registry

use reforge_core::{AgentId, ReforgeError, Result};
use std::collections::HashMap;
use std::sync::Arc;

use crate::codex::CodexAgent;
use crate::gemini::GeminiAgent;
use crate::port::Agent;

type AgentFactory = Box<dyn Fn() -> Arc<dyn Agent> + Send + Sync>;

/// Maps an agent identifier to a runtime factory
///
/// A table rather than a type hierarchy: callers register a factory per
/// id and resolve at match time.
#[derive(Default)]
pub struct AgentRegistry {
    factories: HashMap<AgentId, AgentFactory>,
}

impl AgentRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry covering every allowed agent id
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(AgentId::OpenaiCodex, || Arc::new(CodexAgent::new()));
        registry.register(AgentId::GoogleGemini25Pro, || Arc::new(GeminiAgent::new()));
        registry.register(AgentId::GoogleGemini25Flash, || Arc::new(GeminiAgent::new()));
        registry
    }

    pub fn register<F>(&mut self, id: AgentId, factory: F)
    where
        F: Fn() -> Arc<dyn Agent> + Send + Sync + 'static,
    {
        self.factories.insert(id, Box::new(factory));
    }

    /// Resolve the runtime for an agent id
    pub fn get(&self, id: AgentId) -> Result<Arc<dyn Agent>> {
        self.factories
            .get(&id)
            .map(|factory| factory())
            .ok_or_else(|| ReforgeError::AgentRun(format!("unknown agent: {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reforge_core::ALLOWED_AGENTS;

    #[test]
    fn test_defaults_cover_all_allowed_agents() {
        let registry = AgentRegistry::with_defaults();
        for agent in ALLOWED_AGENTS {
            assert!(registry.get(agent).is_ok(), "missing factory for {}", agent);
        }
    }

    #[test]
    fn test_empty_registry_errors() {
        let registry = AgentRegistry::new();
        assert!(matches!(
            registry.get(AgentId::OpenaiCodex),
            Err(ReforgeError::AgentRun(_))
        ));
    }
}
