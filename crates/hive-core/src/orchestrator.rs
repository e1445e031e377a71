//! Top-level owner of the agent registry

use std::sync::Arc;

use tracing::{debug, info};

use crate::agents::{Agent, AgentBuilder, AgentId, AgentOutcome, AgentRegistry};
use crate::config::Config;
use crate::llm::Backend;
use crate::Result;

/// Owns the registry and the configuration agents are built from
///
/// Builders handed out by [`agent`](Self::agent) start from the loaded
/// configuration and the shared backend; any of their settings can still be
/// overridden before `build`.
pub struct Orchestrator {
    registry: Arc<AgentRegistry>,
    config: Config,
    backend: Arc<dyn Backend>,
}

impl Orchestrator {
    pub fn new(config: Config, backend: Arc<dyn Backend>) -> Self {
        Self {
            registry: Arc::new(AgentRegistry::new()),
            config,
            backend,
        }
    }

    /// Load configuration via [`Config::load`]
    pub fn from_env(backend: Arc<dyn Backend>) -> Result<Self> {
        Ok(Self::new(Config::load()?, backend))
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Builder preset with this orchestrator's configuration and backend
    pub fn agent(&self, name: impl Into<String>) -> AgentBuilder {
        Agent::builder(name)
            .config(&self.config)
            .backend(Arc::clone(&self.backend))
    }

    /// Build and register an agent in this orchestrator's registry
    pub fn register(&self, builder: AgentBuilder) -> Result<Arc<Agent>> {
        builder.build(&self.registry)
    }

    /// Invoke `agent` on `task`, then unregister it and all its sub-agents
    ///
    /// Unregistration happens whether the invocation succeeds, fails,
    /// panics or is dropped before completion.
    pub async fn run(&self, agent: Arc<Agent>, task: &str) -> Result<AgentOutcome> {
        let _teardown = TreeTeardown::new(Arc::clone(&self.registry), &agent);
        let result = agent.invoke(task).await;
        info!(agent = %agent.name(), success = result.is_ok(), "Run finished");
        result
    }

    /// Unregister an agent tree without running it
    pub fn teardown(&self, agent: &Agent) -> usize {
        self.registry.unregister_recursive(agent.id()).len()
    }
}

/// Unregisters an agent tree when dropped
struct TreeTeardown {
    registry: Arc<AgentRegistry>,
    id: AgentId,
    name: String,
}

impl TreeTeardown {
    fn new(registry: Arc<AgentRegistry>, agent: &Agent) -> Self {
        Self {
            registry,
            id: agent.id().clone(),
            name: agent.name().to_string(),
        }
    }
}

impl Drop for TreeTeardown {
    fn drop(&mut self) {
        let removed = self.registry.unregister_recursive(&self.id);
        debug!(agent = %self.name, unregistered = removed.len(), "Agent tree unregistered");
    }
}
