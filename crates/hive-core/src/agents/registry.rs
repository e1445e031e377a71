//! Agent registry
//!
//! Maps agent ids to live agents and keeps names unique among them. A
//! registry is an ordinary value: independent registries can coexist, and
//! the [`Orchestrator`](crate::Orchestrator) owns the one an application
//! normally uses.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use super::agent::Agent;
use super::types::AgentId;
use crate::{Error, Result};

#[derive(Default)]
struct Entries {
    agents: HashMap<AgentId, Arc<Agent>>,
    /// Name to ID mapping for lookup by name
    name_to_id: HashMap<String, AgentId>,
}

impl Entries {
    /// Remove an agent and, depth first, every registered sub-agent below it
    fn remove_recursive(&mut self, id: &AgentId, removed: &mut Vec<Arc<Agent>>) {
        let Some(agent) = self.remove(id) else {
            return;
        };
        for sub_agent in agent.sub_agents().values() {
            self.remove_recursive(sub_agent.agent().id(), removed);
        }
        removed.push(agent);
    }

    fn remove(&mut self, id: &AgentId) -> Option<Arc<Agent>> {
        let agent = self.agents.remove(id)?;
        if self.name_to_id.get(agent.name()) == Some(id) {
            self.name_to_id.remove(agent.name());
        }
        Some(agent)
    }
}

/// Registry of live agents
#[derive(Default)]
pub struct AgentRegistry {
    entries: Mutex<Entries>,
}

impl AgentRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent named `name`
    ///
    /// Inside one critical section the name is checked, a fresh id is
    /// allocated and `build` turns that id into the agent handle that gets
    /// stored. `build` must not touch this registry.
    ///
    /// # Errors
    /// Returns `DuplicateName` if another live agent holds `name`; nothing
    /// is inserted in that case and `build` is not called.
    pub fn register_with<F>(&self, name: &str, build: F) -> Result<Arc<Agent>>
    where
        F: FnOnce(AgentId) -> Arc<Agent>,
    {
        let mut entries = self.entries.lock();

        if let Some(existing) = entries.name_to_id.get(name) {
            return Err(Error::DuplicateName {
                name: name.to_string(),
                existing_id: existing.to_string(),
            });
        }

        let mut id = AgentId::generate();
        while entries.agents.contains_key(&id) {
            id = AgentId::generate();
        }

        let agent = build(id.clone());
        entries.name_to_id.insert(name.to_string(), id.clone());
        entries.agents.insert(id.clone(), Arc::clone(&agent));

        info!(agent = %name, agent_id = %id, "Registered agent");
        Ok(agent)
    }

    /// Remove an agent; unknown ids are ignored
    pub fn unregister(&self, id: &AgentId) -> Option<Arc<Agent>> {
        let removed = self.entries.lock().remove(id);
        if let Some(agent) = &removed {
            info!(agent = %agent.name(), agent_id = %id, "Unregistered agent");
        }
        removed
    }

    /// Remove an agent together with all of its sub-agents
    ///
    /// Returns the removed agents, deepest first.
    pub fn unregister_recursive(&self, id: &AgentId) -> Vec<Arc<Agent>> {
        let mut removed = Vec::new();
        self.entries.lock().remove_recursive(id, &mut removed);
        for agent in &removed {
            debug!(agent = %agent.name(), agent_id = %agent.id(), "Unregistered agent");
        }
        removed
    }

    /// Look up a live agent by name
    pub fn lookup_by_name(&self, name: &str) -> Result<Arc<Agent>> {
        let entries = self.entries.lock();
        entries
            .name_to_id
            .get(name)
            .and_then(|id| entries.agents.get(id).cloned())
            .ok_or_else(|| Error::AgentNotFound(name.to_string()))
    }

    /// Get a live agent by id
    pub fn get(&self, id: &AgentId) -> Option<Arc<Agent>> {
        self.entries.lock().agents.get(id).cloned()
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.entries.lock().name_to_id.contains_key(name)
    }

    /// Get the number of registered agents
    pub fn len(&self) -> usize {
        self.entries.lock().agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().agents.is_empty()
    }

    /// Names of all live agents, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.lock().name_to_id.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::SubAgentDescriptor;
    use crate::testing::{agent_builder, ScriptedBackend};
    use tempfile::TempDir;

    #[test]
    fn test_register_and_lookup() {
        let dir = TempDir::new().unwrap();
        let registry = AgentRegistry::new();
        assert!(registry.is_empty());

        let agent = agent_builder("alpha", dir.path(), ScriptedBackend::empty())
            .build(&registry)
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.contains_name("alpha"));
        assert_eq!(registry.lookup_by_name("alpha").unwrap().id(), agent.id());
        assert!(registry.get(agent.id()).is_some());
        assert!(matches!(
            registry.lookup_by_name("beta"),
            Err(Error::AgentNotFound(name)) if name == "beta"
        ));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let dir = TempDir::new().unwrap();
        let registry = AgentRegistry::new();

        let first = agent_builder("alpha", dir.path(), ScriptedBackend::empty())
            .build(&registry)
            .unwrap();
        let err = agent_builder("alpha", dir.path(), ScriptedBackend::empty())
            .build(&registry)
            .unwrap_err();

        match err {
            Error::DuplicateName { name, existing_id } => {
                assert_eq!(name, "alpha");
                assert_eq!(existing_id, first.id().to_string());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.names(), vec!["alpha"]);
    }

    #[test]
    fn test_concurrent_registration_of_one_name() {
        let dir = TempDir::new().unwrap();
        let registry = AgentRegistry::new();

        let successes = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        agent_builder("contested", dir.path(), ScriptedBackend::empty())
                            .build(&registry)
                            .is_ok()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|ok| *ok)
                .count()
        });

        assert_eq!(successes, 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let registry = AgentRegistry::new();
        let agent = agent_builder("alpha", dir.path(), ScriptedBackend::empty())
            .build(&registry)
            .unwrap();

        assert!(registry.unregister(agent.id()).is_some());
        assert!(registry.unregister(agent.id()).is_none());
        assert!(registry.is_empty());

        // The name is free again
        agent_builder("alpha", dir.path(), ScriptedBackend::empty())
            .build(&registry)
            .unwrap();
    }

    #[test]
    fn test_unregister_recursive_removes_sub_agents() {
        let dir = TempDir::new().unwrap();
        let registry = AgentRegistry::new();

        let leaf = agent_builder("leaf", dir.path(), ScriptedBackend::empty())
            .build(&registry)
            .unwrap();
        let middle = agent_builder("middle", dir.path(), ScriptedBackend::empty())
            .sub_agent(SubAgentDescriptor::new(leaf, "leaf work"))
            .build(&registry)
            .unwrap();
        let root = agent_builder("root", dir.path(), ScriptedBackend::empty())
            .sub_agent(SubAgentDescriptor::parallel(middle, "middle work"))
            .build(&registry)
            .unwrap();
        let bystander = agent_builder("bystander", dir.path(), ScriptedBackend::empty())
            .build(&registry)
            .unwrap();
        assert_eq!(registry.len(), 4);

        let removed: Vec<String> = registry
            .unregister_recursive(root.id())
            .iter()
            .map(|a| a.name().to_string())
            .collect();

        assert_eq!(removed, vec!["leaf", "middle", "root"]);
        assert_eq!(registry.names(), vec![bystander.name().to_string()]);
        assert!(registry.unregister_recursive(root.id()).is_empty());
    }
}
