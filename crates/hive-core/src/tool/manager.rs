//! Per-agent capability set

use std::collections::HashMap;
use std::sync::Arc;

use crate::llm::ToolDefinition;
use crate::tool::CapabilityDescriptor;
use crate::{Error, Result};

/// Capabilities of one agent, in registration order
///
/// Names are unique within a set; registering a second capability under an
/// existing name fails instead of replacing the first.
#[derive(Debug, Clone, Default)]
pub struct ToolSet {
    descriptors: Vec<Arc<CapabilityDescriptor>>,
    /// Name to position in `descriptors`
    index: HashMap<String, usize>,
}

impl ToolSet {
    /// Create a new empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability
    ///
    /// # Errors
    /// Returns `DuplicateCapability` if the name is already taken
    pub fn register(&mut self, descriptor: CapabilityDescriptor) -> Result<()> {
        if self.index.contains_key(descriptor.name()) {
            return Err(Error::DuplicateCapability(descriptor.name().to_string()));
        }
        self.index
            .insert(descriptor.name().to_string(), self.descriptors.len());
        self.descriptors.push(Arc::new(descriptor));
        Ok(())
    }

    /// Register several capabilities, stopping at the first duplicate
    pub fn extend(&mut self, descriptors: impl IntoIterator<Item = CapabilityDescriptor>) -> Result<()> {
        for descriptor in descriptors {
            self.register(descriptor)?;
        }
        Ok(())
    }

    /// Get a capability by name
    pub fn get(&self, name: &str) -> Option<Arc<CapabilityDescriptor>> {
        self.index
            .get(name)
            .map(|&position| Arc::clone(&self.descriptors[position]))
    }

    /// Definitions sent to the backend, in registration order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.descriptors.iter().map(|d| d.definition()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CapabilityDescriptor> {
        self.descriptors.iter().map(|d| d.as_ref())
    }

    /// Check if a capability is registered
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Capability names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.descriptors.iter().map(|d| d.name()).collect()
    }
}
