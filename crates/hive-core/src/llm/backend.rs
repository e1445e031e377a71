//! Backend trait

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::types::{Message, ToolDefinition};
use crate::config::BackendConfig;
use crate::Result;

/// One model call as seen by a backend
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// Name of the calling agent
    pub agent: String,
    /// Backend configuration fixed when the agent was built
    pub config: BackendConfig,
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            name: name.into(),
            input,
        }
    }
}

/// What the model decided to do in one step
#[derive(Debug, Clone, PartialEq)]
pub enum ModelTurn {
    /// The model is done; the text is the agent's answer
    Final(String),
    /// The model wants exactly one capability invoked
    ToolCall(ToolCall),
}

/// Language-model backend used by the agent loop
///
/// Provider selection, credentials and wire formats live entirely in the
/// implementation. Errors should be reported as [`crate::Error::Backend`].
#[async_trait]
pub trait Backend: Send + Sync {
    async fn complete(&self, request: ModelRequest) -> Result<ModelTurn>;
}
