//! Tool trait definition

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::path::Path;

use crate::agents::{Agent, AgentId};
use crate::artifact::ArtifactStore;
use crate::Result;

/// Tool execution result
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    /// Output string from tool execution
    pub output: String,
    /// Whether the execution resulted in an error
    pub is_error: bool,
}

impl ToolResult {
    /// Create a successful tool result
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: false,
        }
    }

    /// Create an error tool result
    pub fn error(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: true,
        }
    }
}

/// The agent on whose behalf a tool runs
///
/// Tools reach the calling agent's identity, artifacts and sub-agents
/// through this handle instead of any ambient state.
#[derive(Clone, Copy)]
pub struct ToolContext<'a> {
    agent: &'a Agent,
}

impl<'a> ToolContext<'a> {
    pub fn new(agent: &'a Agent) -> Self {
        Self { agent }
    }

    pub fn agent(&self) -> &'a Agent {
        self.agent
    }

    pub fn agent_name(&self) -> &'a str {
        self.agent.name()
    }

    pub fn agent_id(&self) -> &'a AgentId {
        self.agent.id()
    }

    pub fn output_location(&self) -> &'a Path {
        self.agent.output_location()
    }

    pub fn artifacts(&self) -> &'a ArtifactStore {
        self.agent.artifacts()
    }
}

/// Handler behind a capability
///
/// Implementations must not keep mutable state that sibling agents could
/// race on: one handler may be shared by several agents running in
/// parallel.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name (used in tool definitions)
    fn name(&self) -> &str;

    /// Get the tool description (shown to the model when selecting tools)
    fn description(&self) -> &str;

    /// Get the JSON schema for the tool's input parameters
    fn input_schema(&self) -> JsonValue;

    /// Execute the tool with the given input
    ///
    /// Domain failures the model should see are returned as
    /// `Ok(ToolResult::error(..))`; `Err` is reserved for malformed input and
    /// infrastructure failures.
    async fn execute(&self, ctx: &ToolContext<'_>, input: JsonValue) -> Result<ToolResult>;
}

/// Fetch a required string parameter
pub(crate) fn required_str<'v>(input: &'v JsonValue, key: &str) -> Result<&'v str> {
    input[key]
        .as_str()
        .ok_or_else(|| crate::Error::ToolExecution(format!("Missing '{}' parameter", key)))
}
