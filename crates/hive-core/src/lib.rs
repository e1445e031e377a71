//! hive-core: multi-agent orchestration library
//!
//! Agents run a model/tool loop against a pluggable [`Backend`], keep their
//! working memory in durable artifact files, and delegate sub-tasks to
//! sub-agents one at a time or in bounded parallel batches.

pub mod agents;
pub mod artifact;
pub mod config;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod telemetry;
pub mod tool;

#[cfg(test)]
pub(crate) mod testing;

pub use agents::{
    Agent, AgentBuilder, AgentId, AgentOutcome, AgentRegistry, AgentState, SubAgentDescriptor,
    TransferOutcome, TransferStatus,
};
pub use artifact::{ArtifactKind, ArtifactStore};
pub use config::{BackendConfig, BatchFailurePolicy, Config, HostedConfig, LocalConfig, RuntimeConfig};
pub use error::{Error, Result};
pub use llm::{Backend, Message, MessageContent, ModelRequest, ModelTurn, ToolCall, ToolDefinition};
pub use orchestrator::Orchestrator;
pub use tool::{CapabilityDescriptor, Tool, ToolContext, ToolResult, ToolSet};
