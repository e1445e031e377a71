//! Agent identity, state and outcome types

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::agent::Agent;
use crate::llm::Message;

/// Unique identifier of a registered agent
///
/// Formatted as `<unix-micros>-<uuid v7>`, so ids sort by creation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(String);

impl AgentId {
    /// Generate a fresh id
    pub fn generate() -> Self {
        Self(format!(
            "{}-{}",
            Utc::now().timestamp_micros(),
            uuid::Uuid::now_v7().simple()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Observable lifecycle state of an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

/// Record of a tool call made during an invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
    pub output: String,
    pub is_error: bool,
    pub at: DateTime<Utc>,
}

/// Result of a completed invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutcome {
    pub agent_id: AgentId,
    pub agent_name: String,
    /// Final answer text
    pub output: String,
    /// Model calls used
    pub steps: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub tool_calls: Vec<ToolCallRecord>,
    /// Where the final answer was written
    pub result_path: PathBuf,
    /// Full conversation, usable as history for a follow-up invocation
    pub history: Vec<Message>,
}

/// A sub-agent as seen by its parent
#[derive(Clone)]
pub struct SubAgentDescriptor {
    agent: Arc<Agent>,
    description: String,
    supports_parallel_dispatch: bool,
}

impl SubAgentDescriptor {
    /// Sequential-only sub-agent
    pub fn new(agent: Arc<Agent>, description: impl Into<String>) -> Self {
        Self {
            agent,
            description: description.into(),
            supports_parallel_dispatch: false,
        }
    }

    /// Sub-agent that may also be a target of `transfer_to_subagents`
    pub fn parallel(agent: Arc<Agent>, description: impl Into<String>) -> Self {
        Self::new(agent, description).with_parallel_dispatch(true)
    }

    pub fn with_parallel_dispatch(mut self, supported: bool) -> Self {
        self.supports_parallel_dispatch = supported;
        self
    }

    pub fn name(&self) -> &str {
        self.agent.name()
    }

    pub fn agent(&self) -> &Arc<Agent> {
        &self.agent
    }

    /// Routing hint shown to the parent's model
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn supports_parallel_dispatch(&self) -> bool {
        self.supports_parallel_dispatch
    }
}

impl fmt::Debug for SubAgentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubAgentDescriptor")
            .field("name", &self.name())
            .field("id", self.agent.id())
            .field("description", &self.description)
            .field("supports_parallel_dispatch", &self.supports_parallel_dispatch)
            .finish()
    }
}

/// Status of one delegation target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Completed,
    Failed,
    /// Never started because the batch was aborted
    Skipped,
}

/// Per-target result of a transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub agent: String,
    pub status: TransferStatus,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_path: Option<PathBuf>,
    /// Memory log of a target that failed after recording notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_path: Option<PathBuf>,
    pub steps: usize,
}

impl TransferOutcome {
    /// Create a successful outcome from the target's invocation result
    pub fn completed(outcome: AgentOutcome) -> Self {
        Self {
            agent: outcome.agent_name,
            status: TransferStatus::Completed,
            output: outcome.output,
            error: None,
            result_path: Some(outcome.result_path),
            memory_path: None,
            steps: outcome.steps,
        }
    }

    /// Create a failed outcome
    pub fn failed(agent: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            status: TransferStatus::Failed,
            output: String::new(),
            error: Some(error.into()),
            result_path: None,
            memory_path: None,
            steps: 0,
        }
    }

    /// Point the parent at the target's memory log
    pub fn with_memory_path(mut self, path: PathBuf) -> Self {
        self.memory_path = Some(path);
        self
    }

    /// Create an outcome for a target that never ran
    pub fn skipped(agent: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            status: TransferStatus::Skipped,
            ..Self::failed(agent, reason)
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TransferStatus::Completed
    }
}
