//! Error types for hive-core

use std::path::PathBuf;

use thiserror::Error;

use crate::artifact::ArtifactKind;

/// Main error type for hive-core
#[derive(Error, Debug)]
pub enum Error {
    /// Agent or backend configuration is missing or ambiguous
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Another live agent already holds this name
    #[error("An agent named '{name}' is already registered (agent_id: {existing_id})")]
    DuplicateName { name: String, existing_id: String },

    /// Two capabilities with the same name in one agent's capability set
    #[error("Capability '{0}' is already registered for this agent")]
    DuplicateCapability(String),

    /// Registry lookup by name found nothing
    #[error("No registered agent named '{0}'")]
    AgentNotFound(String),

    /// Delegation target is not one of the parent's sub-agents
    #[error("Sub-agent '{name}' not found under agent '{parent}'")]
    UnknownSubAgent { parent: String, name: String },

    /// Backend requested a capability the agent does not have
    #[error("Agent '{agent}' has no capability named '{name}'")]
    UnknownCapability { agent: String, name: String },

    /// Parallel transfer target without parallel dispatch support
    #[error("Capability error: {0}")]
    Capability(String),

    /// The loop ran out of steps before a final answer
    #[error("Agent '{agent}' exceeded its step limit of {limit}")]
    StepLimitExceeded { agent: String, limit: usize },

    /// Wrapped failure from the model backend
    #[error("Backend error: {0}")]
    Backend(String),

    /// Durable artifact write or read failed
    #[error("Artifact I/O error on {artifact} ({}): {source}", path.display())]
    ArtifactIo {
        artifact: ArtifactKind,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Errors that end the current invocation instead of being reported
    /// back to the model as a tool result.
    pub fn is_fatal_for_loop(&self) -> bool {
        matches!(
            self,
            Error::ArtifactIo { .. } | Error::UnknownCapability { .. }
        )
    }
}

/// Result type alias for hive-core
pub type Result<T> = std::result::Result<T, Error>;
