//! Agents and delegation
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    AgentRegistry                      │
//! │   id → Agent, names unique among live agents          │
//! └──────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌──────────────────────────────────────────────────────┐
//! │                        Agent                          │
//! │  - model / tool loop, bounded by max_steps            │
//! │  - ArtifactStore under <output_root>/<name>-<id>/     │
//! │  - sub-agents by name                                 │
//! └──────────────────────────────────────────────────────┘
//!                           │ transfer_to_subagent(s)
//!                           ▼
//! ┌──────────────────────────────────────────────────────┐
//! │                 DelegationDispatcher                  │
//! │  - one-to-one: run one sub-agent, wait                │
//! │  - one-to-many: bounded fan-out, completion barrier   │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use hive_core::agents::{Agent, AgentRegistry, SubAgentDescriptor};
//! use hive_core::config::LocalConfig;
//!
//! let registry = AgentRegistry::new();
//! let researcher = Agent::builder("researcher")
//!     .local(LocalConfig::new("llama3"))
//!     .backend(backend.clone())
//!     .output_root("output")
//!     .build(&registry)?;
//!
//! let lead = Agent::builder("lead")
//!     .local(LocalConfig::new("llama3"))
//!     .backend(backend)
//!     .output_root("output")
//!     .sub_agent(SubAgentDescriptor::parallel(researcher, "Finds facts"))
//!     .build(&registry)?;
//!
//! let outcome = lead.invoke("Write a short report on tidal power").await?;
//! println!("{}", outcome.output);
//! ```

pub mod agent;
pub mod delegation;
pub mod prompt;
pub mod registry;
pub mod types;

pub use agent::{Agent, AgentBuilder};
pub use delegation::{DelegationConfig, DelegationDispatcher};
pub use prompt::DelegationHeader;
pub use registry::AgentRegistry;
pub use types::{
    AgentId, AgentOutcome, AgentState, SubAgentDescriptor, ToolCallRecord, TransferOutcome,
    TransferStatus,
};
