//! Capability system
//!
//! A capability ("tool") is described by a [`CapabilityDescriptor`]: its
//! name, a JSON-schema for its parameters, the handler that runs it and,
//! optionally, literal source text supplied by its author. Every agent owns
//! a [`ToolSet`] of descriptors; the built-in artifact tools are added to
//! each agent automatically.

pub mod builtin;
pub mod definition;
pub mod manager;
pub mod traits;

pub use definition::{CapabilityDescriptor, CapabilityDescriptorBuilder, FnTool, SchemaBuilder};
pub use manager::ToolSet;
pub use traits::{Tool, ToolContext, ToolResult};
