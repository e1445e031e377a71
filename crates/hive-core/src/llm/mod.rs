//! Model backend interface and conversation types
//!
//! The core never talks to a provider directly. Callers plug in an
//! implementation of [`Backend`]; the agent loop hands it the running
//! conversation and the capability definitions and gets back either a
//! final answer or a single tool call.

mod backend;
mod types;

pub use backend::{Backend, ModelRequest, ModelTurn, ToolCall};
pub use types::*;
