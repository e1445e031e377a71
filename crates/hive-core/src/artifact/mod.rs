//! Per-agent artifact files
//!
//! Every agent owns four markdown files under its output location:
//! a work plan, a memory log, a reflection log and the final result.
//! Writes are published atomically (temp file + rename), so a crash in
//! the middle of a step never leaves a half-written artifact behind.

mod store;
mod types;

pub use store::{ArtifactStore, WorkPlanCreation};
pub use types::{ArtifactKind, WriteMode};
