//! Artifact type definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// How updates to an artifact are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Each write replaces the whole file
    Overwrite,
    /// Each write adds one entry at the end
    Append,
}

/// The four artifacts an agent keeps under its output location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    WorkPlan,
    Memory,
    Reflection,
    Result,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 4] = [
        ArtifactKind::WorkPlan,
        ArtifactKind::Memory,
        ArtifactKind::Reflection,
        ArtifactKind::Result,
    ];

    /// File name relative to the agent's output location
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::WorkPlan => "work_plan.md",
            Self::Memory => "memory.md",
            Self::Reflection => "reflection.md",
            Self::Result => "result.md",
        }
    }

    pub fn write_mode(&self) -> WriteMode {
        match self {
            Self::WorkPlan | Self::Result => WriteMode::Overwrite,
            Self::Memory | Self::Reflection => WriteMode::Append,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::WorkPlan => "work plan",
            Self::Memory => "memory",
            Self::Reflection => "reflection",
            Self::Result => "result",
        };
        f.write_str(label)
    }
}
