//! Artifact tools every agent carries
//!
//! They let the model keep a work plan, a memory log and reflections on
//! disk under the agent's output location.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::traits::required_str;
use crate::artifact::WorkPlanCreation;
use crate::tool::{CapabilityDescriptor, SchemaBuilder, Tool, ToolContext, ToolResult};
use crate::Result;

/// Descriptors of all artifact tools
pub fn artifact_capabilities() -> Vec<CapabilityDescriptor> {
    let tools: [Arc<dyn Tool>; 6] = [
        Arc::new(CreateWorkPlanTool),
        Arc::new(UpdateWorkPlanTool),
        Arc::new(ReadWorkPlanTool),
        Arc::new(UpdateMemoryTool),
        Arc::new(ReadMemoryTool),
        Arc::new(ReflectTool),
    ];
    tools.into_iter().map(CapabilityDescriptor::from_tool).collect()
}

pub struct CreateWorkPlanTool;

#[async_trait]
impl Tool for CreateWorkPlanTool {
    fn name(&self) -> &str {
        "create_work_plan"
    }

    fn description(&self) -> &str {
        "Create the work plan as a markdown checklist. Use this once at the start of a task; \
         it does nothing if a plan already exists (use update_work_plan instead)."
    }

    fn input_schema(&self) -> Value {
        SchemaBuilder::object_schema(vec![(
            "plan",
            "string",
            "Markdown checklist, one step per line, each new step marked not started, e.g. '- [🟡] Step 1'",
            true,
        )])
    }

    async fn execute(&self, ctx: &ToolContext<'_>, input: Value) -> Result<ToolResult> {
        let plan = required_str(&input, "plan")?;
        debug!(agent = %ctx.agent_name(), "Creating work plan");

        match ctx.artifacts().create_work_plan(plan).await? {
            WorkPlanCreation::Created(path) => Ok(ToolResult::success(format!(
                "Work plan created at '{}'",
                path.display()
            ))),
            WorkPlanCreation::AlreadyExists(path) => Ok(ToolResult::error(format!(
                "A work plan already exists at '{}'. Use update_work_plan to change it.",
                path.display()
            ))),
        }
    }
}

pub struct UpdateWorkPlanTool;

#[async_trait]
impl Tool for UpdateWorkPlanTool {
    fn name(&self) -> &str {
        "update_work_plan"
    }

    fn description(&self) -> &str {
        "Replace the whole work plan. Status boxes: [✅] finished, [🟡] not started, \
         [🔄] in progress, [❌] failed."
    }

    fn input_schema(&self) -> Value {
        SchemaBuilder::object_schema(vec![(
            "plan",
            "string",
            "The complete updated markdown checklist",
            true,
        )])
    }

    async fn execute(&self, ctx: &ToolContext<'_>, input: Value) -> Result<ToolResult> {
        let plan = required_str(&input, "plan")?;
        let path = ctx.artifacts().update_work_plan(plan).await?;
        Ok(ToolResult::success(format!(
            "Work plan updated at '{}'",
            path.display()
        )))
    }
}

pub struct ReadWorkPlanTool;

#[async_trait]
impl Tool for ReadWorkPlanTool {
    fn name(&self) -> &str {
        "read_work_plan"
    }

    fn description(&self) -> &str {
        "Read the current work plan."
    }

    fn input_schema(&self) -> Value {
        SchemaBuilder::empty_object()
    }

    async fn execute(&self, ctx: &ToolContext<'_>, _input: Value) -> Result<ToolResult> {
        Ok(match ctx.artifacts().read_work_plan().await? {
            Some(plan) => ToolResult::success(plan),
            None => ToolResult::success("No work plan has been created yet."),
        })
    }
}

pub struct UpdateMemoryTool;

#[async_trait]
impl Tool for UpdateMemoryTool {
    fn name(&self) -> &str {
        "update_memory"
    }

    fn description(&self) -> &str {
        "Append a note to memory: facts learned, intermediate results, sources. \
         Earlier entries are kept."
    }

    fn input_schema(&self) -> Value {
        SchemaBuilder::object_schema(vec![("entry", "string", "The note to append", true)])
    }

    async fn execute(&self, ctx: &ToolContext<'_>, input: Value) -> Result<ToolResult> {
        let entry = required_str(&input, "entry")?;
        let path = ctx.artifacts().append_memory(entry).await?;
        Ok(ToolResult::success(format!(
            "Memory updated at '{}'",
            path.display()
        )))
    }
}

pub struct ReadMemoryTool;

#[async_trait]
impl Tool for ReadMemoryTool {
    fn name(&self) -> &str {
        "read_memory"
    }

    fn description(&self) -> &str {
        "Read every note stored in memory so far."
    }

    fn input_schema(&self) -> Value {
        SchemaBuilder::empty_object()
    }

    async fn execute(&self, ctx: &ToolContext<'_>, _input: Value) -> Result<ToolResult> {
        Ok(match ctx.artifacts().read_memory().await? {
            Some(memory) => ToolResult::success(memory),
            None => ToolResult::success("Memory is empty."),
        })
    }
}

pub struct ReflectTool;

#[async_trait]
impl Tool for ReflectTool {
    fn name(&self) -> &str {
        "reflect"
    }

    fn description(&self) -> &str {
        "Record a reflection on progress so far: what worked, what did not, \
         and what to do next."
    }

    fn input_schema(&self) -> Value {
        SchemaBuilder::object_schema(vec![(
            "reflection",
            "string",
            "The reflection to record",
            true,
        )])
    }

    async fn execute(&self, ctx: &ToolContext<'_>, input: Value) -> Result<ToolResult> {
        let reflection = required_str(&input, "reflection")?;
        let path = ctx.artifacts().append_reflection(reflection).await?;
        Ok(ToolResult::success(format!(
            "Reflection recorded at '{}'",
            path.display()
        )))
    }
}
