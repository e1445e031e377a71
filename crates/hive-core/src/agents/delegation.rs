//! Task delegation to sub-agents
//!
//! Implements:
//! - DelegationDispatcher: one-to-one and one-to-many transfers
//! - The `transfer_to_subagent` / `transfer_to_subagents` tools that expose
//!   them to the model
//!
//! A one-to-many transfer validates every target before anything runs, then
//! fans out on a semaphore-bounded `JoinSet` and waits for all of them.

use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::agent::Agent;
use super::prompt::DelegationHeader;
use super::types::{SubAgentDescriptor, TransferOutcome};
use crate::artifact::ArtifactKind;
use crate::config::{BatchFailurePolicy, RuntimeConfig};
use crate::tool::traits::required_str;
use crate::tool::{CapabilityDescriptor, SchemaBuilder, Tool, ToolContext, ToolResult};
use crate::{Error, Result};

/// Configuration for one-to-many transfers
#[derive(Debug, Clone, Default)]
pub struct DelegationConfig {
    /// Cap on concurrent targets, on top of the host's available parallelism
    pub max_parallelism: Option<usize>,
    /// What a failing target means for targets that have not started yet
    pub failure_policy: BatchFailurePolicy,
}

impl DelegationConfig {
    pub fn from_runtime(runtime: &RuntimeConfig) -> Self {
        Self {
            max_parallelism: runtime.max_parallelism,
            failure_policy: runtime.batch_failure_policy,
        }
    }

    /// Workers for a batch of `targets`
    ///
    /// `min(targets, available_parallelism)`, further capped by
    /// `max_parallelism`, and never below one.
    pub fn pool_size(&self, targets: usize) -> usize {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let mut size = targets.min(available);
        if let Some(cap) = self.max_parallelism {
            size = size.min(cap);
        }
        size.max(1)
    }
}

/// Transfers from one parent agent to its sub-agents
pub struct DelegationDispatcher<'a> {
    parent: &'a Agent,
    config: DelegationConfig,
}

impl<'a> DelegationDispatcher<'a> {
    pub fn new(parent: &'a Agent, config: DelegationConfig) -> Self {
        Self { parent, config }
    }

    pub fn config(&self) -> &DelegationConfig {
        &self.config
    }

    /// Resolve a target among the parent's sub-agents
    fn resolve(&self, name: &str) -> Result<&'a SubAgentDescriptor> {
        self.parent
            .sub_agents()
            .get(name)
            .ok_or_else(|| Error::UnknownSubAgent {
                parent: self.parent.name().to_string(),
                name: name.to_string(),
            })
    }

    fn header_for(&self, descriptor: &SubAgentDescriptor) -> DelegationHeader {
        DelegationHeader {
            parent: self.parent.name().to_string(),
            description: descriptor.description().to_string(),
        }
    }

    /// Hand `task` to one sub-agent and wait for its terminal state
    ///
    /// A failing target produces a `Failed` outcome, not an error.
    ///
    /// # Errors
    /// `UnknownSubAgent` if `target` is not one of the parent's sub-agents
    pub async fn transfer_to_subagent(&self, target: &str, task: &str) -> Result<TransferOutcome> {
        let descriptor = self.resolve(target)?;
        let header = self.header_for(descriptor);

        info!(parent = %self.parent.name(), sub_agent = %target, "Transferring task to sub-agent");

        let outcome = run_target(descriptor.agent(), task, &header).await;
        if !outcome.is_success() {
            warn!(sub_agent = %target, error = ?outcome.error, "Sub-agent failed");
        }
        Ok(outcome)
    }

    /// Hand `task` to several sub-agents concurrently and wait for all
    ///
    /// The returned map has exactly one entry per distinct requested name.
    ///
    /// # Errors
    /// `UnknownSubAgent` or `Capability` (target not parallel-capable),
    /// raised before any target is started.
    pub async fn transfer_to_subagents<S: AsRef<str>>(
        &self,
        targets: &[S],
        task: &str,
    ) -> Result<HashMap<String, TransferOutcome>> {
        let mut seen = HashSet::new();
        let mut resolved = Vec::new();
        for target in targets {
            let name = target.as_ref();
            if !seen.insert(name) {
                continue;
            }
            let descriptor = self.resolve(name)?;
            if !descriptor.supports_parallel_dispatch() {
                return Err(Error::Capability(format!(
                    "Sub-agent '{}' does not support parallel dispatch; use transfer_to_subagent",
                    name
                )));
            }
            resolved.push(descriptor);
        }

        if resolved.is_empty() {
            return Ok(HashMap::new());
        }

        let pool_size = self.config.pool_size(resolved.len());
        let policy = self.config.failure_policy;
        let semaphore = Arc::new(Semaphore::new(pool_size));
        let aborted = Arc::new(AtomicBool::new(false));
        let task: Arc<str> = Arc::from(task);
        let start_time = Instant::now();

        info!(
            parent = %self.parent.name(),
            targets = resolved.len(),
            pool_size,
            policy = ?policy,
            "Transferring task to sub-agents in parallel"
        );

        let mut join_set = JoinSet::new();
        for descriptor in &resolved {
            let agent = Arc::clone(descriptor.agent());
            let header = self.header_for(descriptor);
            let semaphore = Arc::clone(&semaphore);
            let aborted = Arc::clone(&aborted);
            let task = Arc::clone(&task);

            join_set.spawn(async move {
                let name = agent.name().to_string();
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (name.clone(), TransferOutcome::failed(name, "worker pool closed"));
                };
                if aborted.load(Ordering::SeqCst) {
                    debug!(sub_agent = %name, "Skipping sub-agent after batch abort");
                    return (
                        name.clone(),
                        TransferOutcome::skipped(name, "Batch aborted after another target failed"),
                    );
                }

                let outcome = run_target(&agent, &task, &header).await;

                if !outcome.is_success() {
                    warn!(sub_agent = %name, error = ?outcome.error, "Sub-agent failed");
                    if policy == BatchFailurePolicy::Abort {
                        aborted.store(true, Ordering::SeqCst);
                    }
                }
                (name, outcome)
            });
        }

        let mut results = HashMap::with_capacity(resolved.len());
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((name, outcome)) => {
                    results.insert(name, outcome);
                }
                Err(e) => warn!("Transfer worker terminated abnormally: {}", e),
            }
        }

        // Barrier reached: every target gets an entry
        for descriptor in &resolved {
            results
                .entry(descriptor.name().to_string())
                .or_insert_with(|| {
                    TransferOutcome::failed(
                        descriptor.name(),
                        "Worker terminated before reporting a result",
                    )
                });
        }

        debug!(
            "Parallel transfer completed in {:?}",
            start_time.elapsed()
        );

        Ok(results)
    }
}

/// Invoke one target, turning its errors and panics into a `Failed` outcome
///
/// A failed outcome carries the target's memory log when one was written.
async fn run_target(agent: &Agent, task: &str, header: &DelegationHeader) -> TransferOutcome {
    let outcome = match AssertUnwindSafe(agent.invoke_delegated(task, header))
        .catch_unwind()
        .await
    {
        Ok(Ok(outcome)) => return TransferOutcome::completed(outcome),
        Ok(Err(e)) => TransferOutcome::failed(agent.name(), e.to_string()),
        Err(panic) => TransferOutcome::failed(
            agent.name(),
            format!("Sub-agent panicked: {}", panic_message(panic.as_ref())),
        ),
    };

    match agent.artifacts().exists(ArtifactKind::Memory).await {
        Ok(true) => outcome.with_memory_path(agent.artifacts().path(ArtifactKind::Memory)),
        Ok(false) => outcome,
        Err(e) => {
            debug!(sub_agent = %agent.name(), error = %e, "Memory log of failed sub-agent not checked");
            outcome
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Descriptors of the two transfer tools
pub fn delegation_capabilities() -> Vec<CapabilityDescriptor> {
    vec![
        CapabilityDescriptor::from_tool(Arc::new(TransferToSubAgentTool)),
        CapabilityDescriptor::from_tool(Arc::new(TransferToSubAgentsTool)),
    ]
}

/// One-to-one transfer as a tool
pub struct TransferToSubAgentTool;

#[async_trait]
impl Tool for TransferToSubAgentTool {
    fn name(&self) -> &str {
        "transfer_to_subagent"
    }

    fn description(&self) -> &str {
        "Transfer a task to one sub-agent and wait for its report."
    }

    fn input_schema(&self) -> Value {
        SchemaBuilder::object_schema(vec![
            ("to_subagent", "string", "Name of the sub-agent", true),
            ("task", "string", "Complete description of the task", true),
        ])
    }

    async fn execute(&self, ctx: &ToolContext<'_>, input: Value) -> Result<ToolResult> {
        let target = required_str(&input, "to_subagent")?;
        let task = required_str(&input, "task")?;

        let outcome = match ctx.agent().transfer_to_subagent(target, task).await {
            Ok(outcome) => outcome,
            Err(e) => return Ok(ToolResult::error(format!("{}. Please choose another sub-agent.", e))),
        };

        Ok(match (&outcome.result_path, &outcome.error) {
            (Some(path), _) => ToolResult::success(format!(
                "Sub-agent '{}' finished the task. Report (saved in {}):\n{}",
                target,
                path.display(),
                outcome.output
            )),
            (None, error) => {
                let mut message = format!(
                    "Sub-agent '{}' failed: {}",
                    target,
                    error.as_deref().unwrap_or("unknown error")
                );
                if let Some(memory) = &outcome.memory_path {
                    message.push_str(&format!(
                        ". No result was produced; its partial work is recorded in {}",
                        memory.display()
                    ));
                }
                ToolResult::error(message)
            }
        })
    }
}

/// One-to-many transfer as a tool
pub struct TransferToSubAgentsTool;

#[async_trait]
impl Tool for TransferToSubAgentsTool {
    fn name(&self) -> &str {
        "transfer_to_subagents"
    }

    fn description(&self) -> &str {
        "Transfer the same task to several sub-agents running in parallel and wait for all \
         of them. Returns a JSON object mapping each sub-agent name to its outcome. A failed \
         sub-agent's outcome carries memory_path when its partial work was recorded."
    }

    fn input_schema(&self) -> Value {
        let mut schema = SchemaBuilder::object_schema(vec![
            ("to_subagents", "array", "", true),
            ("task", "string", "Complete description of the task", true),
        ]);
        schema["properties"]["to_subagents"] =
            SchemaBuilder::string_array("Names of parallel-capable sub-agents");
        schema
    }

    async fn execute(&self, ctx: &ToolContext<'_>, input: Value) -> Result<ToolResult> {
        let targets: Vec<String> = match input.get("to_subagents") {
            Some(value) => serde_json::from_value(value.clone())?,
            None => {
                return Err(Error::ToolExecution(
                    "Missing 'to_subagents' parameter".to_string(),
                ));
            }
        };
        let task = required_str(&input, "task")?;

        let outcomes = match ctx.agent().transfer_to_subagents(&targets, task).await {
            Ok(outcomes) => outcomes,
            Err(e) => return Ok(ToolResult::error(format!("{}. Please choose other sub-agents.", e))),
        };

        let ordered: BTreeMap<_, _> = outcomes.into_iter().collect();
        Ok(ToolResult::success(serde_json::to_string_pretty(&ordered)?))
    }
}
