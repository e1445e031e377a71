//! Agent and its execution loop

use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::delegation::{self, DelegationConfig, DelegationDispatcher};
use super::prompt::{self, DelegationHeader, DEFAULT_SYSTEM_INSTRUCTION};
use super::registry::AgentRegistry;
use super::types::{
    AgentId, AgentOutcome, AgentState, SubAgentDescriptor, ToolCallRecord, TransferOutcome,
};
use crate::artifact::ArtifactStore;
use crate::config::{BackendConfig, BatchFailurePolicy, Config, HostedConfig, LocalConfig, RuntimeConfig};
use crate::llm::{Backend, Message, ModelRequest, ModelTurn};
use crate::tool::builtin::artifact_capabilities;
use crate::tool::{CapabilityDescriptor, Tool, ToolContext, ToolResult, ToolSet};
use crate::{Error, Result};

/// An agent: a model/tool loop with its own artifacts and sub-agents
///
/// Agents are created through [`AgentBuilder`], which registers them. An
/// agent stays usable after unregistration, but its name may then be taken
/// by another agent.
pub struct Agent {
    id: AgentId,
    name: String,
    description: Option<String>,
    system_instruction: Option<String>,
    backend_config: BackendConfig,
    backend: Arc<dyn Backend>,
    tools: ToolSet,
    sub_agents: BTreeMap<String, SubAgentDescriptor>,
    output_root: PathBuf,
    output_location: PathBuf,
    artifacts: ArtifactStore,
    max_steps: usize,
    attach_interaction_records: bool,
    delegation: DelegationConfig,
    state: parking_lot::Mutex<AgentState>,
    /// Serialises invocations of this agent
    invocation_lock: tokio::sync::Mutex<()>,
}

impl Agent {
    /// Start building an agent named `name`
    pub fn builder(name: impl Into<String>) -> AgentBuilder {
        AgentBuilder::new(name)
    }

    pub fn id(&self) -> &AgentId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn backend_config(&self) -> &BackendConfig {
        &self.backend_config
    }

    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    /// Sub-agents by name
    pub fn sub_agents(&self) -> &BTreeMap<String, SubAgentDescriptor> {
        &self.sub_agents
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// `<output_root>/<name>-<id>/`
    pub fn output_location(&self) -> &Path {
        &self.output_location
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub fn state(&self) -> AgentState {
        *self.state.lock()
    }

    /// Delegation entry point bound to this agent's sub-agents
    pub fn dispatcher(&self) -> DelegationDispatcher<'_> {
        DelegationDispatcher::new(self, self.delegation.clone())
    }

    /// Hand `task` to one sub-agent and wait for it
    pub async fn transfer_to_subagent(&self, target: &str, task: &str) -> Result<TransferOutcome> {
        self.dispatcher().transfer_to_subagent(target, task).await
    }

    /// Hand `task` to several parallel-capable sub-agents at once
    pub async fn transfer_to_subagents<S: AsRef<str>>(
        &self,
        targets: &[S],
        task: &str,
    ) -> Result<std::collections::HashMap<String, TransferOutcome>> {
        self.dispatcher().transfer_to_subagents(targets, task).await
    }

    /// Run the loop on `task` until a final answer
    pub async fn invoke(&self, task: &str) -> Result<AgentOutcome> {
        self.run(task, Vec::new(), None).await
    }

    /// Like [`invoke`](Self::invoke), continuing an earlier conversation
    pub async fn invoke_with_history(
        &self,
        task: &str,
        history: Vec<Message>,
    ) -> Result<AgentOutcome> {
        self.run(task, history, None).await
    }

    /// Invocation on behalf of a parent agent
    pub(crate) async fn invoke_delegated(
        &self,
        task: &str,
        header: &DelegationHeader,
    ) -> Result<AgentOutcome> {
        self.run(task, Vec::new(), Some(header)).await
    }

    async fn run(
        &self,
        task: &str,
        history: Vec<Message>,
        delegation: Option<&DelegationHeader>,
    ) -> Result<AgentOutcome> {
        let _invocation = self.invocation_lock.lock().await;
        self.set_state(AgentState::Running);
        let mut unfinished = UnfinishedInvocation::new(self);

        info!(
            agent = %self.name,
            agent_id = %self.id,
            delegated = delegation.is_some(),
            "Agent invocation started"
        );

        let result = self.execute_loop(task, history, delegation).await;

        match &result {
            Ok(outcome) => {
                self.set_state(AgentState::Completed);
                info!(
                    agent = %self.name,
                    steps = outcome.steps,
                    tool_calls = outcome.tool_calls.len(),
                    "Agent invocation completed"
                );
            }
            Err(e) => {
                self.set_state(AgentState::Failed);
                warn!(agent = %self.name, error = %e, "Agent invocation failed");
            }
        }
        unfinished.disarm();

        result
    }

    async fn execute_loop(
        &self,
        task: &str,
        history: Vec<Message>,
        delegation: Option<&DelegationHeader>,
    ) -> Result<AgentOutcome> {
        let started_at = Utc::now();
        let system = Some(
            self.system_instruction
                .as_deref()
                .or(self.backend_config.system_instruction())
                .unwrap_or(DEFAULT_SYSTEM_INSTRUCTION)
                .to_string(),
        );
        let definitions = self.tools.definitions();
        let ctx = ToolContext::new(self);

        let mut messages = history;
        messages.push(Message::user(prompt::compose(self, task, delegation)));
        let mut tool_calls = Vec::new();

        for step in 1..=self.max_steps {
            let request = ModelRequest {
                agent: self.name.clone(),
                config: self.backend_config.clone(),
                system: system.clone(),
                messages: messages.clone(),
                tools: definitions.clone(),
            };

            debug!(agent = %self.name, step, messages = messages.len(), "Calling backend");

            let turn = self.backend.complete(request).await.map_err(|e| match e {
                Error::Backend(_) => e,
                other => Error::Backend(other.to_string()),
            })?;

            let call = match turn {
                ModelTurn::Final(text) => {
                    let result_path = self.artifacts.write_result(&text).await?;
                    messages.push(Message::assistant(text.clone()));
                    return Ok(AgentOutcome {
                        agent_id: self.id.clone(),
                        agent_name: self.name.clone(),
                        output: text,
                        steps: step,
                        started_at,
                        finished_at: Utc::now(),
                        tool_calls,
                        result_path,
                        history: messages,
                    });
                }
                ModelTurn::ToolCall(call) => call,
            };

            let descriptor = self.tools.get(&call.name).ok_or_else(|| Error::UnknownCapability {
                agent: self.name.clone(),
                name: call.name.clone(),
            })?;

            debug!(agent = %self.name, tool = %call.name, input = %call.input, "Executing tool");

            let result = match descriptor.invoke(&ctx, call.input.clone()).await {
                Ok(result) => result,
                Err(e) if e.is_fatal_for_loop() => return Err(e),
                Err(e) => {
                    debug!(agent = %self.name, tool = %call.name, error = %e, "Tool failed");
                    ToolResult::error(e.to_string())
                }
            };

            let content = if self.attach_interaction_records {
                format!("{}{}", result.output, self.interaction_records().await?)
            } else {
                result.output.clone()
            };

            messages.push(Message::tool_use(&call.id, &call.name, call.input.clone()));
            messages.push(Message::tool_result(&call.id, content, result.is_error));
            tool_calls.push(ToolCallRecord {
                id: call.id,
                name: call.name,
                input: call.input,
                output: result.output,
                is_error: result.is_error,
                at: Utc::now(),
            });
        }

        Err(Error::StepLimitExceeded {
            agent: self.name.clone(),
            limit: self.max_steps,
        })
    }

    /// Snapshot of work plan and memory appended to tool results
    async fn interaction_records(&self) -> Result<String> {
        let mut records = String::new();
        if let Some(plan) = self.artifacts.read_work_plan().await? {
            let _ = write!(records, "\n\n## Work-plan\n{}", plan.trim_end());
        }
        if let Some(memory) = self.artifacts.read_memory().await? {
            let _ = write!(records, "\n\n## Memory\n{}", memory.trim_end());
        }
        Ok(records)
    }

    fn set_state(&self, state: AgentState) {
        *self.state.lock() = state;
    }
}

/// Marks the agent `Failed` if an invocation unwinds or its future is
/// dropped before reaching a final state
struct UnfinishedInvocation<'a> {
    agent: &'a Agent,
    armed: bool,
}

impl<'a> UnfinishedInvocation<'a> {
    fn new(agent: &'a Agent) -> Self {
        Self { agent, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for UnfinishedInvocation<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.agent.set_state(AgentState::Failed);
            warn!(agent = %self.agent.name, "Agent invocation abandoned before finishing");
        }
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("backend", &self.backend_config.mode())
            .field("tools", &self.tools.names())
            .field("sub_agents", &self.sub_agents.keys().collect::<Vec<_>>())
            .field("state", &self.state())
            .finish()
    }
}

/// Builder for [`Agent`]
///
/// Exactly one of [`hosted`](Self::hosted) and [`local`](Self::local) must
/// be set; [`backend_config`](Self::backend_config) replaces whichever is
/// set.
pub struct AgentBuilder {
    name: String,
    description: Option<String>,
    system_instruction: Option<String>,
    output_root: Option<PathBuf>,
    hosted: Option<HostedConfig>,
    local: Option<LocalConfig>,
    backend: Option<Arc<dyn Backend>>,
    capabilities: Vec<CapabilityDescriptor>,
    sub_agents: Vec<SubAgentDescriptor>,
    runtime: RuntimeConfig,
}

impl AgentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            system_instruction: None,
            output_root: None,
            hosted: None,
            local: None,
            backend: None,
            capabilities: Vec::new(),
            sub_agents: Vec::new(),
            runtime: RuntimeConfig::default(),
        }
    }

    /// Take runtime settings and backend configuration from `config`
    pub fn config(self, config: &Config) -> Self {
        self.runtime(config.runtime.clone())
            .backend_config(config.backend.clone())
    }

    pub fn runtime(mut self, runtime: RuntimeConfig) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Overrides the backend configuration's system instruction
    pub fn system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = Some(root.into());
        self
    }

    pub fn hosted(mut self, hosted: HostedConfig) -> Self {
        self.hosted = Some(hosted);
        self
    }

    pub fn local(mut self, local: LocalConfig) -> Self {
        self.local = Some(local);
        self
    }

    pub fn backend_config(mut self, config: BackendConfig) -> Self {
        match config {
            BackendConfig::Hosted(hosted) => {
                self.hosted = Some(hosted);
                self.local = None;
            }
            BackendConfig::Local(local) => {
                self.local = Some(local);
                self.hosted = None;
            }
        }
        self
    }

    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn capability(mut self, descriptor: CapabilityDescriptor) -> Self {
        self.capabilities.push(descriptor);
        self
    }

    /// Add a tool described by its own name, description and schema
    pub fn tool(self, tool: Arc<dyn Tool>) -> Self {
        self.capability(CapabilityDescriptor::from_tool(tool))
    }

    pub fn sub_agent(mut self, descriptor: SubAgentDescriptor) -> Self {
        self.sub_agents.push(descriptor);
        self
    }

    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.runtime.max_steps = max_steps;
        self
    }

    pub fn max_parallelism(mut self, max_parallelism: usize) -> Self {
        self.runtime.max_parallelism = Some(max_parallelism);
        self
    }

    pub fn batch_failure_policy(mut self, policy: BatchFailurePolicy) -> Self {
        self.runtime.batch_failure_policy = policy;
        self
    }

    pub fn attach_interaction_records(mut self, attach: bool) -> Self {
        self.runtime.attach_interaction_records = attach;
        self
    }

    /// Validate and register the agent
    ///
    /// # Errors
    /// `Configuration` for invalid settings, `DuplicateCapability` for
    /// clashing capability names and `DuplicateName` if the registry
    /// already holds an agent with this name.
    pub fn build(self, registry: &AgentRegistry) -> Result<Arc<Agent>> {
        if self.name.trim().is_empty() {
            return Err(Error::Configuration("Agent name must not be empty".to_string()));
        }
        let output_root = self
            .output_root
            .unwrap_or_else(|| self.runtime.output_root.clone());
        if output_root.as_os_str().is_empty() {
            return Err(Error::Configuration(format!(
                "Agent '{}' needs a non-empty output root",
                self.name
            )));
        }
        self.runtime.validate()?;

        let backend_config = BackendConfig::from_parts(self.hosted, self.local)?;
        let backend = self.backend.ok_or_else(|| {
            Error::Configuration(format!("Agent '{}' has no backend", self.name))
        })?;

        let mut sub_agents = BTreeMap::new();
        for descriptor in self.sub_agents {
            if descriptor.name() == self.name {
                return Err(Error::Configuration(format!(
                    "Sub-agent name '{}' must differ from its parent's",
                    descriptor.name()
                )));
            }
            let name = descriptor.name().to_string();
            if sub_agents.insert(name.clone(), descriptor).is_some() {
                return Err(Error::Configuration(format!(
                    "Agent '{}' has two sub-agents named '{}'",
                    self.name, name
                )));
            }
        }

        let mut tools = ToolSet::new();
        tools.extend(artifact_capabilities())?;
        if !sub_agents.is_empty() {
            tools.extend(delegation::delegation_capabilities())?;
        }
        tools.extend(self.capabilities)?;

        let delegation = DelegationConfig::from_runtime(&self.runtime);
        let max_steps = self.runtime.max_steps;
        let attach_interaction_records = self.runtime.attach_interaction_records;
        let name = self.name;
        let description = self.description;
        let system_instruction = self.system_instruction;
        let key = name.clone();

        registry.register_with(&key, move |id| {
            let output_location = output_root.join(format!("{}-{}", name, id));
            Arc::new(Agent {
                artifacts: ArtifactStore::new(&output_location),
                output_location,
                output_root,
                id,
                name,
                description,
                system_instruction,
                backend_config,
                backend,
                tools,
                sub_agents,
                max_steps,
                attach_interaction_records,
                delegation,
                state: parking_lot::Mutex::new(AgentState::Idle),
                invocation_lock: tokio::sync::Mutex::new(()),
            })
        })
    }
}
