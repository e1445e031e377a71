//! Opening-message composition for an invocation

use std::fmt::Write as _;

use super::agent::Agent;
use crate::artifact::ArtifactKind;

/// System instruction used when the backend configuration has none
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are an autonomous AI agent.";

const WORK_PROTOCOL: &str = r#"<work-protocol>
- Start by calling create_work_plan with a checklist of every step the task needs. Create it only once.
- Work through the steps one at a time, in order.
- After each tool call, record what you did and what came back with update_memory. Plan changes go through update_work_plan, not memory.
- When a step finishes, call update_work_plan with its new status, then call reflect: what was done, what it produced, what comes next, and whether any step is still open.
- Do not give a final answer while any step is still open. Check read_work_plan when unsure.
</work-protocol>

<work-plan-format>
One step per line, each starting with a status box:
- [✅] finished
- [🟡] not started
- [🔄] in progress
- [❌] failed
</work-plan-format>"#;

const TRANSFER_PROTOCOL: &str = r#"<transfer-protocol>
- transfer_to_subagent hands the task to one sub-agent and waits for it. Use it when sub-agents depend on each other's results, one after the other.
- transfer_to_subagents hands the same task to several sub-agents at once and waits for all of them. Only sub-agents marked parallel can be used this way.
- Call reflect before transferring: how many sub-agents are needed, whether they can work independently, and whether the task text is complete.
- Introduce yourself in the task text: who you are, what your own task is, and what exactly you need from the sub-agent.
</transfer-protocol>"#;

/// Set when a parent hands a task to this agent
#[derive(Debug, Clone)]
pub struct DelegationHeader {
    /// Name of the delegating agent
    pub parent: String,
    /// The parent's description of this sub-agent's role
    pub description: String,
}

/// Build the opening user message of an invocation
pub(crate) fn compose(agent: &Agent, task: &str, delegation: Option<&DelegationHeader>) -> String {
    let mut prompt = String::new();
    let store = agent.artifacts();
    let result_path = store.path(ArtifactKind::Result);

    if let Some(header) = delegation {
        let _ = writeln!(
            prompt,
            "You are '{}', a sub-agent of '{}'. Your role: {}",
            agent.name(),
            header.parent,
            header.description.trim()
        );
        let _ = writeln!(
            prompt,
            "Your final answer is saved as your report in {}.\n",
            result_path.display()
        );
    }

    prompt.push_str(task.trim());
    prompt.push_str("\n\n");
    prompt.push_str(WORK_PROTOCOL);
    prompt.push_str("\n\n<storage>\n");
    for kind in [ArtifactKind::WorkPlan, ArtifactKind::Memory, ArtifactKind::Reflection] {
        let _ = writeln!(prompt, "{}: {}", kind, store.path(kind).display());
    }
    let _ = writeln!(prompt, "{}: {}", ArtifactKind::Result, result_path.display());
    prompt.push_str("</storage>");

    if !agent.sub_agents().is_empty() {
        prompt.push_str("\n\n<sub-agents>\n");
        for (name, sub_agent) in agent.sub_agents() {
            let mode = if sub_agent.supports_parallel_dispatch() {
                "parallel"
            } else {
                "sequential only"
            };
            let _ = writeln!(prompt, "- {} ({}): {}", name, mode, sub_agent.description());
        }
        prompt.push_str("</sub-agents>\n\n");
        prompt.push_str(TRANSFER_PROTOCOL);
    }

    let sources: Vec<_> = agent
        .tools()
        .iter()
        .filter_map(|d| d.source_text().map(|source| (d.name(), source)))
        .collect();
    if !sources.is_empty() {
        prompt.push_str("\n\n<capability-sources>\n");
        for (name, source) in sources {
            let _ = writeln!(prompt, "### {}\n```\n{}\n```", name, source.trim_end());
        }
        prompt.push_str("</capability-sources>");
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{AgentRegistry, SubAgentDescriptor};
    use crate::testing::{agent_builder, ScriptedBackend};
    use crate::tool::{CapabilityDescriptor, ToolResult};
    use tempfile::TempDir;

    #[test]
    fn test_plain_prompt_has_task_protocol_and_storage() {
        let dir = TempDir::new().unwrap();
        let registry = AgentRegistry::new();
        let agent = agent_builder("solo", dir.path(), ScriptedBackend::empty())
            .build(&registry)
            .unwrap();

        let prompt = compose(&agent, "  summarise the report  ", None);

        assert!(prompt.starts_with("summarise the report"));
        assert!(prompt.contains("<work-protocol>"));
        assert!(prompt.contains(&agent.output_location().join("memory.md").display().to_string()));
        assert!(!prompt.contains("<sub-agents>"));
        assert!(!prompt.contains("<capability-sources>"));
    }

    #[test]
    fn test_delegated_prompt_has_headnote_and_roster() {
        let dir = TempDir::new().unwrap();
        let registry = AgentRegistry::new();
        let helper = agent_builder("helper", dir.path(), ScriptedBackend::empty())
            .build(&registry)
            .unwrap();
        let agent = agent_builder("lead", dir.path(), ScriptedBackend::empty())
            .sub_agent(SubAgentDescriptor::parallel(helper, "Finds things"))
            .build(&registry)
            .unwrap();
        let header = DelegationHeader {
            parent: "boss".to_string(),
            description: "Coordinates research".to_string(),
        };

        let prompt = compose(&agent, "go", Some(&header));

        assert!(prompt.starts_with("You are 'lead', a sub-agent of 'boss'"));
        assert!(prompt.contains("Coordinates research"));
        assert!(prompt.contains(&agent.output_location().join("result.md").display().to_string()));
        assert!(prompt.contains("- helper (parallel): Finds things"));
        assert!(prompt.contains("<transfer-protocol>"));
    }

    #[test]
    fn test_source_text_is_included() {
        let dir = TempDir::new().unwrap();
        let registry = AgentRegistry::new();
        let capability = CapabilityDescriptor::builder("run_sql")
            .handler_fn(|_, _| Ok(ToolResult::success("")))
            .source_text("SELECT * FROM facts;")
            .build()
            .unwrap();
        let agent = agent_builder("coder", dir.path(), ScriptedBackend::empty())
            .capability(capability)
            .build(&registry)
            .unwrap();

        let prompt = compose(&agent, "query", None);

        assert!(prompt.contains("### run_sql"));
        assert!(prompt.contains("SELECT * FROM facts;"));
    }
}
