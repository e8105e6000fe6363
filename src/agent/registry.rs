//! Registry of agents and tools.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::definition::AgentDefinition;
use crate::error::{BatonError, Result};
use crate::tools::{ToolDefinition, ToolKind, ToolParameters};

/// Holds agent and tool definitions and resolves the tool set of an agent.
///
/// Handoff and delegate references are not checked on registration since
/// agents may arrive in any order; [`Registry::tools_for`] skips targets
/// that are not registered (yet).
#[derive(Debug, Default)]
pub struct Registry {
    agents: RwLock<HashMap<String, AgentDefinition>>,
    tools: RwLock<HashMap<String, ToolDefinition>>,
    default_agent: RwLock<Option<String>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an agent by id. The first agent registered
    /// becomes the default.
    pub fn register_agent(&self, agent: AgentDefinition) {
        tracing::debug!(agent_id = %agent.id, "registering agent");
        write(&self.default_agent).get_or_insert_with(|| agent.id.clone());
        write(&self.agents).insert(agent.id.clone(), agent);
    }

    /// Remove an agent. If it was the default, the lowest remaining id takes
    /// its place. Sessions already held by it fail on their next step.
    pub fn remove_agent(&self, agent_id: &str) -> bool {
        let mut agents = write(&self.agents);
        let existed = agents.remove(agent_id).is_some();
        let mut default_agent = write(&self.default_agent);
        if default_agent.as_deref() == Some(agent_id) {
            *default_agent = agents.keys().min().cloned();
        }
        existed
    }

    pub fn set_default_agent(&self, agent_id: &str) -> Result<()> {
        if !self.has_agent(agent_id) {
            return Err(BatonError::AgentNotFound(agent_id.to_string()));
        }
        *write(&self.default_agent) = Some(agent_id.to_string());
        Ok(())
    }

    pub fn default_agent_id(&self) -> Option<String> {
        read(&self.default_agent).clone()
    }

    /// Insert or overwrite a tool by id.
    pub fn register_tool(&self, tool: ToolDefinition) {
        tracing::debug!(tool_id = %tool.id, tool = %tool.name, "registering tool");
        write(&self.tools).insert(tool.id.clone(), tool);
    }

    pub fn remove_tool(&self, tool_id: &str) -> bool {
        write(&self.tools).remove(tool_id).is_some()
    }

    /// Enable or disable a registered tool. Returns `false` for unknown ids.
    pub fn set_tool_enabled(&self, tool_id: &str, enabled: bool) -> bool {
        match write(&self.tools).get_mut(tool_id) {
            Some(tool) => {
                tool.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn agent(&self, agent_id: &str) -> Option<AgentDefinition> {
        read(&self.agents).get(agent_id).cloned()
    }

    pub fn has_agent(&self, agent_id: &str) -> bool {
        read(&self.agents).contains_key(agent_id)
    }

    pub fn tool(&self, tool_id: &str) -> Option<ToolDefinition> {
        read(&self.tools).get(tool_id).cloned()
    }

    /// Look up a registered tool by its model-facing name.
    pub fn find_tool_by_name(&self, name: &str) -> Option<ToolDefinition> {
        read(&self.tools).values().find(|t| t.name == name).cloned()
    }

    /// Registered agent ids, sorted.
    pub fn agent_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = read(&self.agents).keys().cloned().collect();
        ids.sort();
        ids
    }

    /// The full tool set of an agent: assigned tools in declaration order,
    /// then one transfer tool per registered handoff target, then one call
    /// tool per registered delegate. Synthesized tools are rebuilt on every
    /// call so they always reflect the current target definitions.
    pub fn tools_for(&self, agent_id: &str) -> Vec<ToolDefinition> {
        let agents = read(&self.agents);
        let Some(agent) = agents.get(agent_id) else {
            return Vec::new();
        };

        let mut result = Vec::new();
        {
            let tools = read(&self.tools);
            for tool_id in &agent.tools {
                match tools.get(tool_id) {
                    Some(tool) if tool.enabled => result.push(tool.clone()),
                    Some(_) => {}
                    None => tracing::debug!(agent_id, tool_id = %tool_id, "skipping unknown tool"),
                }
            }
        }

        for target_id in &agent.handoffs {
            match agents.get(target_id) {
                Some(target) => result.push(handoff_tool(target)),
                None => tracing::debug!(agent_id, target_id = %target_id, "skipping unknown handoff target"),
            }
        }

        for target_id in &agent.delegates {
            match agents.get(target_id) {
                Some(target) => result.push(delegate_tool(target)),
                None => tracing::debug!(agent_id, target_id = %target_id, "skipping unknown delegate"),
            }
        }

        result
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Collapse each run of whitespace into a single underscore.
fn tool_safe_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_space = false;
    for ch in name.chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push('_');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}

fn handoff_tool(target: &AgentDefinition) -> ToolDefinition {
    ToolDefinition::synthesized(
        format!("transfer_to_{}", target.id),
        format!("transfer_to_{}", tool_safe_name(&target.name)),
        format!(
            "Transfer the conversation to {}. Role: {}",
            target.name, target.description
        ),
        ToolParameters::object()
            .string(
                "reason",
                "The specific reason for transferring context to this agent.",
                true,
            )
            .build(),
        ToolKind::Handoff {
            target_agent_id: target.id.clone(),
        },
    )
}

fn delegate_tool(target: &AgentDefinition) -> ToolDefinition {
    ToolDefinition::synthesized(
        format!("call_{}", target.id),
        format!("call_{}", tool_safe_name(&target.name)),
        format!(
            "Delegate a task to {}. Description: {}",
            target.name, target.description
        ),
        ToolParameters::object()
            .string("message", "The message/task to send to the agent", true)
            .build(),
        ToolKind::Delegate {
            target_agent_id: target.id.clone(),
        },
    )
}
