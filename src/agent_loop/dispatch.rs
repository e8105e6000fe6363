//! Resolution of a parsed tool name to the branch the loop should take.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;

use crate::error::BatonError;
use crate::tools::{validate_arguments, ExecutionContext, ToolArguments, ToolDefinition, ToolKind};

/// The branch selected for a tool call.
#[derive(Debug, Clone, Copy)]
pub enum ResolvedTool<'a> {
    Function(&'a ToolDefinition),
    Handoff { target_agent_id: &'a str },
    Delegate {
        tool: &'a ToolDefinition,
        target_agent_id: &'a str,
    },
}

/// Name-keyed view over one agent's tool set for the current step.
#[derive(Debug)]
pub struct ToolTable<'a> {
    by_name: HashMap<&'a str, &'a ToolDefinition>,
}

impl<'a> ToolTable<'a> {
    /// Earlier tools win when two share a name.
    pub fn new(tools: &'a [ToolDefinition]) -> Self {
        let mut by_name = HashMap::with_capacity(tools.len());
        for tool in tools {
            by_name.entry(tool.name.as_str()).or_insert(tool);
        }
        Self { by_name }
    }

    pub fn resolve(&self, name: &str) -> Option<ResolvedTool<'a>> {
        let tool = *self.by_name.get(name)?;
        Some(match &tool.kind {
            ToolKind::Function => ResolvedTool::Function(tool),
            ToolKind::Handoff { target_agent_id } => ResolvedTool::Handoff { target_agent_id },
            ToolKind::Delegate { target_agent_id } => ResolvedTool::Delegate {
                tool,
                target_agent_id,
            },
        })
    }
}

/// Check `args` against the tool's parameter schema.
pub(crate) fn check_arguments(
    tool: &ToolDefinition,
    args: &serde_json::Value,
) -> Result<(), BatonError> {
    validate_arguments(args, &tool.parameters.schema).map_err(BatonError::InvalidArgument)
}

/// Validate `args`, then run the tool's handler raced against `cancel`.
pub(crate) async fn invoke(
    tool: &ToolDefinition,
    args: serde_json::Value,
    ctx: ExecutionContext,
    cancel: &CancellationToken,
) -> Result<serde_json::Value, BatonError> {
    check_arguments(tool, &args)?;
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(BatonError::Cancelled),
        result = tool.execute(ToolArguments::new(args), ctx) => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentDefinition, Registry};
    use crate::tools::ToolParameters;

    #[test]
    fn resolves_each_kind() {
        let registry = Registry::new();
        registry.register_tool(ToolDefinition::new(
            "lookup",
            "lookup",
            "Look something up",
            ToolParameters::empty(),
            |_, _| async { Ok(serde_json::Value::Null) },
        ));
        registry.register_agent(
            AgentDefinition::builder()
                .id("a")
                .name("A")
                .system_prompt("a")
                .tools(vec!["lookup".into()])
                .handoffs(vec!["b".into()])
                .delegates(vec!["b".into()])
                .build(),
        );
        registry.register_agent(
            AgentDefinition::builder()
                .id("b")
                .name("B")
                .system_prompt("b")
                .build(),
        );

        let tools = registry.tools_for("a");
        let table = ToolTable::new(&tools);
        assert!(matches!(table.resolve("lookup"), Some(ResolvedTool::Function(t)) if t.id == "lookup"));
        assert!(matches!(
            table.resolve("transfer_to_B"),
            Some(ResolvedTool::Handoff { target_agent_id: "b" })
        ));
        assert!(matches!(
            table.resolve("call_B"),
            Some(ResolvedTool::Delegate { target_agent_id: "b", .. })
        ));
        assert!(table.resolve("missing").is_none());
    }

    #[test]
    fn delegate_schema_requires_message() {
        let registry = Registry::new();
        registry.register_agent(
            AgentDefinition::builder()
                .id("a")
                .name("A")
                .system_prompt("a")
                .delegates(vec!["b".into()])
                .build(),
        );
        registry.register_agent(
            AgentDefinition::builder()
                .id("b")
                .name("B")
                .system_prompt("b")
                .build(),
        );

        let tools = registry.tools_for("a");
        let table = ToolTable::new(&tools);
        let Some(ResolvedTool::Delegate { tool, .. }) = table.resolve("call_B") else {
            panic!("call_B should resolve to a delegate tool");
        };
        assert!(matches!(
            check_arguments(tool, &serde_json::json!({})),
            Err(BatonError::InvalidArgument(_))
        ));
        assert!(check_arguments(tool, &serde_json::json!({"message": "sum March"})).is_ok());
    }
}
