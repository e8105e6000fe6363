//! Tool definitions and the handler capability supplied by the host.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::arguments::ToolArguments;
use super::types::ToolParameters;
use crate::error::BatonError;
use crate::types::Message;

/// Context handed to a tool handler for one invocation.
///
/// `history` is a snapshot; handlers cannot reach the live session.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub session_id: String,
    pub current_agent_id: String,
    pub history: Arc<[Message]>,
}

/// Boxed future returned by a tool handler.
pub type ToolFuture = Pin<Box<dyn Future<Output = Result<serde_json::Value, BatonError>> + Send>>;

/// Type alias for the tool handler function.
pub type ToolHandler = Arc<dyn Fn(ToolArguments, ExecutionContext) -> ToolFuture + Send + Sync>;

/// What matching a tool by name should make the engine do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolKind {
    /// Host capability: run the handler, feed the result back.
    Function,
    /// Synthesized transfer tool: move the session to another agent.
    Handoff { target_agent_id: String },
    /// Synthesized worker tool: ask another agent in isolation, feed back its answer.
    Delegate { target_agent_id: String },
}

/// A named capability the model can invoke.
#[derive(Clone)]
pub struct ToolDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub parameters: ToolParameters,
    pub kind: ToolKind,
    pub enabled: bool,
    handler: ToolHandler,
}

impl ToolDefinition {
    /// Create a host tool from a closure.
    pub fn new<F, Fut>(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolArguments, ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value, BatonError>> + Send + 'static,
    {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            parameters,
            kind: ToolKind::Function,
            enabled: true,
            handler: Arc::new(move |args, ctx| Box::pin(handler(args, ctx))),
        }
    }

    /// Synthesized tool carrying a non-function kind. Its handler only
    /// returns a status marker; the engine branches on `kind` instead.
    pub(crate) fn synthesized(
        id: String,
        name: String,
        description: String,
        parameters: ToolParameters,
        kind: ToolKind,
    ) -> Self {
        let status = match kind {
            ToolKind::Handoff { .. } => "transferred",
            _ => "delegated",
        };
        Self {
            id,
            name,
            description,
            parameters,
            kind,
            enabled: true,
            handler: Arc::new(move |_, _| {
                Box::pin(async move { Ok(serde_json::json!({ "status": status })) })
            }),
        }
    }

    /// The agent this tool hands the conversation to, if it is a handoff tool.
    pub fn target_agent_id(&self) -> Option<&str> {
        match &self.kind {
            ToolKind::Handoff { target_agent_id } => Some(target_agent_id),
            _ => None,
        }
    }

    pub fn is_handoff(&self) -> bool {
        matches!(self.kind, ToolKind::Handoff { .. })
    }

    /// Invoke the handler.
    pub async fn execute(
        &self,
        args: ToolArguments,
        ctx: ExecutionContext,
    ) -> Result<serde_json::Value, BatonError> {
        (self.handler)(args, ctx).await
    }
}

impl std::fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("description", &self.description)
            .field("kind", &self.kind)
            .field("enabled", &self.enabled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> ExecutionContext {
        ExecutionContext {
            session_id: "s1".into(),
            current_agent_id: "a1".into(),
            history: Arc::from(vec![Message::user("hi")]),
        }
    }

    #[tokio::test]
    async fn closure_tool_receives_args_and_context() {
        let tool = ToolDefinition::new(
            "greet",
            "greet",
            "Greet a person",
            ToolParameters::object().string("name", "Name", true).build(),
            |args, ctx| async move {
                let name = args.get_str("name")?.to_string();
                Ok(serde_json::json!({
                    "greeting": format!("Hello, {name}!"),
                    "seen": ctx.history.len(),
                    "agent": ctx.current_agent_id,
                }))
            },
        );

        let result = tool
            .execute(ToolArguments::new(serde_json::json!({"name": "World"})), context())
            .await
            .unwrap();
        assert_eq!(result["greeting"], "Hello, World!");
        assert_eq!(result["seen"], 1);
        assert_eq!(result["agent"], "a1");
        assert_eq!(tool.target_agent_id(), None);
    }

    #[tokio::test]
    async fn synthesized_handoff_returns_marker() {
        let tool = ToolDefinition::synthesized(
            "transfer_to_b".into(),
            "transfer_to_B".into(),
            "Transfer".into(),
            ToolParameters::empty(),
            ToolKind::Handoff {
                target_agent_id: "b".into(),
            },
        );
        assert!(tool.is_handoff());
        assert_eq!(tool.target_agent_id(), Some("b"));
        let result = tool
            .execute(ToolArguments::new(serde_json::json!({})), context())
            .await
            .unwrap();
        assert_eq!(result["status"], "transferred");
    }
}
