//! Conversation message types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Conversation role.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    /// Tool output. The chat endpoint has no tool role for text-driven
    /// calls, so these go over the wire as user turns.
    Tool,
}

impl Role {
    /// Role string sent to the chat completions endpoint.
    pub fn wire_role(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User | Role::Tool => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single entry in a session's append-only log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_error: bool,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            name: None,
            agent_id: None,
            timestamp: Utc::now(),
            is_error: false,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Successful tool output, rendered as text for the model.
    pub fn tool_result(tool_name: &str, result: &serde_json::Value) -> Self {
        let rendered = match result {
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        Self::new(Role::Tool, format!("Tool '{tool_name}' output:\n{rendered}"))
            .with_name(tool_name)
    }

    /// Failed tool execution, flagged so hosts can render it differently.
    pub fn tool_error(tool_name: &str, error: impl std::fmt::Display) -> Self {
        let mut message = Self::new(Role::Tool, format!("Tool '{tool_name}' failed: {error}"))
            .with_name(tool_name);
        message.is_error = true;
        message
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn tool_role_goes_over_the_wire_as_user() {
        assert_eq!(Role::Tool.wire_role(), "user");
        assert_eq!(Role::System.wire_role(), "system");
        assert_eq!(Role::Assistant.wire_role(), "assistant");
    }

    #[test]
    fn role_round_trips_through_strings() {
        assert_eq!(Role::Assistant.to_string(), "assistant");
        assert_eq!(Role::from_str("tool").unwrap(), Role::Tool);
    }

    #[test]
    fn tool_error_is_flagged() {
        let message = Message::tool_error("addTransaction", "db locked");
        assert!(message.is_error);
        assert_eq!(message.role, Role::Tool);
        assert_eq!(message.name.as_deref(), Some("addTransaction"));
        assert!(message.content.contains("db locked"));
    }

    #[test]
    fn string_tool_results_are_not_json_quoted() {
        let message = Message::tool_result("echo", &serde_json::json!("hi"));
        assert_eq!(message.content, "Tool 'echo' output:\nhi");
    }
}
