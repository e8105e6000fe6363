//! Convenience re-exports for common use.

pub use crate::agent::{AgentDefinition, Registry};
pub use crate::agent_loop::{
    CancelHandle, Engine, RunEvent, RunEventPayload, RunHandle, RunResult, RunStatus,
};
pub use crate::config::BatonConfig;
pub use crate::error::{BatonError, Result};
pub use crate::parser::{parse_tool_call, ParsedToolCall};
pub use crate::provider::{ChatProvider, ChatRequest, StreamingClient};
pub use crate::session::SessionStore;
pub use crate::tools::{ExecutionContext, ToolArguments, ToolDefinition, ToolParameters};
pub use crate::types::{Message, Role};
