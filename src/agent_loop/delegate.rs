//! Supervisor/worker delegation.
//!
//! A worker runs in a scratch history seeded with the supervisor's message
//! and answers through one-shot completions. It may call its own function
//! tools; handoff and delegate tools are not offered to it. Nothing from the
//! scratch history is written back to the supervisor's session.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::dispatch::{invoke, ResolvedTool, ToolTable};
use crate::agent::Registry;
use crate::config::BatonConfig;
use crate::error::{BatonError, Result};
use crate::parser::{build_system_prompt, parse_tool_call};
use crate::provider::{ChatProvider, ChatRequest};
use crate::tools::{ExecutionContext, ToolKind};
use crate::types::Message;

pub(crate) struct Worker<'a> {
    pub registry: &'a Registry,
    pub provider: &'a dyn ChatProvider,
    pub config: &'a BatonConfig,
    pub session_id: &'a str,
}

impl Worker<'_> {
    /// Ask `worker_id` to handle `message` and return its final answer.
    pub(crate) async fn run(
        &self,
        worker_id: &str,
        message: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let agent = self
            .registry
            .agent(worker_id)
            .ok_or_else(|| BatonError::AgentNotFound(worker_id.to_string()))?;
        let tools: Vec<_> = self
            .registry
            .tools_for(worker_id)
            .into_iter()
            .filter(|t| t.kind == ToolKind::Function)
            .collect();
        let table = ToolTable::new(&tools);
        let system_prompt = build_system_prompt(&agent.system_prompt, &tools);
        let mut history = vec![Message::user(message)];

        for round in 1..=self.config.worker_max_steps {
            if cancel.is_cancelled() {
                return Err(BatonError::Cancelled);
            }
            let request = ChatRequest {
                history: history.clone(),
                system_prompt: system_prompt.clone(),
                model: agent.model_or(&self.config.default_model).to_string(),
                temperature: agent.temperature.unwrap_or(self.config.default_temperature),
                max_tokens: agent.max_tokens.unwrap_or(self.config.default_max_tokens),
            };
            let text = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(BatonError::Cancelled),
                result = self.provider.complete_chat(&request) => result?,
            };
            tracing::debug!(worker = %agent.id, round, "worker responded");
            history.push(Message::assistant(&text).with_name(&agent.name).with_agent(&agent.id));

            let Some(call) = parse_tool_call(&text) else {
                return Ok(text);
            };
            let tool = match table.resolve(&call.name) {
                Some(ResolvedTool::Function(tool)) => tool,
                _ => {
                    history.push(Message::system(format!(
                        "System Error: Tool \"{}\" not found in available tools list.",
                        call.name
                    )));
                    continue;
                }
            };

            let ctx = ExecutionContext {
                session_id: self.session_id.to_string(),
                current_agent_id: agent.id.clone(),
                history: Arc::from(history.clone()),
            };
            match invoke(tool, call.args, ctx, cancel).await {
                Ok(value) => history.push(Message::tool_result(&call.name, &value)),
                Err(BatonError::Cancelled) if cancel.is_cancelled() => {
                    return Err(BatonError::Cancelled)
                }
                Err(e) => history.push(Message::tool_error(&call.name, e)),
            }
        }

        Err(BatonError::MaxStepsExceeded {
            max_steps: self.config.worker_max_steps,
        })
    }
}
