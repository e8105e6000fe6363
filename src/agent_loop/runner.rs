//! The orchestration engine and run handles.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::delegate::Worker;
use super::dispatch::{check_arguments, invoke, ResolvedTool, ToolTable};
use super::events::{RunEvent, RunEventEmitter, RunEventPayload};
use super::types::{RunId, RunResult};
use crate::agent::Registry;
use crate::config::BatonConfig;
use crate::error::{BatonError, Result};
use crate::parser::{build_system_prompt, parse_tool_call, ParsedToolCall};
use crate::provider::{ChatProvider, ChatRequest};
use crate::session::SessionStore;
use crate::tools::ExecutionContext;
use crate::types::Message;

/// Cloneable handle that stops one run.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    /// Abort the in-flight model or tool call and prevent further steps.
    /// Messages already appended stay in the session.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Handle for an in-flight run: its event stream, cancellation, and result.
#[derive(Debug)]
pub struct RunHandle {
    run_id: RunId,
    cancel: CancelHandle,
    events: mpsc::UnboundedReceiver<RunEvent>,
    result_rx: oneshot::Receiver<RunResult>,
}

impl RunHandle {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Next event, or `None` once the run has finished and every event was
    /// delivered.
    pub async fn next_event(&mut self) -> Option<RunEvent> {
        self.events.recv().await
    }

    /// Wait for the outcome. Undelivered events are dropped.
    pub async fn wait(self) -> RunResult {
        self.result_rx
            .await
            .unwrap_or_else(|_| RunResult::canceled(0))
    }

    /// Drain every event, then return them with the outcome.
    pub async fn finish(mut self) -> (Vec<RunEvent>, RunResult) {
        let mut events = Vec::new();
        while let Some(event) = self.events.recv().await {
            events.push(event);
        }
        let result = self.wait().await;
        (events, result)
    }
}

/// Drives agents through model calls, tool execution, and handoffs.
///
/// The engine is cheap to clone; clones share the registry, the session
/// store, the provider, and the stop signal.
#[derive(Clone)]
pub struct Engine {
    registry: Arc<Registry>,
    sessions: Arc<SessionStore>,
    provider: Arc<dyn ChatProvider>,
    config: BatonConfig,
    shutdown: Arc<Mutex<CancellationToken>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(
        registry: Arc<Registry>,
        sessions: Arc<SessionStore>,
        provider: Arc<dyn ChatProvider>,
        config: BatonConfig,
    ) -> Self {
        Self {
            registry,
            sessions,
            provider,
            config,
            shutdown: Arc::new(Mutex::new(CancellationToken::new())),
        }
    }

    /// Override the step ceiling for runs started after this call.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.config.max_steps = max_steps;
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Create a session held by a registered agent.
    pub fn create_session(&self, initial_agent_id: &str) -> Result<String> {
        if !self.registry.has_agent(initial_agent_id) {
            return Err(BatonError::AgentNotFound(initial_agent_id.to_string()));
        }
        Ok(self.sessions.create_session(initial_agent_id))
    }

    /// Create a session held by the registry's default agent.
    pub fn create_default_session(&self) -> Result<String> {
        let agent_id = self.registry.default_agent_id().ok_or_else(|| {
            BatonError::Configuration("no agents registered".to_string())
        })?;
        self.create_session(&agent_id)
    }

    pub fn messages(&self, session_id: &str) -> Vec<Message> {
        self.sessions.messages(session_id)
    }

    /// Cancel every run started so far. Later runs are unaffected.
    pub fn stop(&self) {
        let mut shutdown = self
            .shutdown
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        shutdown.cancel();
        *shutdown = CancellationToken::new();
    }

    /// Start a run on `session_id`. A non-blank `input` is appended as the
    /// user turn; a blank one lets the current agent continue from the
    /// existing history.
    pub fn run(&self, session_id: &str, input: &str) -> Result<RunHandle> {
        if !self.sessions.contains(session_id) {
            return Err(BatonError::SessionNotFound(session_id.to_string()));
        }

        let run_id = Uuid::new_v4();
        let token = self
            .shutdown
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .child_token();
        let (event_tx, events) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = oneshot::channel();

        let run = RunLoop {
            run_id,
            session_id: session_id.to_string(),
            registry: self.registry.clone(),
            sessions: self.sessions.clone(),
            provider: self.provider.clone(),
            config: self.config.clone(),
            cancel: token.clone(),
            emitter: RunEventEmitter::new(run_id, event_tx),
        };
        let input = input.trim().to_string();
        tokio::spawn(async move {
            let result = run.drive(input).await;
            let _ = result_tx.send(result);
        });

        Ok(RunHandle {
            run_id,
            cancel: CancelHandle { token },
            events,
            result_rx,
        })
    }
}

/// What a tool call did to the conversation.
enum StepOutcome {
    Continue,
    Canceled,
}

struct RunLoop {
    run_id: RunId,
    session_id: String,
    registry: Arc<Registry>,
    sessions: Arc<SessionStore>,
    provider: Arc<dyn ChatProvider>,
    config: BatonConfig,
    cancel: CancellationToken,
    emitter: RunEventEmitter,
}

impl RunLoop {
    async fn drive(self, input: String) -> RunResult {
        tracing::info!(run_id = %self.run_id, session_id = %self.session_id, "run started");
        self.emitter.emit(RunEventPayload::Started);

        if !input.is_empty() {
            self.sessions
                .append_message(&self.session_id, Message::user(input));
        }

        let max_steps = self.config.max_steps;
        let mut steps = 0usize;

        loop {
            if self.cancel.is_cancelled() {
                return self.canceled(steps);
            }
            if steps >= max_steps {
                let error = BatonError::MaxStepsExceeded { max_steps };
                tracing::error!(run_id = %self.run_id, max_steps, "run exceeded step ceiling");
                self.emitter.emit(RunEventPayload::Failed {
                    error: error.to_string(),
                });
                return RunResult::max_steps_exceeded(steps, error.to_string());
            }
            steps += 1;

            let Some(agent_id) = self.sessions.current_agent(&self.session_id) else {
                return self.failed(steps, BatonError::SessionNotFound(self.session_id.clone()));
            };
            let Some(agent) = self.registry.agent(&agent_id) else {
                return self.failed(steps, BatonError::AgentNotFound(agent_id));
            };

            let tools = self.registry.tools_for(&agent.id);
            let request = ChatRequest {
                history: self.sessions.messages(&self.session_id),
                system_prompt: build_system_prompt(&agent.system_prompt, &tools),
                model: agent.model_or(&self.config.default_model).to_string(),
                temperature: agent.temperature.unwrap_or(self.config.default_temperature),
                max_tokens: agent.max_tokens.unwrap_or(self.config.default_max_tokens),
            };
            tracing::debug!(run_id = %self.run_id, step = steps, agent_id = %agent.id, tools = tools.len(), "step");

            let mut on_delta = |text: &str| {
                self.emitter.emit(RunEventPayload::TextDelta {
                    agent_id: agent.id.clone(),
                    text: text.to_string(),
                })
            };
            let text = match self
                .provider
                .stream_chat(&request, &mut on_delta, &self.cancel)
                .await
            {
                Ok(text) => text,
                Err(BatonError::Cancelled) => return self.canceled(steps),
                Err(e) => return self.failed(steps, e),
            };

            self.sessions.append_message(
                &self.session_id,
                Message::assistant(&text)
                    .with_name(&agent.name)
                    .with_agent(&agent.id),
            );

            let Some(call) = parse_tool_call(&text) else {
                tracing::info!(run_id = %self.run_id, steps, agent_id = %agent.id, "run completed");
                self.emitter.emit(RunEventPayload::Completed {
                    agent_id: agent.id.clone(),
                    text: text.clone(),
                });
                return RunResult::completed(steps, text);
            };

            self.emitter.emit(RunEventPayload::ToolCall {
                agent_id: agent.id.clone(),
                tool_name: call.name.clone(),
                args: call.args.clone(),
            });

            let table = ToolTable::new(&tools);
            let outcome = match table.resolve(&call.name) {
                None => {
                    self.record_unknown_tool(&agent.tools, &call.name);
                    StepOutcome::Continue
                }
                Some(ResolvedTool::Handoff { target_agent_id }) => {
                    self.hand_off(&agent.id, &agent.name, target_agent_id, &call);
                    StepOutcome::Continue
                }
                Some(ResolvedTool::Function(tool)) => {
                    let ctx = self.context(&agent.id);
                    let result = invoke(tool, call.args.clone(), ctx, &self.cancel).await;
                    self.record_tool_result(&agent.id, &call.name, result)
                }
                Some(ResolvedTool::Delegate {
                    tool,
                    target_agent_id,
                }) => {
                    let result = match check_arguments(tool, &call.args) {
                        Ok(()) => {
                            let message = call
                                .args
                                .get("message")
                                .and_then(Value::as_str)
                                .unwrap_or_default();
                            let worker = Worker {
                                registry: &self.registry,
                                provider: self.provider.as_ref(),
                                config: &self.config,
                                session_id: &self.session_id,
                            };
                            tracing::info!(run_id = %self.run_id, supervisor = %agent.id, worker = target_agent_id, "delegating");
                            worker
                                .run(target_agent_id, message, &self.cancel)
                                .await
                                .map(Value::String)
                        }
                        Err(e) => Err(e),
                    };
                    self.record_tool_result(&agent.id, &call.name, result)
                }
            };

            if let StepOutcome::Canceled = outcome {
                return self.canceled(steps);
            }
        }
    }

    fn context(&self, agent_id: &str) -> ExecutionContext {
        ExecutionContext {
            session_id: self.session_id.clone(),
            current_agent_id: agent_id.to_string(),
            history: Arc::from(self.sessions.messages(&self.session_id)),
        }
    }

    /// A tool is reported as disabled only when it is assigned to the
    /// calling agent; anything else is unknown to that agent.
    fn record_unknown_tool(&self, assigned: &[String], tool_name: &str) {
        let note = match self.registry.find_tool_by_name(tool_name) {
            Some(tool) if !tool.enabled && assigned.contains(&tool.id) => {
                format!("System Error: Tool \"{tool_name}\" is disabled.")
            }
            _ => format!("System Error: Tool \"{tool_name}\" not found in available tools list."),
        };
        tracing::warn!(run_id = %self.run_id, tool = tool_name, "model called an unavailable tool");
        self.sessions
            .append_message(&self.session_id, Message::system(note));
    }

    fn hand_off(&self, from_id: &str, from_name: &str, to_id: &str, call: &ParsedToolCall) {
        let to_name = self
            .registry
            .agent(to_id)
            .map(|a| a.name)
            .unwrap_or_else(|| to_id.to_string());
        let reason = call
            .args
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or("no reason given");

        self.sessions.set_current_agent(&self.session_id, to_id);
        self.sessions.append_message(
            &self.session_id,
            Message::system(format!(
                "[System]: Task transferred from {from_name} to {to_name}. Reason: {reason}"
            )),
        );
        tracing::info!(run_id = %self.run_id, from = from_id, to = to_id, reason, "handoff");
        self.emitter.emit(RunEventPayload::AgentChanged {
            from: from_id.to_string(),
            to: to_id.to_string(),
        });
    }

    fn record_tool_result(
        &self,
        agent_id: &str,
        tool_name: &str,
        result: Result<Value>,
    ) -> StepOutcome {
        let (message, value, is_error) = match result {
            Ok(value) => (Message::tool_result(tool_name, &value), value, false),
            Err(BatonError::Cancelled) if self.cancel.is_cancelled() => {
                return StepOutcome::Canceled;
            }
            Err(e) => {
                tracing::warn!(run_id = %self.run_id, tool = tool_name, error = %e, "tool failed");
                let value = serde_json::json!({ "error": e.to_string() });
                (Message::tool_error(tool_name, &e), value, true)
            }
        };
        self.sessions
            .append_message(&self.session_id, message.with_agent(agent_id));
        self.emitter.emit(RunEventPayload::ToolResult {
            agent_id: agent_id.to_string(),
            tool_name: tool_name.to_string(),
            result: value,
            is_error,
        });
        StepOutcome::Continue
    }

    fn canceled(&self, steps: usize) -> RunResult {
        tracing::info!(run_id = %self.run_id, steps, "run canceled");
        self.emitter.emit(RunEventPayload::Canceled);
        RunResult::canceled(steps)
    }

    fn failed(&self, steps: usize, error: BatonError) -> RunResult {
        tracing::error!(run_id = %self.run_id, steps, error = %error, "run failed");
        self.emitter.emit(RunEventPayload::Failed {
            error: error.to_string(),
        });
        RunResult::failed(steps, error.to_string())
    }
}
