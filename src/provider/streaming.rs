//! Chat-completions client with SSE streaming and retrying one-shot calls.

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::http::{bearer_headers, build_client, status_to_error};
use super::sse::consume_sse;
use super::{ChatProvider, ChatRequest};
use crate::config::BatonConfig;
use crate::error::{BatonError, Result};
use crate::util::retry::RetryPolicy;
use crate::util::timeout::with_timeout;
use crate::util::truncation::{truncate_to_budget, window};

/// Talks to an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct StreamingClient {
    config: BatonConfig,
    client: reqwest::Client,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

impl StreamingClient {
    /// Validates the configuration and builds the HTTP client. A missing
    /// API key fails here rather than on the first request.
    pub fn new(config: BatonConfig) -> Result<Self> {
        config.validate()?;
        let retry = RetryPolicy::from_config(&config);
        Ok(Self {
            client: build_client()?,
            config,
            retry,
        })
    }

    /// Replace the retry policy used by [`ChatProvider::complete_chat`].
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &BatonConfig {
        &self.config
    }

    /// Outgoing message list: the system prompt, then the newest history
    /// entries within the configured window and token budget.
    pub fn wire_messages(&self, request: &ChatRequest) -> Vec<serde_json::Value> {
        let mut recent = window(&request.history, self.config.max_history_messages);
        if let Some(max_tokens) = self.config.max_context_tokens {
            recent = truncate_to_budget(recent, &request.system_prompt, max_tokens);
        }

        let mut messages = Vec::with_capacity(recent.len() + 1);
        if !request.system_prompt.is_empty() {
            messages.push(serde_json::json!({
                "role": "system",
                "content": request.system_prompt,
            }));
        }
        messages.extend(recent.iter().map(|m| {
            serde_json::json!({
                "role": m.role.wire_role(),
                "content": m.content,
            })
        }));
        messages
    }

    fn request_body(&self, request: &ChatRequest, stream: bool) -> serde_json::Value {
        serde_json::json!({
            "model": request.model,
            "messages": self.wire_messages(request),
            "stream": stream,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    async fn send(&self, body: &serde_json::Value, streaming: bool) -> Result<reqwest::Response> {
        let api_key = self.config.api_key.as_deref().unwrap_or_default();
        let resp = self
            .client
            .post(self.endpoint())
            .headers(bearer_headers(api_key, streaming))
            .json(body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status != 200 {
            let retry_after = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text, retry_after.as_deref()));
        }
        Ok(resp)
    }

    async fn complete_once(&self, body: &serde_json::Value) -> Result<String> {
        let resp = self.send(body, false).await?;
        let data: CompletionResponse = resp.json().await?;
        let choice = data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| BatonError::api(200, "No choices in completion response"))?;
        Ok(choice.message.content.unwrap_or_default())
    }
}

#[async_trait]
impl ChatProvider for StreamingClient {
    async fn stream_chat(
        &self,
        request: &ChatRequest,
        on_delta: &mut (dyn for<'a> FnMut(&'a str) + Send),
        cancel: &CancellationToken,
    ) -> Result<String> {
        let body = self.request_body(request, true);
        debug!(model = %request.model, messages = body["messages"].as_array().map_or(0, Vec::len), "streaming chat request");

        let call = async {
            let resp = self.send(&body, true).await?;
            consume_sse(resp.bytes_stream(), on_delta).await
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("streaming chat request cancelled");
                Err(BatonError::Cancelled)
            }
            result = with_timeout(self.config.request_timeout(), call) => result,
        }
    }

    async fn complete_chat(&self, request: &ChatRequest) -> Result<String> {
        let body = self.request_body(request, false);
        debug!(model = %request.model, "chat completion request");
        let timeout = self.config.request_timeout();
        self.retry
            .execute(|| with_timeout(timeout, self.complete_once(&body)))
            .await
    }
}
