//! Shared test helpers and a scripted chat provider.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use baton::agent::{AgentDefinition, Registry};
use baton::config::BatonConfig;
use baton::error::{BatonError, Result};
use baton::provider::{ChatProvider, ChatRequest};
use baton::session::SessionStore;
use baton::Engine;

/// One scripted model turn.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Streamed back in two fragments.
    Text(String),
    /// The call fails with an authentication error.
    Fail(String),
    /// Never answers; resolves only when cancelled.
    Hang,
}

/// A provider that replays queued replies in order, then falls back to a
/// fixed reply (if any). Every request is recorded.
#[derive(Default)]
pub struct MockProvider {
    replies: Mutex<VecDeque<Reply>>,
    fallback: Option<String>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies<'a>(replies: impl IntoIterator<Item = &'a str>) -> Self {
        let provider = Self::new();
        for reply in replies {
            provider.push(Reply::Text(reply.to_string()));
        }
        provider
    }

    /// Answer every request with `text`.
    pub fn always(text: &str) -> Self {
        Self {
            fallback: Some(text.to_string()),
            ..Self::default()
        }
    }

    pub fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn next_reply(&self, request: &ChatRequest) -> Reply {
        self.requests.lock().unwrap().push(request.clone());
        let queued = self.replies.lock().unwrap().pop_front();
        queued
            .or_else(|| self.fallback.clone().map(Reply::Text))
            .unwrap_or_else(|| Reply::Fail("no scripted reply left".to_string()))
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    async fn stream_chat(
        &self,
        request: &ChatRequest,
        on_delta: &mut (dyn for<'a> FnMut(&'a str) + Send),
        cancel: &CancellationToken,
    ) -> Result<String> {
        match self.next_reply(request) {
            Reply::Text(text) => {
                let mid = text
                    .char_indices()
                    .map(|(i, _)| i)
                    .nth(text.chars().count() / 2)
                    .unwrap_or(0);
                let (head, tail) = text.split_at(mid);
                for piece in [head, tail] {
                    if !piece.is_empty() {
                        on_delta(piece);
                    }
                }
                Ok(text)
            }
            Reply::Fail(message) => Err(BatonError::Authentication(message)),
            Reply::Hang => {
                cancel.cancelled().await;
                Err(BatonError::Cancelled)
            }
        }
    }

    async fn complete_chat(&self, request: &ChatRequest) -> Result<String> {
        match self.next_reply(request) {
            Reply::Text(text) => Ok(text),
            Reply::Fail(message) => Err(BatonError::Authentication(message)),
            Reply::Hang => std::future::pending().await,
        }
    }
}

pub fn agent(id: &str, name: &str) -> AgentDefinition {
    AgentDefinition::builder()
        .id(id)
        .name(name)
        .description(format!("{name} specialist"))
        .system_prompt(format!("You are {name}."))
        .build()
}

pub fn test_config() -> BatonConfig {
    BatonConfig::default().with_api_key("sk-test")
}

/// Engine over a fresh session store.
pub fn engine(registry: Registry, provider: Arc<MockProvider>) -> Engine {
    Engine::new(
        Arc::new(registry),
        Arc::new(SessionStore::new()),
        provider,
        test_config(),
    )
}

/// A JSON tool call the parser accepts.
pub fn tool_call(name: &str, args: serde_json::Value) -> String {
    serde_json::json!({ "tool": name, "args": args }).to_string()
}
