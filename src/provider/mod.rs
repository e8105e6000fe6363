//! Chat provider trait and the HTTP streaming client.

pub mod http;
pub mod sse;
pub mod streaming;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::types::Message;

pub use streaming::StreamingClient;

/// One model call: the conversation so far plus the agent's parameters.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub history: Vec<Message>,
    /// Effective system prompt, tool catalog included.
    pub system_prompt: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// Something that can answer a [`ChatRequest`].
///
/// [`StreamingClient`] is the HTTP implementation; tests substitute
/// scripted providers.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Stream the answer, forwarding each text fragment to `on_delta`, and
    /// resolve with the full text. Cancelling `cancel` aborts the call with
    /// [`crate::error::BatonError::Cancelled`].
    async fn stream_chat(
        &self,
        request: &ChatRequest,
        on_delta: &mut (dyn for<'a> FnMut(&'a str) + Send),
        cancel: &CancellationToken,
    ) -> Result<String>;

    /// Single complete answer, no incremental output.
    async fn complete_chat(&self, request: &ChatRequest) -> Result<String>;
}
