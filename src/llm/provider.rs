use async_trait::async_trait;

use crate::errors::WalkResult;
use crate::llm::types::{CallConfig, ChatMessage, ChunkStream};

/// Unified LLM provider trait. All providers implement this trait.
/// New providers only need to implement this trait and register in config.toml.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Returns the provider's identifier (matches config.toml key).
    fn name(&self) -> &str;

    /// Sends the conversation and returns the response as a chunk stream.
    ///
    /// Streaming and non-streaming calls share this shape: a non-streaming
    /// call yields the whole message as one `Content` chunk, then `Done`.
    async fn stream_chat(
        &self,
        messages: Vec<ChatMessage>,
        cfg: &CallConfig,
    ) -> WalkResult<ChunkStream>;
}
