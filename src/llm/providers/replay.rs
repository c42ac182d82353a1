use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::StreamExt;

use crate::errors::{WalkError, WalkResult};
use crate::llm::provider::LlmProvider;
use crate::llm::types::{CallConfig, ChatMessage, ChunkStream, StreamChunk};

#[derive(Debug, Clone)]
enum Script {
    Chunks(Vec<StreamChunk>),
    /// Yields the chunks, then never completes.
    Stall(Vec<StreamChunk>),
    /// Yields the chunks, then a transport error.
    Break(Vec<StreamChunk>, String),
    /// The request itself fails.
    Refuse(String),
}

/// Plays back a fixed response. Used for offline runs and tests.
pub struct ReplayProvider {
    id: String,
    script: Script,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ReplayProvider {
    pub fn new(chunks: Vec<StreamChunk>) -> Self {
        Self::with_script(Script::Chunks(chunks))
    }

    /// Splits `text` into small content tokens followed by `Done`.
    pub fn from_text(text: &str) -> Self {
        let mut chunks = tokenize(text);
        chunks.push(StreamChunk::done());
        Self::new(chunks)
    }

    pub fn stalling(text: &str) -> Self {
        Self::with_script(Script::Stall(tokenize(text)))
    }

    pub fn breaking(text: &str, error: impl Into<String>) -> Self {
        Self::with_script(Script::Break(tokenize(text), error.into()))
    }

    pub fn refusing(error: impl Into<String>) -> Self {
        Self::with_script(Script::Refuse(error.into()))
    }

    fn with_script(script: Script) -> Self {
        Self {
            id: "replay".into(),
            script,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every conversation this provider has been sent, oldest first.
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

fn tokenize(text: &str) -> Vec<StreamChunk> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(4)
        .map(|c| StreamChunk::content(c.iter().collect::<String>()))
        .collect()
}

#[async_trait]
impl LlmProvider for ReplayProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn stream_chat(
        &self,
        messages: Vec<ChatMessage>,
        _cfg: &CallConfig,
    ) -> WalkResult<ChunkStream> {
        if let Ok(mut log) = self.requests.lock() {
            log.push(messages);
        }

        let ok = |chunks: &Vec<StreamChunk>| {
            futures_util::stream::iter(chunks.clone().into_iter().map(Ok::<_, WalkError>))
        };

        match &self.script {
            Script::Chunks(chunks) => Ok(Box::pin(ok(chunks))),
            Script::Stall(chunks) => {
                Ok(Box::pin(ok(chunks).chain(futures_util::stream::pending())))
            }
            Script::Break(chunks, error) => {
                let tail = futures_util::stream::once(std::future::ready(Err::<StreamChunk, _>(
                    WalkError::LlmProvider(error.clone()),
                )));
                Ok(Box::pin(ok(chunks).chain(tail)))
            }
            Script::Refuse(error) => Err(WalkError::LlmProvider(error.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> CallConfig {
        CallConfig {
            model: "m".into(),
            stream: true,
            temperature: 0.0,
            max_tokens: 16,
        }
    }

    #[tokio::test]
    async fn from_text_reassembles() {
        let provider = ReplayProvider::from_text("héllo {\"x\": 1}");
        let mut stream = provider.stream_chat(vec![ChatMessage::user("hi")], &cfg()).await.unwrap();
        let mut text = String::new();
        let mut saw_done = false;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.unwrap();
            match chunk.kind {
                crate::llm::types::StreamChunkKind::Done => saw_done = true,
                _ => text.push_str(&chunk.content),
            }
        }
        assert_eq!(text, "héllo {\"x\": 1}");
        assert!(saw_done);
        assert_eq!(provider.requests(), vec![vec![ChatMessage::user("hi")]]);
    }

    #[tokio::test]
    async fn refusing_fails_the_request() {
        let provider = ReplayProvider::refusing("503");
        assert!(provider.stream_chat(Vec::new(), &cfg()).await.is_err());
    }
}
