use std::collections::VecDeque;
use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};

use crate::errors::{WalkError, WalkResult};
use crate::llm::provider::LlmProvider;
use crate::llm::sse_parser;
use crate::llm::types::{CallConfig, ChatMessage, ChunkStream, StreamChunk, StreamChunkKind};

pub struct OpenAiCompatibleProvider {
    id: String,
    api_base: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(id: String, api_base: String, api_key: String) -> Self {
        Self {
            id,
            api_base,
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn stream_chat(
        &self,
        messages: Vec<ChatMessage>,
        cfg: &CallConfig,
    ) -> WalkResult<ChunkStream> {
        let body = serde_json::json!({
            "model": cfg.model,
            "messages": &messages,
            "stream": cfg.stream,
            "temperature": cfg.temperature,
            "max_tokens": cfg.max_tokens,
        });

        tracing::debug!(
            provider = %self.id,
            model = %cfg.model,
            stream = cfg.stream,
            messages = messages.len(),
            "sending LLM request"
        );

        let response = self
            .client
            .post(&self.api_base)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(WalkError::LlmProvider(format!("{}: {}", status, err_body)));
        }

        if cfg.stream {
            let bytes: ByteStream =
                Box::pin(response.bytes_stream().map(|r| r.map(|b| b.to_vec())));
            Ok(sse_chunk_stream(bytes))
        } else {
            let json: serde_json::Value = response.json().await?;
            Ok(Box::pin(futures_util::stream::iter(json_chunks(&json))))
        }
    }
}

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Vec<u8>>> + Send>>;

/// Line-buffering state for an SSE body.
struct SseState {
    bytes: ByteStream,
    line_buf: Vec<u8>,
    pending: VecDeque<StreamChunk>,
    finished: bool,
}

impl SseState {
    /// Splits on raw `\n` so multi-byte characters cut across network chunks survive.
    fn ingest(&mut self, bytes: &[u8]) {
        for &b in bytes {
            if b == b'\n' {
                let line = std::mem::take(&mut self.line_buf);
                self.parse_line(&line);
            } else {
                self.line_buf.push(b);
            }
        }
    }

    fn flush_tail(&mut self) {
        if !self.line_buf.is_empty() {
            let line = std::mem::take(&mut self.line_buf);
            self.parse_line(&line);
        }
    }

    fn parse_line(&mut self, raw: &[u8]) {
        let text = String::from_utf8_lossy(raw);
        let line = text.trim();
        if line.is_empty() {
            return;
        }
        match sse_parser::parse_sse_line(line) {
            Ok(chunks) => self.pending.extend(chunks),
            Err(e) => {
                tracing::debug!("SSE parse skipped: {e}");
            }
        }
    }
}

fn sse_chunk_stream(bytes: ByteStream) -> ChunkStream {
    let state = SseState {
        bytes,
        line_buf: Vec::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    let stream = futures_util::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(chunk) = st.pending.pop_front() {
                match chunk.kind {
                    StreamChunkKind::Done => {
                        st.finished = true;
                        st.pending.clear();
                    }
                    StreamChunkKind::Error => {
                        st.finished = true;
                        st.pending.clear();
                        return Some((Err(WalkError::LlmProvider(chunk.content)), st));
                    }
                    _ => {}
                }
                return Some((Ok(chunk), st));
            }
            if st.finished {
                return None;
            }
            match st.bytes.next().await {
                Some(Ok(bytes)) => st.ingest(&bytes),
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(WalkError::Http(e)), st));
                }
                None => {
                    st.flush_tail();
                    // Stream ended without a [DONE] marker
                    st.pending.push_back(StreamChunk::done());
                }
            }
        }
    });

    Box::pin(stream)
}

/// Splits a non-streaming completion into the same chunk sequence a stream would produce.
fn json_chunks(json: &serde_json::Value) -> Vec<WalkResult<StreamChunk>> {
    let message = &json["choices"][0]["message"];
    let content = message["content"].as_str().unwrap_or("");
    let reasoning = message["reasoning_content"].as_str().unwrap_or("");

    tracing::info!(
        content_len = content.len(),
        reasoning_len = reasoning.len(),
        "LLM JSON response received"
    );

    let mut chunks = Vec::with_capacity(3);
    if !reasoning.is_empty() {
        chunks.push(Ok(StreamChunk::reasoning(reasoning)));
    }
    if !content.is_empty() {
        chunks.push(Ok(StreamChunk::content(content)));
    }
    chunks.push(Ok(StreamChunk::done()));
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes_of(parts: &[&str]) -> ByteStream {
        let items: Vec<reqwest::Result<Vec<u8>>> =
            parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        Box::pin(futures_util::stream::iter(items))
    }

    fn empty_state() -> SseState {
        SseState {
            bytes: bytes_of(&[]),
            line_buf: Vec::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    async fn drain(parts: &[&str]) -> Vec<WalkResult<StreamChunk>> {
        sse_chunk_stream(bytes_of(parts)).collect().await
    }

    #[tokio::test]
    async fn stream_stops_at_done_marker() {
        let items = drain(&[
            "data: {\"choices\":[{\"delta\":{\"reasoning_content\":\"hm\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"go\"}}]}\n\ndata: [DO",
            "NE]\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n\n",
        ])
        .await;
        let chunks: Vec<StreamChunk> = items.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(
            chunks,
            vec![
                StreamChunk::reasoning("hm"),
                StreamChunk::content("go"),
                StreamChunk::done(),
            ]
        );
    }

    #[tokio::test]
    async fn missing_done_marker_is_synthesized() {
        let items = drain(&["data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}"]).await;
        let chunks: Vec<StreamChunk> = items.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(chunks, vec![StreamChunk::content("hi"), StreamChunk::done()]);
    }

    #[tokio::test]
    async fn error_payload_ends_the_stream() {
        let items = drain(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"par\"}}]}\n",
            "data: {\"error\":{\"message\":\"overloaded\"}}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"tial\"}}]}\n",
        ])
        .await;
        assert_eq!(items.len(), 2);
        assert!(matches!(&items[1], Err(WalkError::LlmProvider(m)) if m == "overloaded"));
    }

    #[test]
    fn lines_split_across_network_chunks() {
        let mut st = empty_state();
        st.ingest(b"data: {\"choices\":[{\"delta\":{\"content\":\"\xe5\x8c");
        assert!(st.pending.is_empty());
        st.ingest(b"\x97\"}}]}\n\n");
        assert_eq!(st.pending.pop_front(), Some(StreamChunk::content("北")));
    }

    #[test]
    fn trailing_line_without_newline_is_flushed() {
        let mut st = empty_state();
        st.ingest(b"data: [DONE]");
        assert!(st.pending.is_empty());
        st.flush_tail();
        assert_eq!(st.pending.pop_front(), Some(StreamChunk::done()));
    }

    #[test]
    fn unparseable_lines_are_skipped() {
        let mut st = empty_state();
        st.ingest(b"data: {oops\ndata: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n");
        assert_eq!(st.pending.len(), 1);
        assert_eq!(st.pending[0], StreamChunk::content("ok"));
    }

    fn ok_chunks(items: Vec<WalkResult<StreamChunk>>) -> Vec<StreamChunk> {
        items.into_iter().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn json_completion_yields_reasoning_content_done() {
        let json = serde_json::json!({
            "choices": [{"message": {
                "reasoning_content": "east again",
                "content": "{\"x\": 4, \"y\": 0}"
            }}]
        });
        assert_eq!(
            ok_chunks(json_chunks(&json)),
            vec![
                StreamChunk::reasoning("east again"),
                StreamChunk::content("{\"x\": 4, \"y\": 0}"),
                StreamChunk::done(),
            ]
        );
    }

    #[test]
    fn json_completion_without_text_is_just_done() {
        let empty = serde_json::json!({"choices": [{"message": {"content": ""}}]});
        assert_eq!(ok_chunks(json_chunks(&empty)), vec![StreamChunk::done()]);

        let no_choices = serde_json::json!({"id": "x"});
        assert_eq!(ok_chunks(json_chunks(&no_choices)), vec![StreamChunk::done()]);
    }

    /// Serves one canned HTTP response on loopback and returns its URL.
    async fn serve_once(
        status: &'static str,
        content_type: &'static str,
        body: String,
    ) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            // Drain the full request so closing the socket does not reset the connection.
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
            }
            let head = format!("HTTP/1.1 {status}\r\ncontent-type: {content_type}\r\n");
            let response = format!(
                "{head}content-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{addr}/v1/chat/completions")
    }

    fn call(stream: bool) -> CallConfig {
        CallConfig {
            model: "deepseek-r1".into(),
            stream,
            temperature: 0.7,
            max_tokens: 1000,
        }
    }

    async fn run(url: String, stream: bool) -> WalkResult<Vec<WalkResult<StreamChunk>>> {
        let provider = OpenAiCompatibleProvider {
            id: "local".into(),
            api_base: url,
            api_key: "sk-test".into(),
            client: reqwest::Client::builder().no_proxy().build().unwrap(),
        };
        let chunks = provider
            .stream_chat(vec![ChatMessage::user("next?")], &call(stream))
            .await?;
        Ok(chunks.collect().await)
    }

    #[tokio::test]
    async fn non_streaming_request_round_trip() {
        let body = serde_json::json!({
            "choices": [{"message": {
                "reasoning_content": "hm",
                "content": "{\"x\": 1, \"y\": 2}"
            }}]
        })
        .to_string();
        let url = serve_once("200 OK", "application/json", body).await;
        let chunks = ok_chunks(run(url, false).await.unwrap());
        assert_eq!(
            chunks,
            vec![
                StreamChunk::reasoning("hm"),
                StreamChunk::content("{\"x\": 1, \"y\": 2}"),
                StreamChunk::done(),
            ]
        );
    }

    #[tokio::test]
    async fn streaming_request_round_trip() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"reasoning_content\":\"hm\",",
            "\"content\":\"{\\\"x\\\": 1}\"}}]}\n\n",
            "data: [DONE]\n\n"
        )
        .to_string();
        let url = serve_once("200 OK", "text/event-stream", body).await;
        let chunks = ok_chunks(run(url, true).await.unwrap());
        assert_eq!(
            chunks,
            vec![
                StreamChunk::reasoning("hm"),
                StreamChunk::content("{\"x\": 1}"),
                StreamChunk::done(),
            ]
        );
    }

    #[tokio::test]
    async fn error_status_carries_body() {
        let url = serve_once(
            "429 Too Many Requests",
            "application/json",
            "{\"error\":\"slow down\"}".to_string(),
        )
        .await;
        match run(url, true).await {
            Err(WalkError::LlmProvider(msg)) => {
                assert!(msg.starts_with("429"), "{msg}");
                assert!(msg.contains("slow down"), "{msg}");
            }
            other => panic!("expected provider error, got {other:?}"),
        }
    }
}
