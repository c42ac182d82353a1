use crate::errors::{WalkError, WalkResult};
use crate::llm::types::{StreamChunk, StreamChunkKind};

/// Parses a raw SSE line (OpenAI-compatible format) into StreamChunks.
///
/// A single delta may carry reasoning, content and a finish reason at once;
/// they are returned in that order. Keep-alives and non-data lines yield nothing.
pub fn parse_sse_line(line: &str) -> WalkResult<Vec<StreamChunk>> {
    if line.is_empty() || line.starts_with(':') {
        return Ok(Vec::new());
    }

    let data = if let Some(d) = line.strip_prefix("data:") {
        d.trim()
    } else {
        return Ok(Vec::new());
    };

    if data == "[DONE]" {
        return Ok(vec![StreamChunk::done()]);
    }

    let json: serde_json::Value =
        serde_json::from_str(data).map_err(|e| WalkError::SseParsing(e.to_string()))?;

    if let Some(message) = json["error"]["message"].as_str() {
        return Ok(vec![StreamChunk {
            kind: StreamChunkKind::Error,
            content: message.to_string(),
        }]);
    }

    let mut chunks = Vec::new();
    if let Some(first) = json["choices"].as_array().and_then(|c| c.first()) {
        let delta = &first["delta"];

        // DeepSeek-style models stream their chain of thought separately
        if let Some(reasoning) = delta["reasoning_content"].as_str() {
            if !reasoning.is_empty() {
                chunks.push(StreamChunk::reasoning(reasoning));
            }
        }

        if let Some(content) = delta["content"].as_str() {
            if !content.is_empty() {
                chunks.push(StreamChunk::content(content));
            }
        }

        if first["finish_reason"].as_str().is_some() {
            chunks.push(StreamChunk::done());
        }
    }

    Ok(chunks)
}
