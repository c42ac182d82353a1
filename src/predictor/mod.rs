//! Proposes the next step of the walk.
//!
//! The model is asked first; anything that goes wrong on that path
//! (transport, timeout, unusable reply) degrades to [`fallback::fallback_step`],
//! so [`StepPredictor::predict_next_point`] always yields a point.

pub mod context;
pub mod extract;
pub mod fallback;

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::config::AppConfig;
use crate::errors::{WalkError, WalkResult};
use crate::llm::provider::LlmProvider;
use crate::llm::registry::ProviderRegistry;
use crate::llm::types::{CallConfig, ChatMessage, StreamChunk, StreamChunkKind};
use crate::trajectory::Coordinate;

use self::extract::{extract_step, ExtractedStep};

const DEFAULT_HISTORY_WINDOW: usize = 5;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionSource {
    /// First point of an empty walk; the model is not consulted.
    Initial,
    Model,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub x: f64,
    pub y: f64,
    pub rationale: String,
    pub source: PredictionSource,
}

/// Reasoning and content channels accumulated from one response.
#[derive(Debug, Default)]
struct Transcript {
    reasoning: String,
    content: String,
}

impl Transcript {
    /// Reasoning first, so the payload search lands in the content channel.
    fn full_text(&self) -> String {
        match (self.reasoning.is_empty(), self.content.is_empty()) {
            (false, false) => format!("{}\n{}", self.reasoning, self.content),
            (false, true) => self.reasoning.clone(),
            _ => self.content.clone(),
        }
    }
}

pub struct StepPredictor {
    backend: Option<(Arc<dyn LlmProvider>, CallConfig)>,
    history_window: usize,
    timeout: Duration,
    rng: StdRng,
    observer: Option<mpsc::UnboundedSender<StreamChunk>>,
}

impl StepPredictor {
    pub fn new(provider: Arc<dyn LlmProvider>, call: CallConfig) -> Self {
        Self {
            backend: Some((provider, call)),
            ..Self::offline()
        }
    }

    /// No model at all: every non-initial step is a fallback step.
    pub fn offline() -> Self {
        Self {
            backend: None,
            history_window: DEFAULT_HISTORY_WINDOW,
            timeout: DEFAULT_TIMEOUT,
            rng: StdRng::from_entropy(),
            observer: None,
        }
    }

    /// Resolves the `step` role; a missing provider leaves the predictor offline.
    pub fn from_config(config: &AppConfig, registry: &ProviderRegistry) -> Self {
        let mut predictor = match registry.call_config_for_role("step") {
            Ok((provider, call)) => Self::new(provider, call),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "no LLM configured for the step role; predictions will use the fallback rule"
                );
                Self::offline()
            }
        };
        predictor.history_window = config.predictor.history_window;
        predictor.timeout = Duration::from_secs(config.predictor.timeout_secs);
        if let Some(seed) = config.predictor.seed {
            predictor.rng = StdRng::seed_from_u64(seed);
        }
        predictor
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    /// Every chunk received from the model is also sent here as it arrives.
    pub fn with_observer(mut self, observer: mpsc::UnboundedSender<StreamChunk>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn is_offline(&self) -> bool {
        self.backend.is_none()
    }

    pub async fn predict_next_point(&mut self, points: &[Coordinate]) -> Prediction {
        if points.is_empty() {
            let (x, y) = fallback::initial_point(&mut self.rng);
            tracing::info!(x, y, "empty walk, drew initial point");
            return Prediction {
                x,
                y,
                rationale: fallback::INITIAL_RATIONALE.to_string(),
                source: PredictionSource::Initial,
            };
        }

        match self.query_model(points).await {
            Ok(step) => {
                tracing::info!(
                    x = step.x,
                    y = step.y,
                    rationale_len = step.rationale.len(),
                    "model proposed step"
                );
                Prediction {
                    x: step.x,
                    y: step.y,
                    rationale: step.rationale,
                    source: PredictionSource::Model,
                }
            }
            Err(e) => {
                if e.is_recoverable_by_fallback() {
                    tracing::warn!(error = %e, "model step unusable, using fallback rule");
                } else {
                    tracing::error!(error = %e, "unexpected prediction error, using fallback rule");
                }
                let (x, y, rationale) = fallback::fallback_step(points, &mut self.rng);
                Prediction {
                    x,
                    y,
                    rationale: rationale.to_string(),
                    source: PredictionSource::Fallback,
                }
            }
        }
    }

    async fn query_model(&self, points: &[Coordinate]) -> WalkResult<ExtractedStep> {
        let Some((provider, call)) = &self.backend else {
            return Err(WalkError::BackendUnavailable("no provider configured".into()));
        };

        let messages = context::build_messages(points, self.history_window);
        let pending = self.collect(provider.as_ref(), call, messages);
        let transcript = tokio::time::timeout(self.timeout, pending)
            .await
            .map_err(|_| WalkError::Timeout(self.timeout))??;

        let text = transcript.full_text();
        let step = extract_step(&text);
        if let Err(WalkError::MalformedStructuredOutput { raw, diagnostic }) = &step {
            tracing::debug!(raw = %raw, diagnostic = %diagnostic, "payload failed to parse");
        }
        step
    }

    /// Drains the stream into a transcript. Nothing partial escapes on error.
    async fn collect(
        &self,
        provider: &dyn LlmProvider,
        call: &CallConfig,
        messages: Vec<ChatMessage>,
    ) -> WalkResult<Transcript> {
        let mut stream = provider.stream_chat(messages, call).await?;
        let mut transcript = Transcript::default();

        while let Some(item) = stream.next().await {
            let chunk = item?;
            if let Some(tx) = &self.observer {
                let _ = tx.send(chunk.clone());
            }
            match chunk.kind {
                StreamChunkKind::Reasoning => transcript.reasoning.push_str(&chunk.content),
                StreamChunkKind::Content => transcript.content.push_str(&chunk.content),
                StreamChunkKind::Done => break,
                StreamChunkKind::Error => return Err(WalkError::LlmProvider(chunk.content)),
            }
        }

        tracing::info!(
            provider = %provider.name(),
            content_len = transcript.content.len(),
            reasoning_len = transcript.reasoning.len(),
            "LLM stream complete"
        );
        Ok(transcript)
    }
}
