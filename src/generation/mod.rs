//! Reply generation: prompt assembly, backend call, response cleanup.

pub mod ollama;
pub mod prompt;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::model::item::InboundItem;

pub use ollama::OllamaBackend;
pub use prompt::{PromptTemplate, ANSWER_MARKER};

/// Number of characters of generated text shown in logs.
pub const LOG_PREVIEW_CHARS: usize = 100;

/// Why a reply could not be generated.
#[derive(Error, Debug)]
pub enum GenerationError {
    /// The request never produced an HTTP response (connect, timeout, ...).
    #[error("generation request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("generation backend returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not the expected JSON shape.
    #[error("malformed generation response: {0}")]
    Malformed(String),

    /// Nothing was left after stripping the template echo.
    #[error("generation returned an empty reply")]
    Empty,
}

/// A text-generation service taking a complete prompt.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate a completion for `prompt` with `model`, non-streaming.
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, GenerationError>;
}

/// Issues context-augmented prompts and cleans the replies.
pub struct GenerationClient {
    backend: Box<dyn GenerationBackend>,
    model: String,
}

impl GenerationClient {
    pub fn new(backend: Box<dyn GenerationBackend>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }

    /// Model identifier sent with every request.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generate a reply to `item`, grounded in `context`.
    ///
    /// The returned text has any echoed template stripped; it is never
    /// truncated. Only log output is shortened.
    pub async fn generate(
        &self,
        template: &PromptTemplate,
        item: &InboundItem,
        context: &str,
    ) -> Result<String, GenerationError> {
        let prompt = template.render(item, context);
        debug!(
            model = %self.model,
            prompt_chars = prompt.chars().count(),
            context_chars = context.chars().count(),
            "Requesting reply"
        );

        let raw = self.backend.generate(&self.model, &prompt).await?;
        let reply = clean_response(&raw);
        if reply.is_empty() {
            return Err(GenerationError::Empty);
        }

        info!(preview = %preview(&reply, LOG_PREVIEW_CHARS), "Generated reply");
        Ok(reply)
    }
}

/// Strip everything up to and including the last [`ANSWER_MARKER`], then trim.
pub fn clean_response(raw: &str) -> String {
    raw.rsplit(ANSWER_MARKER)
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// First `max_chars` characters of `text`, with `...` appended if cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
