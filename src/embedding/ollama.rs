//! Embeddings from an Ollama-compatible `/api/embed` endpoint.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{Embedding, EmbeddingProvider};
use crate::error::{DraftError, Result};

/// Dimension of `nomic-embed-text`, the default remote model.
pub const DEFAULT_DIMENSION: usize = 768;

/// Remote embedding provider.
///
/// Empty input strings are never sent; they map to zero vectors locally.
pub struct OllamaEmbedder {
    /// `ollama:<model>`, so persisted indexes are tied to the model.
    name: String,
    base_url: String,
    model: String,
    dimension: usize,
    client: reqwest::Client,
}

impl OllamaEmbedder {
    /// Create a provider for `model` served at `base_url`.
    pub fn new(base_url: &str, model: &str, dimension: usize) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()?;
        Ok(Self {
            name: format!("ollama:{model}"),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dimension,
            client,
        })
    }
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let mut out = vec![vec![0.0f32; self.dimension]; texts.len()];

        let pending: Vec<(usize, &str)> = texts
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.trim().is_empty())
            .map(|(i, t)| (i, t.as_str()))
            .collect();
        if pending.is_empty() {
            return Ok(out);
        }

        let inputs: Vec<&str> = pending.iter().map(|(_, t)| *t).collect();
        debug!(
            model = %self.model,
            count = inputs.len(),
            "Requesting embeddings"
        );

        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&serde_json::json!({
                "model": self.model,
                "input": inputs,
            }))
            .send()
            .await
            .map_err(|e| DraftError::Embedding(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DraftError::Embedding(format!(
                "backend returned {status}: {}",
                crate::generation::preview(&body, 200)
            )));
        }

        let payload: EmbedResponse = response
            .json()
            .await
            .map_err(|e| DraftError::Embedding(format!("malformed response: {e}")))?;

        if payload.embeddings.len() != pending.len() {
            return Err(DraftError::Embedding(format!(
                "expected {} vectors, got {}",
                pending.len(),
                payload.embeddings.len()
            )));
        }

        for ((slot, _), vector) in pending.iter().zip(payload.embeddings) {
            if vector.len() != self.dimension {
                return Err(DraftError::DimensionMismatch {
                    expected: self.dimension,
                    actual: vector.len(),
                });
            }
            out[*slot] = vector;
        }

        Ok(out)
    }
}
