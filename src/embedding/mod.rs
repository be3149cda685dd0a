//! Text embeddings.
//!
//! An [`EmbeddingProvider`] maps texts to fixed-dimension vectors. Providers
//! are constructed once at startup and injected wherever vectors are needed.
//!
//! - [`HashingEmbedder`]: local feature-hashing embedder, deterministic and
//!   dependency-free. The default.
//! - [`OllamaEmbedder`]: calls an Ollama-compatible `/api/embed` endpoint.

pub mod hashing;
pub mod ollama;

use async_trait::async_trait;

use crate::config::EmbeddingConfig;
use crate::error::Result;

pub use hashing::HashingEmbedder;
pub use ollama::OllamaEmbedder;

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Maps texts to fixed-dimension vectors.
///
/// Contract: one vector per input, in input order, always of length
/// [`dimension`](Self::dimension). An empty input string yields an all-zero
/// vector rather than an error.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    /// Dimension of every vector this provider returns.
    fn dimension(&self) -> usize;

    /// Embed a batch of texts.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Embed a single text.
    async fn embed_one(&self, text: &str) -> Result<Embedding> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| crate::error::DraftError::Embedding("provider returned no vector".into()))
    }
}

/// Construct the provider selected in the configuration.
pub fn from_config(config: &EmbeddingConfig) -> anyhow::Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "hashing" => Ok(Box::new(HashingEmbedder::new(config.dimension()))),
        "ollama" => Ok(Box::new(OllamaEmbedder::new(
            &config.base_url,
            &config.model,
            config.dimension(),
        )?)),
        other => anyhow::bail!("Unknown embedding provider '{other}'. Supported: hashing, ollama"),
    }
}
