//! Ollama-compatible `/api/generate` backend and model provisioning.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use super::{preview, GenerationBackend, GenerationError};

/// Characters of an error body kept in [`GenerationError::Status`].
const ERROR_BODY_CHARS: usize = 200;

/// HTTP client for an Ollama-compatible server.
pub struct OllamaBackend {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaBackend {
    /// Backend at `base_url`; each request times out after `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Register `model` as `base_model` with a fixed system prompt (`/api/create`).
    pub async fn create_model(
        &self,
        model: &str,
        base_model: &str,
        system: &str,
    ) -> Result<(), GenerationError> {
        info!(model, base_model, "Creating assistant model");
        let response = self
            .client
            .post(format!("{}/api/create", self.base_url))
            .json(&serde_json::json!({
                "model": model,
                "from": base_model,
                "system": system,
                "stream": false,
            }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: preview(&body, ERROR_BODY_CHARS),
            });
        }
        debug!(response = %preview(&body, ERROR_BODY_CHARS), "Model created");
        Ok(())
    }
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, GenerationError> {
        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&serde_json::json!({
                "model": model,
                "prompt": prompt,
                "stream": false,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: preview(&body, ERROR_BODY_CHARS),
            });
        }

        let body = response.text().await?;
        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| GenerationError::Malformed(format!("{e}: {}", preview(&body, 100))))?;
        Ok(parsed.response)
    }
}
