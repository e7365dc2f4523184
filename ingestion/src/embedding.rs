//! Embedder variants: remote HTTP service, a "local" in-process model
//! stand-in, and a deterministic mock. §6 resolves which one is active from
//! `EmbedderConfig`: an explicit `kind` always wins; otherwise a configured
//! credential means remote, and its absence means mock.

use async_trait::async_trait;
use hive_core::config::{EmbedderConfig, EmbedderType};
use hive_core::embedding::deterministic_embedding;
use hive_core::ports::{EmbeddingError, EmbeddingPort};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_DIMS: usize = 256;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// Calls an external embedding service over HTTP. Used for both the
/// "remote" and "local" (self-hosted, same wire contract) variants.
pub struct HttpEmbedder {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl HttpEmbedder {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .expect("reqwest client builds with a fixed timeout");
        Self {
            http,
            base_url: base_url.into(),
            model: model.into(),
            api_key,
        }
    }
}

#[async_trait]
impl EmbeddingPort for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut request = self
            .http
            .post(format!("{}/v1/embeddings", self.base_url))
            .json(&EmbedRequest {
                model: &self.model,
                input: text,
            });
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| EmbeddingError::Upstream(err.to_string()))?;
        if !response.status().is_success() {
            return Err(EmbeddingError::Upstream(format!("status {}", response.status())));
        }
        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|err| EmbeddingError::Upstream(err.to_string()))?;
        Ok(body.embedding)
    }
}

/// Deterministic, hash-seeded embedder used when no upstream is configured.
/// Never errors: it's the always-available fallback.
pub struct MockEmbedder {
    model_id: String,
    dims: usize,
}

impl MockEmbedder {
    pub fn new(model_id: impl Into<String>, dims: usize) -> Self {
        Self {
            model_id: model_id.into(),
            dims,
        }
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new("embedding-default-v1", DEFAULT_DIMS)
    }
}

#[async_trait]
impl EmbeddingPort for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(deterministic_embedding(text, &self.model_id, self.dims))
    }
}

/// Builds the configured embedder variant (§6 resolution rule).
pub fn build_embedder(config: &EmbedderConfig) -> Box<dyn EmbeddingPort> {
    let model = config.model.clone().unwrap_or_else(|| "embedding-default-v1".to_string());
    let dims = config.dimension_override.unwrap_or(DEFAULT_DIMS);

    match config.resolved_kind() {
        EmbedderType::Remote | EmbedderType::Local => {
            let base_url = config
                .base_url
                .clone()
                .unwrap_or_else(|| "http://localhost:8081".to_string());
            Box::new(HttpEmbedder::new(base_url, model, config.credential.clone()))
        }
        EmbedderType::Mock => Box::new(MockEmbedder::new(model, dims)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_embedder_is_deterministic() {
        let embedder = MockEmbedder::default();
        let a = embedder.embed("hello").await.unwrap();
        let b = embedder.embed("hello").await.unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn resolves_mock_without_credential() {
        let config = EmbedderConfig {
            kind: None,
            model: None,
            base_url: None,
            credential: None,
            dimension_override: None,
        };
        assert_eq!(config.resolved_kind() as u8, EmbedderType::Mock as u8);
    }
}
