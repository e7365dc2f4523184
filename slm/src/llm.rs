//! LLM client variants. Mirrors the Embedder's {remote, mock} split: a
//! request-response HTTP client for production, and a deterministic
//! "offline" stand-in that always reports unavailable so callers exercise
//! their documented keyword fallback without needing network access.

use async_trait::async_trait;
use hive_core::ports::{LlmClient, LlmError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RemoteLlmConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub timeout: Duration,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    text: String,
}

pub struct RemoteLlmClient {
    http: reqwest::Client,
    config: RemoteLlmConfig,
}

impl RemoteLlmClient {
    pub fn new(config: RemoteLlmConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("reqwest client builds with a fixed timeout");
        Self { http, config }
    }
}

#[async_trait]
impl LlmClient for RemoteLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let response = self
            .http
            .post(format!("{}/v1/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&CompletionRequest {
                model: &self.config.model,
                prompt,
            })
            .send()
            .await
            .map_err(|err| LlmError::Upstream(err.to_string()))?;

        if !response.status().is_success() {
            return Err(LlmError::Upstream(format!(
                "status {}",
                response.status()
            )));
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|err| LlmError::Upstream(err.to_string()))?;
        Ok(body.text)
    }
}

/// Always-unavailable client. Used when no upstream credential is
/// configured, so the analyst/tagger pools deterministically exercise their
/// keyword fallbacks (§7 `LLMUnavailable`).
pub struct OfflineLlmClient;

#[async_trait]
impl LlmClient for OfflineLlmClient {
    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::Upstream("offline mode: no LLM configured".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn offline_client_always_errors() {
        let client = OfflineLlmClient;
        assert!(client.complete("anything").await.is_err());
    }
}
