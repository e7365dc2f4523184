//! `DroneClient` (§4.13/§6): posts whole-document content to the server's
//! `POST /api/v1/ingest`, matching `ingestion::api::IngestPayload`'s wire
//! shape. The watcher still chunks locally (see `watcher.rs`) to know the
//! deterministic chunk-ids it's about to produce, but upload is
//! document-level: the server re-derives the identical chunk-ids from
//! `(file_path, index)` and re-chunks, so re-ingesting the same file is
//! idempotent regardless of which side performs the split.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize)]
pub struct IngestRequest {
    pub tenant_id: String,
    pub document_id: String,
    pub filename: String,
    pub file_path: String,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default)]
    pub extras: HashMap<String, String>,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestResponse {
    pub status: String,
    pub chunks_total: usize,
    pub chunks_stored: usize,
}

#[derive(Debug, Error)]
pub enum DroneClientError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Upstream { status: u16, body: String },
}

pub struct DroneClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl DroneClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }

    /// Uploads one file's worth of content. `document_id` defaults to
    /// `file_path`, which uniquely identifies the document for the
    /// deterministic chunk-id derivation.
    pub async fn ingest(
        &self,
        tenant_id: &str,
        file_path: &str,
        filename: &str,
        mime_type: &str,
        client_id: Option<&str>,
        content: String,
    ) -> Result<IngestResponse, DroneClientError> {
        let request = IngestRequest {
            tenant_id: tenant_id.to_string(),
            document_id: file_path.to_string(),
            filename: filename.to_string(),
            file_path: file_path.to_string(),
            mime_type: mime_type.to_string(),
            client_id: client_id.map(|s| s.to_string()),
            extras: HashMap::new(),
            content,
        };

        let mut builder = self
            .http
            .post(format!("{}/api/v1/ingest", self.base_url))
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DroneClientError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<IngestResponse>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_with_document_id_set_to_file_path() {
        let request = IngestRequest {
            tenant_id: "acme".to_string(),
            document_id: "/data/a.txt".to_string(),
            filename: "a.txt".to_string(),
            file_path: "/data/a.txt".to_string(),
            mime_type: "text/plain".to_string(),
            client_id: Some("drone-1".to_string()),
            extras: HashMap::new(),
            content: "hello".to_string(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["document_id"], "/data/a.txt");
        assert_eq!(json["client_id"], "drone-1");
    }
}
