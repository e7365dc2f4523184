//! Wire payload for `POST /api/v1/ingest`: a JSON body with inline text, or
//! raw bytes plus a mime type for extraction (PDF/text/markdown/JSON).

use hive_core::model::IngestMetadata;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::extract::{detect_content_kind, extract_pdf_text, extract_utf8, ContentKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestPayload {
    pub tenant_id: String,
    pub document_id: String,
    pub filename: String,
    pub file_path: String,
    pub mime_type: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub extras: HashMap<String, String>,
    /// One of `content` (UTF-8 text) or `content_base64` (raw bytes) must be set.
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub content_base64: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("request carries neither content nor content_base64")]
    MissingContent,
    #[error("content_base64 is not valid base64")]
    InvalidBase64,
    #[error("content is not valid utf-8")]
    InvalidUtf8,
    #[error("unsupported content type: {0}")]
    UnsupportedType(String),
    #[error("content extraction failed for {0}")]
    ExtractionFailed(String),
}

impl IngestPayload {
    /// Resolves the payload into `(metadata, extracted text)`, decoding and
    /// extracting raw bytes according to `mime_type` when `content` isn't
    /// already plain text.
    pub fn into_metadata_and_text(self) -> Result<(IngestMetadata, String), PayloadError> {
        let mut metadata = IngestMetadata::new(
            self.tenant_id,
            self.document_id,
            self.filename.clone(),
            self.file_path,
            self.mime_type.clone(),
        );
        metadata.extras = self.extras;
        if let Some(client_id) = self.client_id {
            metadata = metadata.with_client_id(client_id);
        }

        if let Some(text) = self.content {
            return Ok((metadata, text));
        }

        let Some(encoded) = self.content_base64 else {
            return Err(PayloadError::MissingContent);
        };
        let bytes = base64_decode(&encoded).ok_or(PayloadError::InvalidBase64)?;

        let kind = detect_content_kind(&self.mime_type, Some(&self.filename));
        let text = match kind {
            ContentKind::Text | ContentKind::Markdown | ContentKind::Json => {
                extract_utf8(&bytes).map_err(|_| PayloadError::InvalidUtf8)?
            }
            ContentKind::Pdf => {
                extract_pdf_text(&bytes).ok_or_else(|| PayloadError::ExtractionFailed("pdf".to_string()))?
            }
            ContentKind::Unsupported => return Err(PayloadError::UnsupportedType(self.mime_type)),
        };

        Ok((metadata, text))
    }
}

/// Minimal, dependency-free base64 decoder (standard alphabet, with padding).
fn base64_decode(input: &str) -> Option<Vec<u8>> {
    fn value(byte: u8) -> Option<u8> {
        match byte {
            b'A'..=b'Z' => Some(byte - b'A'),
            b'a'..=b'z' => Some(byte - b'a' + 26),
            b'0'..=b'9' => Some(byte - b'0' + 52),
            b'+' => Some(62),
            b'/' => Some(63),
            _ => None,
        }
    }

    let input = input.trim().as_bytes();
    let mut out = Vec::with_capacity(input.len() / 4 * 3);
    let mut chunk = [0u8; 4];
    let mut chunk_len = 0;

    for &byte in input {
        if byte == b'=' {
            break;
        }
        if byte.is_ascii_whitespace() {
            continue;
        }
        chunk[chunk_len] = value(byte)?;
        chunk_len += 1;
        if chunk_len == 4 {
            out.push((chunk[0] << 2) | (chunk[1] >> 4));
            out.push((chunk[1] << 4) | (chunk[2] >> 2));
            out.push((chunk[2] << 6) | chunk[3]);
            chunk_len = 0;
        }
    }

    match chunk_len {
        0 => {}
        2 => out.push((chunk[0] << 2) | (chunk[1] >> 4)),
        3 => {
            out.push((chunk[0] << 2) | (chunk[1] >> 4));
            out.push((chunk[1] << 4) | (chunk[2] >> 2));
        }
        _ => return None,
    }

    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_text_content_passes_through() {
        let payload = IngestPayload {
            tenant_id: "acme".to_string(),
            document_id: "doc-1".to_string(),
            filename: "a.txt".to_string(),
            file_path: "/data/a.txt".to_string(),
            mime_type: "text/plain".to_string(),
            client_id: None,
            extras: HashMap::new(),
            content: Some("hello world".to_string()),
            content_base64: None,
        };
        let (metadata, text) = payload.into_metadata_and_text().unwrap();
        assert_eq!(metadata.tenant_id, "acme");
        assert_eq!(text, "hello world");
    }

    #[test]
    fn missing_content_is_an_error() {
        let payload = IngestPayload {
            tenant_id: "acme".to_string(),
            document_id: "doc-1".to_string(),
            filename: "a.txt".to_string(),
            file_path: "/data/a.txt".to_string(),
            mime_type: "text/plain".to_string(),
            client_id: None,
            extras: HashMap::new(),
            content: None,
            content_base64: None,
        };
        let result = payload.into_metadata_and_text();
        assert!(matches!(result, Err(PayloadError::MissingContent)));
    }

    #[test]
    fn base64_content_is_decoded_and_extracted() {
        let payload = IngestPayload {
            tenant_id: "acme".to_string(),
            document_id: "doc-1".to_string(),
            filename: "a.txt".to_string(),
            file_path: "/data/a.txt".to_string(),
            mime_type: "text/plain".to_string(),
            client_id: None,
            extras: HashMap::new(),
            content: None,
            content_base64: Some("aGVsbG8gd29ybGQ=".to_string()),
        };
        let (_, text) = payload.into_metadata_and_text().unwrap();
        assert_eq!(text, "hello world");
    }
}
