//! TaggerPool: derives up to 5 hashtag-style tags per ingested chunk, by
//! asking the configured LLM for a short JSON tag list and falling back to a
//! fixed keyword dictionary when the LLM is unavailable or its answer can't
//! be parsed.

use std::collections::HashMap;
use std::sync::Arc;

use hive_core::ports::LlmClient;
use serde::Deserialize;
use storage::vector_store::{VectorStore, TENANT_KEY};
use tracing::{debug, warn};

use crate::queue::TaggingJob;
use crate::worker_pool::WorkerPool;

const MAX_TAGS: usize = 5;
const DEFAULT_WORKERS: usize = 2;
const QUEUE_CAPACITY: usize = 100;

const KEYWORD_TAGS: &[(&[&str], &str)] = &[
    (&["legal", "law", "contract"], "#legal"),
    (&["invoice", "billing", "payment"], "#finance"),
    (&["urgent", "asap"], "#urgent"),
    (&["proposal", "quote"], "#proposal"),
    (&["confidential", "secret"], "#confidential"),
];

#[derive(Deserialize)]
struct TagResponse {
    tags: Vec<String>,
}

fn normalize_tag(tag: &str) -> String {
    let trimmed = tag.trim();
    if trimmed.starts_with('#') {
        trimmed.to_string()
    } else {
        format!("#{trimmed}")
    }
}

fn parse_llm_tags(raw: &str) -> Option<Vec<String>> {
    if let Ok(response) = serde_json::from_str::<TagResponse>(raw) {
        return Some(
            response
                .tags
                .iter()
                .map(|t| normalize_tag(t))
                .take(MAX_TAGS)
                .collect(),
        );
    }
    if let Ok(tags) = serde_json::from_str::<Vec<String>>(raw) {
        return Some(tags.iter().map(|t| normalize_tag(t)).take(MAX_TAGS).collect());
    }
    None
}

/// Exact §4.9 fallback: scan the content for the fixed keyword groups,
/// case-insensitively, emitting each group's tag at most once.
pub fn keyword_tags(content: &str) -> Vec<String> {
    let lower = content.to_lowercase();
    KEYWORD_TAGS
        .iter()
        .filter(|(keywords, _)| keywords.iter().any(|kw| lower.contains(kw)))
        .map(|(_, tag)| tag.to_string())
        .take(MAX_TAGS)
        .collect()
}

fn tagging_prompt(content: &str) -> String {
    format!(
        "Return a JSON array of at most {MAX_TAGS} short hashtag topics for this text:\n\n{content}"
    )
}

pub struct TaggerPool {
    inner: WorkerPool<TaggingJob>,
}

impl TaggerPool {
    pub fn new(llm: Arc<dyn LlmClient>, vector_store: Arc<VectorStore>) -> Self {
        Self::with_workers(llm, vector_store, DEFAULT_WORKERS)
    }

    pub fn with_workers(
        llm: Arc<dyn LlmClient>,
        vector_store: Arc<VectorStore>,
        workers: usize,
    ) -> Self {
        let inner = WorkerPool::spawn("tagger", workers, QUEUE_CAPACITY, move |job: TaggingJob| {
            let llm = llm.clone();
            let vector_store = vector_store.clone();
            async move {
                process_tagging_job(&llm, &vector_store, job).await;
            }
        });
        Self { inner }
    }

    pub fn submit(&self, job: TaggingJob) {
        self.inner.try_enqueue(job);
    }

    pub async fn shutdown(self) {
        self.inner.shutdown().await;
    }
}

async fn process_tagging_job(llm: &Arc<dyn LlmClient>, vector_store: &VectorStore, job: TaggingJob) {
    let tags = match llm.complete(&tagging_prompt(&job.content)).await {
        Ok(raw) => match parse_llm_tags(&raw) {
            Some(tags) if !tags.is_empty() => tags,
            _ => {
                debug!(chunk_id = %job.chunk_id, "llm tag response unparseable, using keyword fallback");
                keyword_tags(&job.content)
            }
        },
        Err(err) => {
            debug!(chunk_id = %job.chunk_id, error = %err, "llm unavailable, using keyword fallback");
            keyword_tags(&job.content)
        }
    };

    let mut payload = HashMap::new();
    payload.insert("tags".to_string(), tags.join(","));
    payload.insert(TENANT_KEY.to_string(), job.tenant_id.clone());

    if let Err(err) = vector_store.update_payload(job.chunk_id, payload).await {
        warn!(chunk_id = %job.chunk_id, error = %err, "failed to persist tags");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_tags_match_every_configured_group() {
        let content = "This contract is urgent, please review the invoice and the confidential proposal.";
        let tags = keyword_tags(content);
        assert!(tags.contains(&"#legal".to_string()));
        assert!(tags.contains(&"#finance".to_string()));
        assert!(tags.contains(&"#urgent".to_string()));
        assert!(tags.contains(&"#proposal".to_string()));
        assert!(tags.contains(&"#confidential".to_string()));
    }

    #[test]
    fn keyword_tags_empty_for_unrelated_text() {
        let tags = keyword_tags("The weather today is sunny and mild.");
        assert!(tags.is_empty());
    }

    #[test]
    fn normalize_tag_adds_missing_hash() {
        assert_eq!(normalize_tag("finance"), "#finance");
        assert_eq!(normalize_tag("#finance"), "#finance");
    }

    #[test]
    fn parse_llm_tags_accepts_object_or_bare_array() {
        let object = r#"{"tags": ["legal", "#urgent"]}"#;
        assert_eq!(
            parse_llm_tags(object).unwrap(),
            vec!["#legal".to_string(), "#urgent".to_string()]
        );

        let array = r#"["finance", "proposal"]"#;
        assert_eq!(
            parse_llm_tags(array).unwrap(),
            vec!["#finance".to_string(), "#proposal".to_string()]
        );
    }
}
