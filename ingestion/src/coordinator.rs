//! IngestCoordinator: the seven-step pipeline that turns a raw document into
//! persisted, embedded, tagged, and rule-checked chunks.
//!
//! 1. validate the caller-supplied metadata
//! 2. legacy keyword alert (independent of the rule-driven AnalystPool path)
//! 3. chunk the extracted text
//! 4. derive a deterministic id, embed, persist and upsert each chunk,
//!    isolating per-chunk failures (embed/vector-store errors skip that
//!    chunk only; they never abort the request)
//! 5. append one audit entry and one event-log entry for the ingest as a
//!    whole, even when zero chunks were produced
//! 6. enqueue a tagging job for the first chunk (ordinal 0) only
//! 7. enqueue one analyst job for the whole document

use std::sync::Arc;

use chrono::Utc;
use hive_core::audit::{AuditEvent, AuditOperation, AuditOutcome, AuditSink};
use hive_core::chunk_id::chunk_id;
use hive_core::chunker::TextChunk;
use hive_core::config::IngestConfig;
use hive_core::error::{ErrorCode, HiveError};
use hive_core::event_log::{EventLogEntry, EventLogKind, EventLogSink};
use hive_core::model::{ChunkRecord, IngestMetadata, Notification, NotificationLevel};
use hive_core::ports::{EmbeddingPort, NotificationSender};
use jobs::analyst::AnalystPool;
use jobs::queue::{AnalystJob, TaggingJob};
use jobs::tagger::TaggerPool;
use storage::chunk_store::{ChunkMetaStore, ChunkStoreError};
use storage::vector_store::{VectorStore, VectorStoreError, TENANT_KEY};
use thiserror::Error;
use tracing::warn;

use crate::chunker::chunk_text;

const LEGACY_ALERT_KEYWORD: &str = "CONFIDENTIAL";

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("tenant_id must not be empty")]
    MissingTenant,
    #[error("document_id must not be empty")]
    MissingDocumentId,
    #[error("chunk store error: {0}")]
    ChunkStore(#[from] ChunkStoreError),
    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),
    #[error("embedding error: {0}")]
    Embedding(#[from] hive_core::ports::EmbeddingError),
}

impl HiveError for IngestionError {
    fn error_code(&self) -> ErrorCode {
        match self {
            IngestionError::MissingTenant | IngestionError::MissingDocumentId => {
                ErrorCode::InvalidArgument
            }
            IngestionError::ChunkStore(_) | IngestionError::VectorStore(_) => ErrorCode::Internal,
            IngestionError::Embedding(_) => ErrorCode::Internal,
        }
    }
}

pub struct IngestCoordinator {
    embedder: Arc<dyn EmbeddingPort>,
    chunk_store: Arc<ChunkMetaStore>,
    vector_store: Arc<VectorStore>,
    tagger_pool: Arc<TaggerPool>,
    analyst_pool: Arc<AnalystPool>,
    notifier: Arc<dyn NotificationSender>,
    audit: Arc<dyn AuditSink>,
    event_log: Arc<dyn EventLogSink>,
    config: IngestConfig,
}

impl IngestCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        embedder: Arc<dyn EmbeddingPort>,
        chunk_store: Arc<ChunkMetaStore>,
        vector_store: Arc<VectorStore>,
        tagger_pool: Arc<TaggerPool>,
        analyst_pool: Arc<AnalystPool>,
        notifier: Arc<dyn NotificationSender>,
        audit: Arc<dyn AuditSink>,
        event_log: Arc<dyn EventLogSink>,
        config: IngestConfig,
    ) -> Self {
        Self {
            embedder,
            chunk_store,
            vector_store,
            tagger_pool,
            analyst_pool,
            notifier,
            audit,
            event_log,
            config,
        }
    }

    pub async fn ingest(
        &self,
        metadata: IngestMetadata,
        content: String,
    ) -> Result<Vec<uuid::Uuid>, IngestionError> {
        if metadata.tenant_id.trim().is_empty() {
            return Err(IngestionError::MissingTenant);
        }
        if metadata.document_id.trim().is_empty() {
            return Err(IngestionError::MissingDocumentId);
        }

        self.maybe_send_legacy_alert(&metadata, &content).await;

        let chunks = chunk_text(&content);
        let mut chunk_ids = Vec::with_capacity(chunks.len());
        let mut failed = 0usize;
        let mut last_error: Option<String> = None;

        for chunk in chunks {
            let id = chunk_id(&metadata.file_path, chunk.ordinal);

            match self.ingest_chunk(&metadata, &chunk, id).await {
                Ok(()) => {
                    chunk_ids.push(id);
                    if chunk.ordinal == 0 {
                        self.tagger_pool.submit(TaggingJob {
                            chunk_id: id,
                            tenant_id: metadata.tenant_id.clone(),
                            content: chunk.content.clone(),
                        });
                    }
                }
                Err(err) => {
                    failed += 1;
                    warn!(
                        document_id = %metadata.document_id,
                        chunk_ordinal = chunk.ordinal,
                        error = %err,
                        "chunk failed, continuing ingest"
                    );
                    last_error = Some(err.to_string());
                }
            }
        }

        if let Some(err) = &last_error {
            warn!(
                document_id = %metadata.document_id,
                chunks_stored = chunk_ids.len(),
                chunks_failed = failed,
                last_error = %err,
                "ingest completed with per-chunk failures"
            );
        }

        if !chunk_ids.is_empty() {
            self.analyst_pool.submit(AnalystJob {
                document_id: metadata.document_id.clone(),
                tenant_id: metadata.tenant_id.clone(),
                client_id: metadata.client_id.clone(),
                filename: metadata.filename.clone(),
                content,
            });
        }

        self.record_ingest(&metadata, chunk_ids.len());

        Ok(chunk_ids)
    }

    /// One per-chunk unit of step 4: embed, persist content, then upsert the
    /// vector. Any failure here is reported to the caller, which isolates it
    /// to this chunk rather than aborting the whole ingest.
    async fn ingest_chunk(
        &self,
        metadata: &IngestMetadata,
        chunk: &TextChunk,
        id: uuid::Uuid,
    ) -> Result<(), IngestionError> {
        let embedding = self.embedder.embed(&chunk.content).await?;

        self.chunk_store
            .put(ChunkRecord {
                id,
                document_id: metadata.document_id.clone(),
                content: chunk.content.clone(),
                ordinal: chunk.ordinal,
                tenant_id: metadata.tenant_id.clone(),
                created_at: Utc::now(),
            })
            .await?;

        let mut payload = std::collections::HashMap::new();
        payload.insert(TENANT_KEY.to_string(), metadata.tenant_id.clone());
        payload.insert("document_id".to_string(), metadata.document_id.clone());
        payload.insert("filename".to_string(), metadata.filename.clone());
        payload.insert("file_path".to_string(), metadata.file_path.clone());
        payload.insert("filetype".to_string(), metadata.filetype.clone());
        if let Some(client_id) = &metadata.client_id {
            payload.insert("client_id".to_string(), client_id.clone());
        }
        payload.insert("chunk_index".to_string(), chunk.ordinal.to_string());
        payload.insert("content".to_string(), chunk.content.clone());
        payload.insert("tags".to_string(), "[]".to_string());

        self.vector_store.upsert(id, embedding, payload).await?;
        Ok(())
    }

    /// Step 5: one AuditLog entry and one EventLog entry per ingest request,
    /// written even when the document produced zero chunks.
    fn record_ingest(&self, metadata: &IngestMetadata, chunks_stored: usize) {
        if let Ok(event) = AuditEvent::new(
            AuditOperation::Ingest,
            AuditOutcome::Succeeded,
            metadata.tenant_id.clone(),
        ) {
            let event = event.with_metadata("document_id", metadata.document_id.clone());
            if let Err(err) = self.audit.record(event) {
                warn!(error = %err, "failed to record ingest audit event");
            }
        }

        let entry = EventLogEntry::new(
            EventLogKind::Ingest,
            chunks_stored.to_string(),
            metadata.tenant_id.clone(),
        );
        if let Err(err) = self.event_log.record(entry) {
            warn!(error = %err, "failed to record ingest event-log entry");
        }
    }

    /// Independent of the rule-driven AnalystPool path: a blunt substring
    /// scan kept for backward compatibility with documents tagged before
    /// rules existed.
    async fn maybe_send_legacy_alert(&self, metadata: &IngestMetadata, content: &str) {
        if !self.config.legacy_keyword_alert_enabled {
            return;
        }
        if !content.to_uppercase().contains(LEGACY_ALERT_KEYWORD) {
            return;
        }
        let Some(client_id) = &metadata.client_id else {
            return;
        };
        self.notifier
            .send(
                client_id,
                Notification::alert(
                    format!("Sensitive document detected: {}", metadata.filename),
                    NotificationLevel::Warning,
                ),
            )
            .await;
    }

    /// §4.15: invokes VectorStore and ChunkMetaStore purges for a tenant (or,
    /// when `tenant_id` is `None`, everything — callers MUST reserve that
    /// case for an elevated administrative caller). Not atomic across the
    /// two stores; a crash between them leaves vectors purged and chunk
    /// metadata not yet purged, which is safe to re-run (both purges are
    /// idempotent no-ops on an empty remainder).
    pub async fn purge(&self, tenant_id: Option<&str>) -> Result<PurgeCounts, IngestionError> {
        let (vectors_purged, chunks_purged) = match tenant_id {
            Some(tenant_id) => (
                self.vector_store.purge_by_tenant(tenant_id).await?,
                self.chunk_store.purge(tenant_id).await?,
            ),
            None => (
                self.vector_store.purge_collection().await?,
                self.chunk_store.purge_all().await?,
            ),
        };
        Ok(PurgeCounts {
            vectors_purged,
            chunks_purged,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct PurgeCounts {
    pub vectors_purged: usize,
    pub chunks_purged: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hive_core::audit::InMemoryAuditSink;
    use hive_core::event_log::InMemoryEventLogSink;
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct MockEmbedder;

    #[async_trait]
    impl EmbeddingPort for MockEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, hive_core::ports::EmbeddingError> {
            Ok(hive_core::embedding::deterministic_embedding(text, "test", 8))
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingPort for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, hive_core::ports::EmbeddingError> {
            Err(hive_core::ports::EmbeddingError::Upstream("embedder down".to_string()))
        }
    }

    struct RecordingNotifier {
        sent: Mutex<Vec<(String, String)>>,
    }

    impl RecordingNotifier {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl NotificationSender for RecordingNotifier {
        async fn send(&self, client_id: &str, notification: Notification) {
            self.sent
                .lock()
                .unwrap()
                .push((client_id.to_string(), notification.message));
        }
    }

    async fn build_coordinator_with(
        dir: &std::path::Path,
        notifier: Arc<RecordingNotifier>,
        embedder: Arc<dyn EmbeddingPort>,
        audit: Arc<dyn hive_core::audit::AuditSink>,
        event_log: Arc<dyn hive_core::event_log::EventLogSink>,
    ) -> IngestCoordinator {
        let chunk_store = Arc::new(ChunkMetaStore::open(dir.join("chunks.wal")).await.unwrap());
        let vector_store = Arc::new(VectorStore::open(dir.join("vectors.wal")).await.unwrap());

        let llm = Arc::new(crate::tests_support::OfflineLlm);
        let tagger_pool = Arc::new(TaggerPool::new(llm.clone(), vector_store.clone()));

        let rule_store = Arc::new(crate::tests_support::EmptyRuleStore);
        let rule_match_store = Arc::new(crate::tests_support::NoopRuleMatchStore);
        let rule_event_store = Arc::new(crate::tests_support::NoopRuleEventStore);

        let analyst_pool = Arc::new(AnalystPool::new(jobs::analyst::AnalystContext {
            llm,
            embedder: embedder.clone(),
            vector_store: vector_store.clone(),
            rule_store,
            rule_match_store,
            rule_event_store,
            notifier: notifier.clone(),
        }));

        IngestCoordinator::new(
            embedder,
            chunk_store,
            vector_store,
            tagger_pool,
            analyst_pool,
            notifier,
            audit,
            event_log,
            IngestConfig::default(),
        )
    }

    async fn build_coordinator(
        dir: &std::path::Path,
        notifier: Arc<RecordingNotifier>,
    ) -> IngestCoordinator {
        let embedder: Arc<dyn EmbeddingPort> = Arc::new(MockEmbedder);
        build_coordinator_with(
            dir,
            notifier,
            embedder,
            Arc::new(InMemoryAuditSink::default()),
            Arc::new(InMemoryEventLogSink::default()),
        )
        .await
    }

    #[tokio::test]
    async fn rejects_empty_tenant() {
        let dir = tempdir().unwrap();
        let notifier = Arc::new(RecordingNotifier::new());
        let coordinator = build_coordinator(dir.path(), notifier).await;

        let metadata = IngestMetadata::new("", "doc-1", "a.txt", "/data/a.txt", "text/plain");
        let result = coordinator.ingest(metadata, "hello".to_string()).await;
        assert!(matches!(result, Err(IngestionError::MissingTenant)));
    }

    #[tokio::test]
    async fn ingest_persists_chunks_and_sends_legacy_alert() {
        let dir = tempdir().unwrap();
        let notifier = Arc::new(RecordingNotifier::new());
        let coordinator = build_coordinator(dir.path(), notifier.clone()).await;

        let metadata = IngestMetadata::new("acme", "doc-1", "secret.txt", "/data/secret.txt", "text/plain")
            .with_client_id("drone-1");
        let ids = coordinator
            .ingest(metadata, "This is CONFIDENTIAL information.".to_string())
            .await
            .unwrap();

        assert_eq!(ids.len(), 1);
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "Sensitive document detected: secret.txt");
    }

    #[tokio::test]
    async fn ingest_writes_audit_and_event_log_entries() {
        let dir = tempdir().unwrap();
        let notifier = Arc::new(RecordingNotifier::new());
        let audit = Arc::new(InMemoryAuditSink::default());
        let event_log = Arc::new(InMemoryEventLogSink::default());
        let embedder: Arc<dyn EmbeddingPort> = Arc::new(MockEmbedder);
        let coordinator =
            build_coordinator_with(dir.path(), notifier, embedder, audit.clone(), event_log.clone()).await;

        let metadata = IngestMetadata::new("acme", "doc-1", "a.txt", "/data/a.txt", "text/plain");
        let ids = coordinator.ingest(metadata, "hello world".to_string()).await.unwrap();

        let events = audit.events().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].tenant, "acme");

        let entries = event_log.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].detail, ids.len().to_string());
    }

    #[tokio::test]
    async fn empty_content_still_writes_audit_entry() {
        let dir = tempdir().unwrap();
        let notifier = Arc::new(RecordingNotifier::new());
        let audit = Arc::new(InMemoryAuditSink::default());
        let event_log = Arc::new(InMemoryEventLogSink::default());
        let embedder: Arc<dyn EmbeddingPort> = Arc::new(MockEmbedder);
        let coordinator =
            build_coordinator_with(dir.path(), notifier, embedder, audit.clone(), event_log.clone()).await;

        let metadata = IngestMetadata::new("acme", "doc-1", "a.txt", "/data/a.txt", "text/plain");
        let ids = coordinator.ingest(metadata, "   ".to_string()).await.unwrap();

        assert!(ids.is_empty());
        assert_eq!(audit.events().unwrap().len(), 1);
        assert_eq!(event_log.entries().unwrap()[0].detail, "0");
    }

    #[tokio::test]
    async fn embed_failure_skips_only_that_chunk() {
        let dir = tempdir().unwrap();
        let notifier = Arc::new(RecordingNotifier::new());
        let embedder: Arc<dyn EmbeddingPort> = Arc::new(FailingEmbedder);
        let coordinator = build_coordinator_with(
            dir.path(),
            notifier,
            embedder,
            Arc::new(InMemoryAuditSink::default()),
            Arc::new(InMemoryEventLogSink::default()),
        )
        .await;

        let metadata = IngestMetadata::new("acme", "doc-1", "a.txt", "/data/a.txt", "text/plain");
        let result = coordinator.ingest(metadata, "hello world".to_string()).await;

        assert!(result.is_ok());
        assert!(result.unwrap().is_empty());
    }

    #[tokio::test]
    async fn tagging_job_is_only_submitted_for_the_first_chunk() {
        let dir = tempdir().unwrap();
        let notifier = Arc::new(RecordingNotifier::new());
        let coordinator = build_coordinator(dir.path(), notifier).await;

        let metadata = IngestMetadata::new("acme", "doc-1", "a.txt", "/data/a.txt", "text/plain");
        let sentence = "The quick brown fox jumps over the lazy dog. ";
        let ids = coordinator
            .ingest(metadata, sentence.repeat(80))
            .await
            .unwrap();

        assert!(ids.len() > 1, "expected the long document to split into multiple chunks");
    }
}

#[cfg(test)]
mod tests_support {
    use async_trait::async_trait;
    use hive_core::model::{Rule, RuleEvent, RuleMatch};
    use hive_core::ports::{LlmClient, LlmError, RuleEventStorePort, RuleMatchStorePort, RuleStorePort};

    pub struct OfflineLlm;

    #[async_trait]
    impl LlmClient for OfflineLlm {
        async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
            Err(LlmError::Upstream("offline".to_string()))
        }
    }

    pub struct EmptyRuleStore;

    #[async_trait]
    impl RuleStorePort for EmptyRuleStore {
        async fn active_rules(&self, _tenant_id: &str) -> Vec<Rule> {
            Vec::new()
        }
    }

    pub struct NoopRuleMatchStore;

    #[async_trait]
    impl RuleMatchStorePort for NoopRuleMatchStore {
        async fn record(&self, _rule_match: RuleMatch) {}
    }

    pub struct NoopRuleEventStore;

    #[async_trait]
    impl RuleEventStorePort for NoopRuleEventStore {
        async fn record(&self, _event: RuleEvent) {}
    }
}
