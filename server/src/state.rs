//! Composition root: builds every concrete adapter named in the core ports
//! and wires them into the coordinators that the HTTP/WS surface drives.
//! Mirrors how `core/src/lib.rs`'s `init_tracing` and `AppConfig::load`
//! are meant to be called once from a binary's `main`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use hive_core::auth::InMemoryApiKeyStore;
use hive_core::config::{AppConfig, EmbedderType};
use hive_core::metrics::MetricsCollector;
use hive_core::ports::{EmbeddingPort, GraphStorePort, LlmClient, NotificationSender};
use jobs::analyst::{AnalystContext, AnalystPool, ContradictionDetector};
use jobs::tagger::TaggerPool;
use query::rules::{RuleEventStore, RuleMatchStore, RuleStore};
use query::QueryEngine;
use slm::llm::{OfflineLlmClient, RemoteLlmClient, RemoteLlmConfig};
use storage::chunk_store::ChunkMetaStore;
use storage::graph_store::GraphStore;
use storage::vector_store::VectorStore;

const METRICS_HISTORY: usize = 1000;

pub struct AppState {
    pub config: AppConfig,
    pub ingest_coordinator: Arc<ingestion::coordinator::IngestCoordinator>,
    pub query_engine: Arc<QueryEngine>,
    pub contradiction_detector: Arc<ContradictionDetector>,
    pub push_hub: Arc<push::PushHub>,
    pub api_keys: Arc<InMemoryApiKeyStore>,
    pub rule_store: Arc<RuleStore>,
    pub rule_match_store: Arc<RuleMatchStore>,
    pub rule_event_store: Arc<RuleEventStore>,
    pub metrics: Arc<MetricsCollector>,
    pub audit: Arc<dyn hive_core::audit::AuditSink>,
    pub event_log: Arc<dyn hive_core::event_log::EventLogSink>,
}

impl AppState {
    pub async fn build(config: AppConfig) -> anyhow::Result<Self> {
        let data_dir = PathBuf::from(&config.storage.data_dir);
        tokio::fs::create_dir_all(&data_dir).await?;

        let chunk_store = Arc::new(ChunkMetaStore::open(data_dir.join("chunks.wal")).await?);
        let vector_store = Arc::new(VectorStore::open(data_dir.join("vectors.wal")).await?);
        let graph_store: Arc<GraphStore> = Arc::new(GraphStore::open(data_dir.join("graph.wal")).await?);
        let graph_store_port: Arc<dyn GraphStorePort> = graph_store.clone();

        let embedder: Arc<dyn EmbeddingPort> = ingestion::embedding::build_embedder(&config.embedder).into();
        let llm: Arc<dyn LlmClient> = build_llm_client(&config);

        let rule_store = Arc::new(RuleStore::new());
        let rule_match_store = Arc::new(RuleMatchStore::new());
        let rule_event_store = Arc::new(RuleEventStore::new());

        let mailbox = Arc::new(push::Mailbox::new(Duration::from_secs(
            config.push.mailbox_ttl_days * 24 * 60 * 60,
        )));
        let push_hub = Arc::new(push::PushHub::new(mailbox));
        let notifier: Arc<dyn NotificationSender> = push_hub.clone();

        let tagger_pool = Arc::new(TaggerPool::with_workers(
            llm.clone(),
            vector_store.clone(),
            config.worker_pools.tagger_workers,
        ));
        let analyst_pool = Arc::new(AnalystPool::with_workers(
            AnalystContext {
                llm: llm.clone(),
                embedder: embedder.clone(),
                vector_store: vector_store.clone(),
                rule_store: rule_store.clone(),
                rule_match_store: rule_match_store.clone(),
                rule_event_store: rule_event_store.clone(),
                notifier: notifier.clone(),
            },
            config.worker_pools.analyst_workers,
        ));
        let contradiction_detector = Arc::new(ContradictionDetector::new(
            llm.clone(),
            embedder.clone(),
            vector_store.clone(),
            graph_store_port,
        ));

        let audit: Arc<dyn hive_core::audit::AuditSink> =
            Arc::new(hive_core::audit::JsonlAuditSink::open(data_dir.join("audit.jsonl"))?);
        let event_log: Arc<dyn hive_core::event_log::EventLogSink> =
            Arc::new(hive_core::event_log::JsonlEventLogSink::open(data_dir.join("events.jsonl"))?);

        let ingest_coordinator = Arc::new(ingestion::coordinator::IngestCoordinator::new(
            embedder.clone(),
            chunk_store,
            vector_store.clone(),
            tagger_pool,
            analyst_pool,
            notifier,
            audit.clone(),
            event_log.clone(),
            config.ingest.clone(),
        ));

        let query_engine = Arc::new(QueryEngine::new(embedder, vector_store, graph_store));

        let api_keys = Arc::new(InMemoryApiKeyStore::new());
        let metrics = Arc::new(MetricsCollector::new(METRICS_HISTORY));

        Ok(Self {
            config,
            ingest_coordinator,
            query_engine,
            contradiction_detector,
            push_hub,
            api_keys,
            rule_store,
            rule_match_store,
            rule_event_store,
            metrics,
            audit,
            event_log,
        })
    }
}

/// Per SPEC_FULL.md §B: no dedicated LLM config section exists beyond the
/// embedder's, so the LLM client is resolved the same way — `remote` when a
/// credential is configured, `offline` keyword-only fallback otherwise.
fn build_llm_client(config: &AppConfig) -> Arc<dyn LlmClient> {
    let embedder_cfg = &config.embedder;
    match embedder_cfg.resolved_kind() {
        EmbedderType::Remote => {
            let Some(credential) = embedder_cfg.credential.clone() else {
                return Arc::new(OfflineLlmClient);
            };
            let base_url = embedder_cfg
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com".to_string());
            let model = embedder_cfg.model.clone().unwrap_or_else(|| "gpt-4".to_string());
            Arc::new(RemoteLlmClient::new(RemoteLlmConfig {
                base_url,
                model,
                api_key: credential,
                timeout: Duration::from_secs(30),
            }))
        }
        EmbedderType::Local | EmbedderType::Mock => Arc::new(OfflineLlmClient),
    }
}
