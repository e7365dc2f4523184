//! Collaborator seams referenced by the job pools (`TaggerPool`, `AnalystPool`,
//! `ContradictionDetector`) and the push gateway. Concrete implementations
//! live in their owning crates (`slm`, `storage`, `query`, `push`) and are
//! wired together as trait objects at the application's composition root
//! (`server`), so no orchestration crate depends on another's concrete types.

use crate::model::{GraphEdgeRecord, Notification, Rule, RuleEvent, RuleMatch};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("llm upstream error: {0}")]
    Upstream(String),
    #[error("llm response could not be parsed")]
    Unparseable,
}

/// Polymorphic LLM client: a remote HTTP-backed implementation and a
/// deterministic offline/keyword-fallback implementation share this shape,
/// mirroring the Embedder's {remote, local, mock} variants.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Delivery of a notification to a specific drone client-id. Implemented by
/// `PushHub`; online delivery vs. mailbox fallback is entirely the
/// implementation's concern.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, client_id: &str, notification: Notification);
}

#[derive(Error, Debug)]
pub enum GraphStoreError {
    #[error("self-edges are not allowed ({0} -> {0})")]
    SelfEdge(String),
    #[error("graph store backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait GraphStorePort: Send + Sync {
    async fn add_edge(&self, edge: GraphEdgeRecord) -> Result<(), GraphStoreError>;
}

#[async_trait]
pub trait RuleStorePort: Send + Sync {
    async fn active_rules(&self, tenant_id: &str) -> Vec<Rule>;
}

#[async_trait]
pub trait RuleMatchStorePort: Send + Sync {
    async fn record(&self, rule_match: RuleMatch);
}

#[async_trait]
pub trait RuleEventStorePort: Send + Sync {
    async fn record(&self, event: RuleEvent);
}

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("embedding upstream error: {0}")]
    Upstream(String),
}

/// Turns free text into a fixed-dimension vector for similarity search.
/// Implemented by `ingestion`'s remote/local/mock Embedder variants; the
/// analyst pools depend on this trait object instead of on `ingestion`
/// directly, so retrieval-by-similarity doesn't become a crate cycle.
#[async_trait]
pub trait EmbeddingPort: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}
