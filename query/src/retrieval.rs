//! Query RPC (§6): embeds the caller's query, ranks tenant-scoped chunks by
//! cosine similarity, and optionally walks the graph store out from the
//! matched documents to surface related documents.

use std::sync::Arc;

use hive_core::error::{ErrorCode, HiveError};
use hive_core::ports::{EmbeddingError, EmbeddingPort};
use serde::{Deserialize, Serialize};
use storage::graph_store::GraphStore;
use storage::vector_store::VectorStore;
use thiserror::Error;

const DEFAULT_TOP_K: usize = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    /// Over the wire this is optional: the HTTP binding derives it from the
    /// authenticated session and overwrites whatever the caller sent (§6 -
    /// "tenant is derived from the authenticated session"). Still required
    /// for direct, non-transport construction (as the existing tests do).
    #[serde(default)]
    pub tenant_id: String,
    pub query: String,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub expand_hops: Option<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkHit {
    pub chunk_id: uuid::Uuid,
    pub document_id: String,
    pub content: String,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelatedDocument {
    pub document_id: String,
    pub hops: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub chunks: Vec<ChunkHit>,
    pub related_documents: Vec<RelatedDocument>,
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("tenant_id must not be empty")]
    MissingTenant,
    #[error("query must not be empty")]
    EmptyQuery,
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
}

impl HiveError for QueryError {
    fn error_code(&self) -> ErrorCode {
        match self {
            QueryError::MissingTenant | QueryError::EmptyQuery => ErrorCode::InvalidArgument,
            QueryError::Embedding(_) => ErrorCode::Internal,
        }
    }
}

pub struct QueryEngine {
    embedder: Arc<dyn EmbeddingPort>,
    vector_store: Arc<VectorStore>,
    graph_store: Arc<GraphStore>,
}

impl QueryEngine {
    pub fn new(
        embedder: Arc<dyn EmbeddingPort>,
        vector_store: Arc<VectorStore>,
        graph_store: Arc<GraphStore>,
    ) -> Self {
        Self {
            embedder,
            vector_store,
            graph_store,
        }
    }

    pub async fn execute(&self, request: QueryRequest) -> Result<QueryResponse, QueryError> {
        if request.tenant_id.trim().is_empty() {
            return Err(QueryError::MissingTenant);
        }
        if request.query.trim().is_empty() {
            return Err(QueryError::EmptyQuery);
        }

        let top_k = request.top_k.unwrap_or(DEFAULT_TOP_K).max(1);
        let embedding = self.embedder.embed(&request.query).await?;
        let points = self.vector_store.search(&request.tenant_id, &embedding, top_k).await;

        let mut chunks = Vec::with_capacity(points.len());
        let mut seen_documents = Vec::new();
        for point in points {
            let document_id = point.payload.get("document_id").cloned().unwrap_or_default();
            let content = point.payload.get("content").cloned().unwrap_or_default();
            if !document_id.is_empty() && !seen_documents.contains(&document_id) {
                seen_documents.push(document_id.clone());
            }
            chunks.push(ChunkHit {
                chunk_id: point.id,
                document_id,
                score: point.score,
                content,
            });
        }

        let related_documents = if let Some(hops) = request.expand_hops {
            let mut related = Vec::new();
            for document_id in &seen_documents {
                for (related_doc, depth) in self.graph_store.expand(document_id, hops).await {
                    if !seen_documents.contains(&related_doc)
                        && !related.iter().any(|r: &RelatedDocument| r.document_id == related_doc)
                    {
                        related.push(RelatedDocument {
                            document_id: related_doc,
                            hops: depth,
                        });
                    }
                }
            }
            related
        } else {
            Vec::new()
        };

        Ok(QueryResponse {
            chunks,
            related_documents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_empty_query() {
        use async_trait::async_trait;
        use tempfile::tempdir;

        struct MockEmbedder;
        #[async_trait]
        impl EmbeddingPort for MockEmbedder {
            async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
                Ok(hive_core::embedding::deterministic_embedding(text, "test", 4))
            }
        }

        let dir = tempdir().unwrap();
        let vector_store = Arc::new(VectorStore::open(dir.path().join("v.wal")).await.unwrap());
        let graph_store = Arc::new(GraphStore::open(dir.path().join("g.wal")).await.unwrap());
        let engine = QueryEngine::new(Arc::new(MockEmbedder), vector_store, graph_store);

        let result = engine
            .execute(QueryRequest {
                tenant_id: "acme".to_string(),
                query: "   ".to_string(),
                top_k: None,
                expand_hops: None,
            })
            .await;
        assert!(matches!(result, Err(QueryError::EmptyQuery)));
    }
}
