use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use hive_core::model::{GraphEdgeRecord, RelationshipType};
use hive_core::ports::{EmbeddingError, EmbeddingPort};
use query::{QueryEngine, QueryRequest};
use storage::graph_store::GraphStore;
use storage::vector_store::{VectorStore, TENANT_KEY};
use tempfile::tempdir;

struct MockEmbedder;

#[async_trait]
impl EmbeddingPort for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(hive_core::embedding::deterministic_embedding(text, "test", 8))
    }
}

#[tokio::test]
async fn query_returns_matching_chunks_for_tenant() {
    let dir = tempdir().unwrap();
    let vector_store = Arc::new(VectorStore::open(dir.path().join("v.wal")).await.unwrap());
    let graph_store = Arc::new(GraphStore::open(dir.path().join("g.wal")).await.unwrap());
    let embedder = Arc::new(MockEmbedder);

    let embedding = embedder.embed("riverbank fox").await.unwrap();
    vector_store
        .upsert(
            uuid::Uuid::new_v4(),
            embedding,
            [
                (TENANT_KEY.to_string(), "acme".to_string()),
                ("document_id".to_string(), "doc-1".to_string()),
                ("content".to_string(), "The fox ran by the riverbank".to_string()),
            ]
            .into_iter()
            .collect(),
        )
        .await
        .unwrap();

    let engine = QueryEngine::new(embedder, vector_store, graph_store);
    let response = engine
        .execute(QueryRequest {
            tenant_id: "acme".to_string(),
            query: "riverbank fox".to_string(),
            top_k: Some(5),
            expand_hops: None,
        })
        .await
        .unwrap();

    assert_eq!(response.chunks.len(), 1);
    assert_eq!(response.chunks[0].document_id, "doc-1");
    assert!(response.related_documents.is_empty());
}

#[tokio::test]
async fn query_expands_related_documents_via_graph() {
    let dir = tempdir().unwrap();
    let vector_store = Arc::new(VectorStore::open(dir.path().join("v.wal")).await.unwrap());
    let graph_store = Arc::new(GraphStore::open(dir.path().join("g.wal")).await.unwrap());
    let embedder = Arc::new(MockEmbedder);

    let embedding = embedder.embed("quarterly report").await.unwrap();
    vector_store
        .upsert(
            uuid::Uuid::new_v4(),
            embedding,
            [
                (TENANT_KEY.to_string(), "acme".to_string()),
                ("document_id".to_string(), "doc-a".to_string()),
                ("content".to_string(), "quarterly report content".to_string()),
            ]
            .into_iter()
            .collect(),
        )
        .await
        .unwrap();
    graph_store
        .add_edge(GraphEdgeRecord {
            source_doc: "doc-a".to_string(),
            target_doc: "doc-b".to_string(),
            relationship_type: RelationshipType::References,
            description: "cites".to_string(),
            created_at: Utc::now(),
        })
        .await
        .unwrap();

    let engine = QueryEngine::new(embedder, vector_store, graph_store);
    let response = engine
        .execute(QueryRequest {
            tenant_id: "acme".to_string(),
            query: "quarterly report".to_string(),
            top_k: Some(5),
            expand_hops: Some(1),
        })
        .await
        .unwrap();

    assert_eq!(response.related_documents.len(), 1);
    assert_eq!(response.related_documents[0].document_id, "doc-b");
}

#[tokio::test]
async fn query_rejects_missing_tenant() {
    let dir = tempdir().unwrap();
    let vector_store = Arc::new(VectorStore::open(dir.path().join("v.wal")).await.unwrap());
    let graph_store = Arc::new(GraphStore::open(dir.path().join("g.wal")).await.unwrap());
    let engine = QueryEngine::new(Arc::new(MockEmbedder), vector_store, graph_store);

    let result = engine
        .execute(QueryRequest {
            tenant_id: String::new(),
            query: "anything".to_string(),
            top_k: None,
            expand_hops: None,
        })
        .await;

    assert!(matches!(result, Err(query::QueryError::MissingTenant)));
}
