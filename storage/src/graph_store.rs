//! Document-relationship graph, over the same `Repository`/`HyperIndex`
//! machinery the vector collection uses. Documents are identified by their
//! string id; we fold that into a `u64` with a fixed-seed hash so edges
//! survive process restarts with the same node identity, and keep the
//! original string in the node payload so traversals can report it back.

use crate::repo::{IndexMutation, RepoError, Repository};
use async_trait::async_trait;
use hive_core::error::{ErrorCode, HiveError};
use hive_core::model::{Edge, GraphEdgeRecord, Node, RelationshipType};
use hive_core::ports::{GraphStoreError as PortGraphStoreError, GraphStorePort};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphStoreError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("self-edges are not allowed ({0} -> {0})")]
    SelfEdge(String),
}

impl HiveError for GraphStoreError {
    fn error_code(&self) -> ErrorCode {
        match self {
            GraphStoreError::Repo(_) => ErrorCode::Internal,
            GraphStoreError::SelfEdge(_) => ErrorCode::InvalidArgument,
        }
    }
}

fn doc_id_to_u64(doc_id: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    doc_id.hash(&mut hasher);
    hasher.finish()
}

fn relationship_from_str(relation: &str) -> Option<RelationshipType> {
    match relation {
        "contradicts" => Some(RelationshipType::Contradicts),
        "references" => Some(RelationshipType::References),
        _ => None,
    }
}

pub struct GraphStore {
    repo: Repository,
}

impl GraphStore {
    pub async fn open(wal_path: impl AsRef<Path>) -> Result<Self, GraphStoreError> {
        Ok(Self {
            repo: Repository::open(wal_path).await?,
        })
    }

    async fn ensure_document(&self, doc_id: &str) -> Result<(), GraphStoreError> {
        let id = doc_id_to_u64(doc_id);
        if self.repo.get_node(id).await.is_ok() {
            return Ok(());
        }
        self.repo
            .apply_index_transaction(vec![IndexMutation::PutNode(Node::new(
                id,
                Vec::new(),
                doc_id.to_string(),
            ))])
            .await?;
        Ok(())
    }

    /// `(source, target, type)` is the edge's primary key; a later insert
    /// with the same key replaces the description/timestamp.
    pub async fn add_edge(&self, edge: GraphEdgeRecord) -> Result<(), GraphStoreError> {
        if edge.source_doc == edge.target_doc {
            return Err(GraphStoreError::SelfEdge(edge.source_doc));
        }
        self.ensure_document(&edge.source_doc).await?;
        self.ensure_document(&edge.target_doc).await?;

        let mut metadata = std::collections::HashMap::new();
        metadata.insert("description".to_string(), edge.description.clone());
        metadata.insert("created_at".to_string(), edge.created_at.to_rfc3339());

        let internal_edge = Edge {
            source: doc_id_to_u64(&edge.source_doc),
            target: doc_id_to_u64(&edge.target_doc),
            relation: edge.relationship_type.as_str().to_string(),
            weight: 1.0,
            metadata,
        };
        self.repo
            .apply_index_transaction(vec![IndexMutation::PutEdge(internal_edge)])
            .await?;
        Ok(())
    }

    /// Outgoing edges from `doc_id`.
    pub async fn neighbors(&self, doc_id: &str) -> Vec<GraphEdgeRecord> {
        let source_id = doc_id_to_u64(doc_id);
        let edges = {
            let index = self.repo.hyper_index.read().await;
            index
                .graph_index
                .neighbors(source_id)
                .into_iter()
                .cloned()
                .collect::<Vec<_>>()
        };

        let mut out = Vec::with_capacity(edges.len());
        for (target_id, relation, _weight) in edges {
            let Some(relationship_type) = relationship_from_str(&relation) else {
                continue;
            };
            let meta = self
                .repo
                .get_edge_metadata(source_id, target_id, &relation)
                .await;
            let Ok(target_node) = self.repo.get_node(target_id).await else {
                continue;
            };
            let created_at = meta
                .get("created_at")
                .and_then(|ts| chrono::DateTime::parse_from_rfc3339(ts).ok())
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .unwrap_or_else(chrono::Utc::now);
            out.push(GraphEdgeRecord {
                source_doc: doc_id.to_string(),
                target_doc: target_node.data,
                relationship_type,
                description: meta.get("description").cloned().unwrap_or_default(),
                created_at,
            });
        }
        out
    }

    /// Multi-hop BFS expansion, returning `(document_id, hop_distance)`.
    pub async fn expand(&self, doc_id: &str, max_hops: u8) -> Vec<(String, u8)> {
        let start_id = doc_id_to_u64(doc_id);
        let reached = {
            let index = self.repo.hyper_index.read().await;
            index.expand_graph(start_id, max_hops)
        };
        let ids: Vec<u64> = reached.iter().map(|(id, _)| *id).collect();
        let nodes = self.repo.get_nodes_by_ids(&ids).await;
        let by_id: std::collections::HashMap<u64, String> =
            nodes.into_iter().map(|n| (n.id, n.data)).collect();

        reached
            .into_iter()
            .filter_map(|(id, hop)| by_id.get(&id).cloned().map(|doc| (doc, hop)))
            .collect()
    }
}

#[async_trait]
impl GraphStorePort for GraphStore {
    async fn add_edge(&self, edge: GraphEdgeRecord) -> Result<(), PortGraphStoreError> {
        self.add_edge(edge).await.map_err(|err| match err {
            GraphStoreError::SelfEdge(doc) => PortGraphStoreError::SelfEdge(doc),
            GraphStoreError::Repo(e) => PortGraphStoreError::Backend(e.to_string()),
        })
    }
}
