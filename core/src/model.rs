use chrono::{DateTime, Utc};
use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Durable graph node as kept in the write-ahead log / snapshot machinery.
/// Keyed internally by a u64 derived from the externally-visible UUID
/// chunk/document identifier (see `hive_storage::repo` for the mapping).
#[derive(Archive, RkyvDeserialize, RkyvSerialize, Debug, PartialEq, Clone)]
#[archive(check_bytes)]
pub struct Node {
    pub id: u64,
    pub embedding: Vec<f32>,
    pub data: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Archive, RkyvDeserialize, RkyvSerialize, Debug, PartialEq, Clone)]
#[archive(check_bytes)]
pub struct Edge {
    pub source: u64,
    pub target: u64,
    pub relation: String,
    pub weight: f32,
    pub metadata: HashMap<String, String>,
}

impl Node {
    pub fn new(id: u64, embedding: Vec<f32>, data: String) -> Self {
        Self {
            id,
            embedding,
            data,
            metadata: HashMap::new(),
        }
    }
}

impl Edge {
    pub fn new(source: u64, target: u64, relation: impl Into<String>, weight: f32) -> Self {
        Self {
            source,
            target,
            relation: relation.into(),
            weight,
            metadata: HashMap::new(),
        }
    }
}

/// Typed replacement for the "string->string map everywhere" shape: the
/// mandatory fields an ingest request always carries, plus an explicit
/// extras bag for anything else. Validated at the IngestCoordinator
/// boundary (empty tenant/document id is rejected there).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestMetadata {
    pub tenant_id: String,
    pub document_id: String,
    pub filename: String,
    pub file_path: String,
    pub filetype: String,
    pub client_id: Option<String>,
    #[serde(default)]
    pub extras: HashMap<String, String>,
}

impl IngestMetadata {
    pub fn new(
        tenant_id: impl Into<String>,
        document_id: impl Into<String>,
        filename: impl Into<String>,
        file_path: impl Into<String>,
        filetype: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            document_id: document_id.into(),
            filename: filename.into(),
            file_path: file_path.into(),
            filetype: filetype.into(),
            client_id: None,
            extras: HashMap::new(),
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }
}

/// A stored chunk's relational record (`ChunkMetaStore`). The vector and
/// payload living in `VectorStore` are kept separately and share the same
/// `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: uuid::Uuid,
    pub document_id: String,
    pub content: String,
    pub ordinal: usize,
    pub tenant_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    Contradicts,
    References,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Contradicts => "contradicts",
            RelationshipType::References => "references",
        }
    }
}

/// `(source, target, type)` is the primary key; implementations must
/// reject self-edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdgeRecord {
    pub source_doc: String,
    pub target_doc: String,
    pub relationship_type: RelationshipType,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: uuid::Uuid,
    pub tenant_id: String,
    pub query: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    SingleDoc,
    CrossDoc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleMatch {
    pub rule_id: uuid::Uuid,
    pub rule_query: String,
    pub uploaded_doc: String,
    /// Empty for single-doc matches.
    pub matched_doc: String,
    pub match_type: MatchType,
    pub ai_explanation: String,
    pub matched_chunks: Vec<String>,
    pub client_id: Option<String>,
    pub tenant_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleEventType {
    Processing,
    Checking,
    Matched,
    NotMatched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleEventStatus {
    Started,
    Processing,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEvent {
    pub rule_id: Option<uuid::Uuid>,
    pub rule_query: Option<String>,
    pub document: String,
    pub event_type: RuleEventType,
    pub status: RuleEventStatus,
    pub message: String,
    pub tenant_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub level: NotificationLevel,
}

impl Notification {
    pub fn alert(message: impl Into<String>, level: NotificationLevel) -> Self {
        Self {
            kind: "ALERT".to_string(),
            message: message.into(),
            level,
        }
    }
}
