//! Relational projection of chunk records, over the same WAL/Repository
//! machinery `VectorStore` uses. The vector lives in `VectorStore`; this
//! store only needs enough to serve chunk-metadata lookups and tenant purge.

use crate::repo::{IndexMutation, RepoError, Repository};
use hive_core::error::{ErrorCode, HiveError};
use hive_core::model::{ChunkRecord, Node};
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

const TENANT_KEY: &str = "tenant_id";
const PURGE_BATCH_SIZE: usize = 1000;

#[derive(Error, Debug)]
pub enum ChunkStoreError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("chunk {0} not found")]
    NotFound(Uuid),
    #[error("chunk record serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl HiveError for ChunkStoreError {
    fn error_code(&self) -> ErrorCode {
        match self {
            ChunkStoreError::Repo(_) => ErrorCode::Internal,
            ChunkStoreError::NotFound(_) => ErrorCode::NotFound,
            ChunkStoreError::Serde(_) => ErrorCode::Internal,
        }
    }
}

fn uuid_to_id(id: Uuid) -> u64 {
    let bytes = id.as_bytes();
    u64::from_be_bytes(bytes[0..8].try_into().expect("uuid is 16 bytes"))
}

fn record_to_node(record: &ChunkRecord) -> Result<Node, ChunkStoreError> {
    let mut metadata = std::collections::HashMap::new();
    metadata.insert(TENANT_KEY.to_string(), record.tenant_id.clone());
    metadata.insert("document_id".to_string(), record.document_id.clone());
    Ok(Node {
        id: uuid_to_id(record.id),
        embedding: Vec::new(),
        data: serde_json::to_string(record)?,
        metadata,
    })
}

fn node_to_record(node: &Node) -> Result<ChunkRecord, ChunkStoreError> {
    Ok(serde_json::from_str(&node.data)?)
}

pub struct ChunkMetaStore {
    repo: Repository,
}

impl ChunkMetaStore {
    pub async fn open(wal_path: impl AsRef<Path>) -> Result<Self, ChunkStoreError> {
        Ok(Self {
            repo: Repository::open(wal_path).await?,
        })
    }

    pub async fn put(&self, record: ChunkRecord) -> Result<(), ChunkStoreError> {
        let node = record_to_node(&record)?;
        self.repo
            .apply_index_transaction(vec![IndexMutation::PutNode(node)])
            .await?;
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<ChunkRecord, ChunkStoreError> {
        let node = self
            .repo
            .get_node(uuid_to_id(id))
            .await
            .map_err(|_| ChunkStoreError::NotFound(id))?;
        node_to_record(&node)
    }

    pub async fn get_many(&self, ids: &[Uuid]) -> Result<Vec<ChunkRecord>, ChunkStoreError> {
        let internal: Vec<u64> = ids.iter().map(|id| uuid_to_id(*id)).collect();
        let nodes = self.repo.get_nodes_by_ids(&internal).await;
        nodes.iter().map(node_to_record).collect()
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ChunkStoreError> {
        self.repo
            .apply_index_transaction(vec![IndexMutation::DeleteNode(uuid_to_id(id))])
            .await?;
        Ok(())
    }

    /// Delete every chunk belonging to `tenant_id`. Scrolls ids in pages of
    /// 1000 so a tenant with a large corpus doesn't hold the repo lock for
    /// a single unbounded sweep.
    pub async fn purge(&self, tenant_id: &str) -> Result<usize, ChunkStoreError> {
        let ids = self.repo.list_node_ids().await;
        let mut purged = 0;
        for page in ids.chunks(PURGE_BATCH_SIZE) {
            let nodes = self.repo.get_nodes_by_ids(page).await;
            for node in nodes {
                if node.metadata.get(TENANT_KEY).map(String::as_str) == Some(tenant_id) {
                    self.repo
                        .apply_index_transaction(vec![IndexMutation::DeleteNode(node.id)])
                        .await?;
                    purged += 1;
                }
            }
        }
        Ok(purged)
    }

    /// Unscoped purge for an elevated administrative caller (§4.15: "when
    /// tenant-id is omitted, requires an elevated administrative caller and
    /// purges all").
    pub async fn purge_all(&self) -> Result<usize, ChunkStoreError> {
        let ids = self.repo.list_node_ids().await;
        let mut purged = 0;
        for page in ids.chunks(PURGE_BATCH_SIZE) {
            for id in page {
                self.repo
                    .apply_index_transaction(vec![IndexMutation::DeleteNode(*id)])
                    .await?;
                purged += 1;
            }
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    fn record(tenant: &str, doc: &str) -> ChunkRecord {
        ChunkRecord {
            id: Uuid::new_v4(),
            document_id: doc.to_string(),
            content: "hello world".to_string(),
            ordinal: 0,
            tenant_id: tenant.to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn put_and_get_round_trips() {
        let dir = tempdir().unwrap();
        let store = ChunkMetaStore::open(dir.path().join("c.wal")).await.unwrap();
        let rec = record("acme", "doc-1");
        store.put(rec.clone()).await.unwrap();

        let fetched = store.get(rec.id).await.unwrap();
        assert_eq!(fetched, rec);
    }

    #[tokio::test]
    async fn purge_only_removes_tenant_chunks() {
        let dir = tempdir().unwrap();
        let store = ChunkMetaStore::open(dir.path().join("c.wal")).await.unwrap();

        let a = record("acme", "doc-1");
        let b = record("globex", "doc-2");
        store.put(a.clone()).await.unwrap();
        store.put(b.clone()).await.unwrap();

        let purged = store.purge("acme").await.unwrap();
        assert_eq!(purged, 1);

        assert!(store.get(a.id).await.is_err());
        assert_eq!(store.get(b.id).await.unwrap(), b);
    }

    #[tokio::test]
    async fn purge_all_removes_every_tenant() {
        let dir = tempdir().unwrap();
        let store = ChunkMetaStore::open(dir.path().join("c.wal")).await.unwrap();

        let a = record("acme", "doc-1");
        let b = record("globex", "doc-2");
        store.put(a.clone()).await.unwrap();
        store.put(b.clone()).await.unwrap();

        let purged = store.purge_all().await.unwrap();
        assert_eq!(purged, 2);
        assert!(store.get(a.id).await.is_err());
        assert!(store.get(b.id).await.is_err());
    }
}
