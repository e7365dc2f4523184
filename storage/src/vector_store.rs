//! Vector collection façade over [`Repository`], keyed by external UUIDs.
//!
//! `Repository`/`HyperIndex` are keyed internally by `u64`; chunk ids are
//! UUIDv5 values minted by `hive_core::chunk_id`. We fold a UUID down to a
//! `u64` by truncating its first 8 bytes and stash the full UUID string back
//! into the node's payload (reserved key `__id__`) so results can be
//! reported against the original id.

use crate::repo::{IndexMutation, RepoError, Repository};
use crate::wal::Wal;
use hive_core::error::{ErrorCode, HiveError};
use hive_core::model::Node;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

const RESERVED_ID_KEY: &str = "__id__";
/// Payload key every tenant-scoped point must carry (§4.3 invariant).
pub const TENANT_KEY: &str = "organization_id";
const PURGE_BATCH_SIZE: usize = 1000;

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("payload is missing required '{TENANT_KEY}' field")]
    MissingTenant,
    #[error("point {0} not found")]
    NotFound(Uuid),
}

impl HiveError for VectorStoreError {
    fn error_code(&self) -> ErrorCode {
        match self {
            VectorStoreError::Repo(_) => ErrorCode::Internal,
            VectorStoreError::MissingTenant => ErrorCode::InvalidArgument,
            VectorStoreError::NotFound(_) => ErrorCode::NotFound,
        }
    }
}

fn uuid_to_id(id: Uuid) -> u64 {
    let bytes = id.as_bytes();
    u64::from_be_bytes(bytes[0..8].try_into().expect("uuid is 16 bytes"))
}

pub struct VectorPoint {
    pub id: Uuid,
    pub score: f32,
    pub payload: HashMap<String, String>,
}

/// Vector collection with tenant-scoped search and purge.
pub struct VectorStore {
    repo: Repository,
}

impl VectorStore {
    pub async fn open(wal_path: impl AsRef<Path>) -> Result<Self, VectorStoreError> {
        Ok(Self {
            repo: Repository::open(wal_path).await?,
        })
    }

    pub fn from_wal(wal: Arc<Mutex<Wal>>) -> Self {
        Self {
            repo: Repository::new(wal),
        }
    }

    /// Insert or replace a point. `payload` should carry `organization_id`;
    /// if absent this is migration-era data and the point is stored
    /// unscoped rather than rejected.
    pub async fn upsert(
        &self,
        id: Uuid,
        embedding: Vec<f32>,
        mut payload: HashMap<String, String>,
    ) -> Result<(), VectorStoreError> {
        let tenant = match payload.get(TENANT_KEY).filter(|t| !t.is_empty()) {
            Some(tenant) => tenant.clone(),
            None => {
                tracing::warn!(
                    point_id = %id,
                    "vector upsert payload missing '{TENANT_KEY}', storing unscoped (migration-era behaviour)"
                );
                String::new()
            }
        };
        payload.insert(RESERVED_ID_KEY.to_string(), id.to_string());

        let node = Node {
            id: uuid_to_id(id),
            embedding,
            data: tenant,
            metadata: payload,
        };
        self.repo
            .apply_index_transaction(vec![IndexMutation::PutNode(node)])
            .await?;
        Ok(())
    }

    pub async fn update_payload(
        &self,
        id: Uuid,
        mut payload: HashMap<String, String>,
    ) -> Result<(), VectorStoreError> {
        let existing = self
            .repo
            .get_node(uuid_to_id(id))
            .await
            .map_err(|_| VectorStoreError::NotFound(id))?;
        if payload
            .get(TENANT_KEY)
            .map(|t| t.is_empty())
            .unwrap_or(true)
        {
            return Err(VectorStoreError::MissingTenant);
        }
        payload.insert(RESERVED_ID_KEY.to_string(), id.to_string());
        let tenant = payload[TENANT_KEY].clone();
        let node = Node {
            id: existing.id,
            embedding: existing.embedding,
            data: tenant,
            metadata: payload,
        };
        self.repo
            .apply_index_transaction(vec![IndexMutation::PutNode(node)])
            .await?;
        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), VectorStoreError> {
        self.repo
            .apply_index_transaction(vec![IndexMutation::DeleteNode(uuid_to_id(id))])
            .await?;
        Ok(())
    }

    /// Cosine-similarity top-k search, scoped to `tenant_id`.
    ///
    /// The underlying index has no native filter predicate, so we oversample
    /// candidates and filter by tenant before truncating to `k`.
    pub async fn search(
        &self,
        tenant_id: &str,
        query: &[f32],
        k: usize,
    ) -> Vec<VectorPoint> {
        let oversample = (k * 10).max(k).min(5000);
        let candidates = {
            let index = self.repo.hyper_index.read().await;
            index.search_vector(query, oversample)
        };
        let ids: Vec<u64> = candidates.iter().map(|(id, _)| *id).collect();
        let nodes = self.repo.get_nodes_by_ids(&ids).await;
        let node_by_id: HashMap<u64, Node> = nodes.into_iter().map(|n| (n.id, n)).collect();

        let mut out = Vec::with_capacity(k);
        for (id, score) in candidates {
            let Some(node) = node_by_id.get(&id) else {
                continue;
            };
            if node.metadata.get(TENANT_KEY).map(String::as_str) != Some(tenant_id) {
                continue;
            }
            let mut payload = node.metadata.clone();
            let Some(raw_id) = payload.remove(RESERVED_ID_KEY) else {
                continue;
            };
            let Ok(point_id) = Uuid::parse_str(&raw_id) else {
                continue;
            };
            out.push(VectorPoint {
                id: point_id,
                score,
                payload,
            });
            if out.len() == k {
                break;
            }
        }
        out
    }

    /// Delete every point in the collection, batched to bound lock hold time.
    pub async fn purge_collection(&self) -> Result<usize, VectorStoreError> {
        let ids = self.repo.list_node_ids().await;
        let mut purged = 0;
        for batch in ids.chunks(PURGE_BATCH_SIZE) {
            for id in batch {
                self.repo
                    .apply_index_transaction(vec![IndexMutation::DeleteNode(*id)])
                    .await?;
                purged += 1;
            }
        }
        Ok(purged)
    }

    /// Scroll the collection in pages of 1000, deleting points owned by `tenant_id`.
    pub async fn purge_by_tenant(&self, tenant_id: &str) -> Result<usize, VectorStoreError> {
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
}
