//! Simple API-key authentication. User/session management, RBAC, and
//! organization/user CRUD are out of scope: the caller always presents a
//! static key that resolves to a tenant (and optionally a drone client id).

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

use crate::error::{ErrorCode, HiveError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub tenant_id: String,
    pub client_id: Option<String>,
    pub api_key: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    Active,
    Inactive,
    Disabled,
}

#[derive(Debug, Clone)]
pub struct ApiKeyRecord {
    pub key: String,
    pub tenant_id: String,
    pub client_id: Option<String>,
    pub status: KeyStatus,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub is_admin: bool,
}

impl ApiKeyRecord {
    pub fn new(key: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            tenant_id: tenant_id.into(),
            client_id: None,
            status: KeyStatus::Active,
            last_seen_at: None,
            is_admin: false,
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_status(mut self, status: KeyStatus) -> Self {
        self.status = status;
        self
    }

    /// §4.15: an elevated administrative caller, allowed to purge without a
    /// tenant scope.
    pub fn with_admin(mut self, is_admin: bool) -> Self {
        self.is_admin = is_admin;
        self
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing authorization header")]
    MissingHeader,
    #[error("invalid or inactive API key")]
    InvalidOrInactive,
    #[error("key_disabled")]
    KeyDisabled,
}

impl HiveError for AuthError {
    fn error_code(&self) -> ErrorCode {
        match self {
            AuthError::MissingHeader | AuthError::InvalidOrInactive | AuthError::KeyDisabled => {
                ErrorCode::Unauthenticated
            }
        }
    }
}

/// Collaborator boundary: a concrete store (database-backed, in this
/// workspace in-memory) resolving an opaque key to tenant/client identity.
pub trait ApiKeyStore: Send + Sync {
    fn lookup(&self, key: &str) -> Option<ApiKeyRecord>;
    fn touch_last_seen(&self, key: &str, at: DateTime<Utc>);
}

#[derive(Default)]
pub struct InMemoryApiKeyStore {
    keys: RwLock<HashMap<String, ApiKeyRecord>>,
}

impl InMemoryApiKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: ApiKeyRecord) {
        self.keys.write().unwrap().insert(record.key.clone(), record);
    }
}

impl ApiKeyStore for InMemoryApiKeyStore {
    fn lookup(&self, key: &str) -> Option<ApiKeyRecord> {
        self.keys.read().unwrap().get(key).cloned()
    }

    fn touch_last_seen(&self, key: &str, at: DateTime<Utc>) {
        if let Some(record) = self.keys.write().unwrap().get_mut(key) {
            record.last_seen_at = Some(at);
        }
    }
}

/// Accepts `Bearer <key>` or a bare `<key>` header value, per §6.
fn extract_api_key(header_value: &str) -> Result<&str, AuthError> {
    let trimmed = header_value.trim();
    if trimmed.is_empty() {
        return Err(AuthError::MissingHeader);
    }
    let key = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))
        .unwrap_or(trimmed)
        .trim();
    if key.is_empty() {
        return Err(AuthError::MissingHeader);
    }
    Ok(key)
}

/// Authenticates a required-auth endpoint (Ingest, Push, Query).
pub fn authenticate(
    store: &dyn ApiKeyStore,
    header_value: Option<&str>,
) -> Result<Principal, AuthError> {
    let header_value = header_value.ok_or(AuthError::MissingHeader)?;
    let key = extract_api_key(header_value)?;
    let record = store.lookup(key).ok_or(AuthError::InvalidOrInactive)?;
    match record.status {
        KeyStatus::Disabled => Err(AuthError::KeyDisabled),
        KeyStatus::Inactive => Err(AuthError::InvalidOrInactive),
        KeyStatus::Active => Ok(Principal {
            tenant_id: record.tenant_id,
            client_id: record.client_id,
            api_key: record.key,
            is_admin: record.is_admin,
        }),
    }
}

/// Authenticates the optional key on the public Health endpoint: no key at
/// all is fine (public), a present key must not be disabled.
pub fn authenticate_optional(
    store: &dyn ApiKeyStore,
    header_value: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Option<Principal>, AuthError> {
    let Some(header_value) = header_value else {
        return Ok(None);
    };
    let key = extract_api_key(header_value)?;
    let Some(record) = store.lookup(key) else {
        return Ok(None);
    };
    if record.status == KeyStatus::Disabled {
        return Err(AuthError::KeyDisabled);
    }
    store.touch_last_seen(&record.key, now);
    Ok(Some(Principal {
        tenant_id: record.tenant_id,
        client_id: record.client_id,
        api_key: record.key,
        is_admin: record.is_admin,
    }))
}
