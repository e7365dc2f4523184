//! Tenant-scoped stores for rules, rule matches, and rule processing events.
//! In-memory and `RwLock`-guarded: rules are small, low-churn configuration
//! data, unlike the WAL-backed chunk/vector/graph stores.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use hive_core::error::{ErrorCode, HiveError};
use hive_core::model::{Rule, RuleEvent, RuleMatch};
use hive_core::ports::{RuleEventStorePort, RuleMatchStorePort, RuleStorePort};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum RuleStoreError {
    #[error("rule {0} not found")]
    NotFound(Uuid),
    #[error("query must not be empty")]
    EmptyQuery,
    #[error("store lock poisoned")]
    LockPoisoned,
}

impl HiveError for RuleStoreError {
    fn error_code(&self) -> ErrorCode {
        match self {
            RuleStoreError::NotFound(_) => ErrorCode::NotFound,
            RuleStoreError::EmptyQuery => ErrorCode::InvalidArgument,
            RuleStoreError::LockPoisoned => ErrorCode::Internal,
        }
    }
}

#[derive(Default)]
pub struct RuleStore {
    rules: RwLock<HashMap<Uuid, Rule>>,
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, tenant_id: impl Into<String>, query: impl Into<String>) -> Result<Rule, RuleStoreError> {
        let query = query.into();
        if query.trim().is_empty() {
            return Err(RuleStoreError::EmptyQuery);
        }
        let now = Utc::now();
        let rule = Rule {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.into(),
            query,
            active: true,
            created_at: now,
            updated_at: now,
        };
        self.rules
            .write()
            .map_err(|_| RuleStoreError::LockPoisoned)?
            .insert(rule.id, rule.clone());
        Ok(rule)
    }

    pub fn set_active(&self, id: Uuid, active: bool) -> Result<Rule, RuleStoreError> {
        let mut rules = self.rules.write().map_err(|_| RuleStoreError::LockPoisoned)?;
        let rule = rules.get_mut(&id).ok_or(RuleStoreError::NotFound(id))?;
        rule.active = active;
        rule.updated_at = Utc::now();
        Ok(rule.clone())
    }

    pub fn get(&self, id: Uuid) -> Result<Rule, RuleStoreError> {
        self.rules
            .read()
            .map_err(|_| RuleStoreError::LockPoisoned)?
            .get(&id)
            .cloned()
            .ok_or(RuleStoreError::NotFound(id))
    }

    pub fn list(&self, tenant_id: &str) -> Result<Vec<Rule>, RuleStoreError> {
        Ok(self
            .rules
            .read()
            .map_err(|_| RuleStoreError::LockPoisoned)?
            .values()
            .filter(|rule| rule.tenant_id == tenant_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RuleStorePort for RuleStore {
    async fn active_rules(&self, tenant_id: &str) -> Vec<Rule> {
        self.rules
            .read()
            .map(|rules| {
                rules
                    .values()
                    .filter(|rule| rule.tenant_id == tenant_id && rule.active)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Default)]
pub struct RuleMatchStore {
    matches: RwLock<Vec<RuleMatch>>,
}

impl RuleMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_tenant(&self, tenant_id: &str) -> Vec<RuleMatch> {
        self.matches
            .read()
            .map(|matches| {
                matches
                    .iter()
                    .filter(|m| m.tenant_id == tenant_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl RuleMatchStorePort for RuleMatchStore {
    async fn record(&self, rule_match: RuleMatch) {
        if let Ok(mut matches) = self.matches.write() {
            matches.push(rule_match);
        }
    }
}

#[derive(Default)]
pub struct RuleEventStore {
    events: RwLock<Vec<RuleEvent>>,
}

impl RuleEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_document(&self, document: &str) -> Vec<RuleEvent> {
        self.events
            .read()
            .map(|events| events.iter().filter(|e| e.document == document).cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RuleEventStorePort for RuleEventStore {
    async fn record(&self, event: RuleEvent) {
        if let Ok(mut events) = self.events.write() {
            events.push(event);
        }
    }
}
