//! EventLog: the append-only pipeline trace required by §4.8 step 5
//! ("one EventLog entry (event=ingest, detail=count)"), distinct from
//! AuditLog (action-level accountability) and RuleEventStore (per-rule
//! evaluation trace).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventLogKind {
    Ingest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub sequence: u64,
    pub event: EventLogKind,
    pub detail: String,
    pub tenant: String,
    pub timestamp: DateTime<Utc>,
}

impl EventLogEntry {
    pub fn new(event: EventLogKind, detail: impl Into<String>, tenant: impl Into<String>) -> Self {
        Self {
            sequence: 0,
            event,
            detail: detail.into(),
            tenant: tenant.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("event log lock poisoned")]
    LockPoisoned,
    #[error("event log io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("event log serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub trait EventLogSink: Send + Sync {
    fn record(&self, entry: EventLogEntry) -> Result<(), EventLogError>;
}

#[derive(Default)]
pub struct InMemoryEventLogSink {
    entries: Mutex<Vec<EventLogEntry>>,
    sequence: AtomicU64,
}

impl InMemoryEventLogSink {
    pub fn entries(&self) -> Result<Vec<EventLogEntry>, EventLogError> {
        let entries = self.entries.lock().map_err(|_| EventLogError::LockPoisoned)?;
        Ok(entries.clone())
    }
}

impl EventLogSink for InMemoryEventLogSink {
    fn record(&self, mut entry: EventLogEntry) -> Result<(), EventLogError> {
        let next = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        entry.sequence = next;
        let mut entries = self.entries.lock().map_err(|_| EventLogError::LockPoisoned)?;
        entries.push(entry);
        Ok(())
    }
}

pub struct JsonlEventLogSink {
    writer: Mutex<std::fs::File>,
    sequence: AtomicU64,
}

impl JsonlEventLogSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EventLogError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let writer = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;

        Ok(Self {
            writer: Mutex::new(writer),
            sequence: AtomicU64::new(0),
        })
    }
}

impl EventLogSink for JsonlEventLogSink {
    fn record(&self, mut entry: EventLogEntry) -> Result<(), EventLogError> {
        let next = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        entry.sequence = next;

        let line = serde_json::to_string(&entry)?;
        let mut writer = self.writer.lock().map_err(|_| EventLogError::LockPoisoned)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}
