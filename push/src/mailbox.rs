//! Per-client offline-notification queue (§4.6). A plain in-memory FIFO
//! guarded by a mutex — unlike the WAL-backed stores, mailbox contents are
//! transient and do not need to survive a restart.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use hive_core::model::Notification;

/// 7 days, per the Open Question resolution in SPEC_FULL.md section D.
pub const DEFAULT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

struct ClientMailbox {
    items: VecDeque<Notification>,
    expires_at: Instant,
}

pub struct Mailbox {
    ttl: Duration,
    clients: Mutex<HashMap<String, ClientMailbox>>,
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl Mailbox {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Prepends `notification` to `client_id`'s FIFO, resetting the TTL.
    pub fn push(&self, client_id: &str, notification: Notification) {
        let mut clients = self.clients.lock().expect("mailbox lock poisoned");
        let entry = clients
            .entry(client_id.to_string())
            .or_insert_with(|| ClientMailbox {
                items: VecDeque::new(),
                expires_at: Instant::now() + self.ttl,
            });
        if Instant::now() >= entry.expires_at {
            entry.items.clear();
        }
        entry.items.push_front(notification);
        entry.expires_at = Instant::now() + self.ttl;
    }

    /// Pops every queued notification oldest-first, leaving the mailbox empty.
    /// An expired mailbox drains as empty and is dropped.
    pub fn drain(&self, client_id: &str) -> Vec<Notification> {
        let mut clients = self.clients.lock().expect("mailbox lock poisoned");
        let Some(entry) = clients.remove(client_id) else {
            return Vec::new();
        };
        if Instant::now() >= entry.expires_at {
            return Vec::new();
        }
        entry.items.into_iter().rev().collect()
    }
}
