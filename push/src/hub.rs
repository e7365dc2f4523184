//! `PushHub` (§4.7): the server-side registry of live client sessions.
//!
//! Registration and send both acquire a per-client `tokio::sync::Mutex`
//! (Open Question resolution D.4) so that "drain mailbox then accept live
//! sends" cannot interleave with a concurrent send for the same client.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use hive_core::model::Notification;
use hive_core::ports::NotificationSender;
use tokio::sync::{mpsc, Mutex as AsyncMutex};

use crate::mailbox::Mailbox;

pub type NotificationTx = mpsc::Sender<Notification>;

#[derive(Default)]
struct ClientState {
    online: Option<NotificationTx>,
}

pub struct PushHub {
    mailbox: Arc<Mailbox>,
    clients: RwLock<HashMap<String, Arc<AsyncMutex<ClientState>>>>,
}

impl Default for PushHub {
    fn default() -> Self {
        Self::new(Arc::new(Mailbox::default()))
    }
}

impl PushHub {
    pub fn new(mailbox: Arc<Mailbox>) -> Self {
        Self {
            mailbox,
            clients: RwLock::new(HashMap::new()),
        }
    }

    fn client_slot(&self, client_id: &str) -> Arc<AsyncMutex<ClientState>> {
        if let Some(slot) = self.clients.read().unwrap().get(client_id) {
            return slot.clone();
        }
        self.clients
            .write()
            .unwrap()
            .entry(client_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(ClientState::default())))
            .clone()
    }

    /// Registers a new live session for `client_id`, evicting any existing
    /// one (dropping its sender ends that session's writer task), then
    /// drains the mailbox to it in FIFO order.
    pub async fn register(&self, client_id: &str, sender: NotificationTx) {
        let slot = self.client_slot(client_id);
        let mut state = slot.lock().await;
        state.online = Some(sender);
        drop(state);
        self.drain_mailbox(client_id, &slot).await;
    }

    pub fn unregister(&self, client_id: &str) {
        if let Some(slot) = self.clients.read().unwrap().get(client_id).cloned() {
            if let Ok(mut state) = slot.try_lock() {
                state.online = None;
            }
        }
    }

    async fn drain_mailbox(&self, client_id: &str, slot: &Arc<AsyncMutex<ClientState>>) {
        for item in self.mailbox.drain(client_id) {
            let mut state = slot.lock().await;
            let delivered = match &state.online {
                Some(tx) => tx.send(item.clone()).await.is_ok(),
                None => false,
            };
            if !delivered {
                state.online = None;
                drop(state);
                self.mailbox.push(client_id, item);
                break;
            }
        }
    }
}

#[async_trait]
impl NotificationSender for PushHub {
    async fn send(&self, client_id: &str, notification: Notification) {
        let slot = self.client_slot(client_id);
        let mut state = slot.lock().await;
        let delivered = match &state.online {
            Some(tx) => tx.send(notification.clone()).await.is_ok(),
            None => false,
        };
        if !delivered {
            state.online = None;
            drop(state);
            self.mailbox.push(client_id, notification);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hive_core::model::NotificationLevel;

    fn note(message: &str) -> Notification {
        Notification::alert(message, NotificationLevel::Warning)
    }

    #[tokio::test]
    async fn send_to_offline_client_lands_in_mailbox() {
        let mailbox = Arc::new(Mailbox::default());
        let hub = PushHub::new(mailbox.clone());

        hub.send("c1", note("hello")).await;

        let drained = mailbox.drain("c1");
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].message, "hello");
    }

    #[tokio::test]
    async fn send_to_online_client_delivers_directly() {
        let hub = PushHub::default();
        let (tx, mut rx) = mpsc::channel(8);
        hub.register("c1", tx).await;

        hub.send("c1", note("live")).await;

        let received = rx.recv().await.unwrap();
        assert_eq!(received.message, "live");
    }

    #[tokio::test]
    async fn registering_drains_pending_mailbox_in_order() {
        let mailbox = Arc::new(Mailbox::default());
        let hub = PushHub::new(mailbox.clone());

        hub.send("c1", note("one")).await;
        hub.send("c1", note("two")).await;

        let (tx, mut rx) = mpsc::channel(8);
        hub.register("c1", tx).await;

        assert_eq!(rx.recv().await.unwrap().message, "one");
        assert_eq!(rx.recv().await.unwrap().message, "two");
    }

    #[tokio::test]
    async fn send_failure_re_queues_to_mailbox() {
        let mailbox = Arc::new(Mailbox::default());
        let hub = PushHub::new(mailbox.clone());
        let (tx, rx) = mpsc::channel(1);
        drop(rx); // closed receiver makes every send fail
        hub.register("c1", tx).await;

        hub.send("c1", note("undeliverable")).await;

        let drained = mailbox.drain("c1");
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].message, "undeliverable");
    }
}
