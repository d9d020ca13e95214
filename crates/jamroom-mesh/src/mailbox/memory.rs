//! In-process mailbox store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jamroom_common::{new_id, now_millis};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

use super::{Mailbox, MailboxEntry, MailboxError};
use crate::protocol::SignalingMessage;

type InboxKey = (String, String);

#[derive(Default)]
struct Inbox {
    entries: Vec<MailboxEntry>,
    subscribers: Vec<mpsc::UnboundedSender<MailboxEntry>>,
}

impl Inbox {
    fn is_idle(&self) -> bool {
        self.entries.is_empty() && self.subscribers.iter().all(|tx| tx.is_closed())
    }
}

/// Inboxes held in memory under a single lock.
///
/// Cloning shares the same store, so one instance can serve every
/// participant of a single-process host, or back the relay server.
#[derive(Clone, Default)]
pub struct MemoryMailbox {
    inboxes: Arc<RwLock<HashMap<InboxKey, Inbox>>>,
}

impl MemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Undelivered entries of one inbox, oldest first.
    pub async fn pending(&self, room_id: &str, recipient_id: &str) -> Vec<MailboxEntry> {
        let key = (room_id.to_string(), recipient_id.to_string());
        self.inboxes
            .read()
            .await
            .get(&key)
            .map(|inbox| inbox.entries.clone())
            .unwrap_or_default()
    }

    /// Drop undelivered entries older than `max_age` and forget idle inboxes.
    /// Returns how many entries were removed.
    pub async fn prune_older_than(&self, max_age: Duration) -> usize {
        let cutoff = now_millis() - i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX);
        let mut inboxes = self.inboxes.write().await;
        let mut removed = 0;
        for ((room_id, recipient_id), inbox) in inboxes.iter_mut() {
            let before = inbox.entries.len();
            inbox.entries.retain(|e| e.message.timestamp >= cutoff);
            let dropped = before - inbox.entries.len();
            if dropped > 0 {
                info!(room_id = %room_id, recipient = %recipient_id, dropped, "Pruned stale mailbox entries");
            }
            removed += dropped;
        }
        inboxes.retain(|_, inbox| !inbox.is_idle());
        removed
    }

    /// Number of inboxes currently tracked.
    pub async fn inbox_count(&self) -> usize {
        self.inboxes.read().await.len()
    }
}

#[async_trait]
impl Mailbox for MemoryMailbox {
    async fn append(&self, message: SignalingMessage) -> Result<(), MailboxError> {
        let key = (message.room_id.clone(), message.to.clone());
        let entry = MailboxEntry {
            key: new_id(),
            message,
        };

        let mut inboxes = self.inboxes.write().await;
        let inbox = inboxes.entry(key).or_default();
        inbox.entries.push(entry.clone());
        // Closed subscriptions are dropped here.
        inbox.subscribers.retain(|tx| tx.send(entry.clone()).is_ok());
        debug!(key = %entry.key, to = %entry.message.to, "Mailbox entry appended");
        Ok(())
    }

    async fn subscribe(
        &self,
        room_id: &str,
        recipient_id: &str,
    ) -> Result<mpsc::UnboundedReceiver<MailboxEntry>, MailboxError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let key = (room_id.to_string(), recipient_id.to_string());

        let mut inboxes = self.inboxes.write().await;
        let inbox = inboxes.entry(key).or_default();
        for entry in &inbox.entries {
            let _ = tx.send(entry.clone());
        }
        inbox.subscribers.push(tx);
        debug!(room_id, recipient_id, backlog = inbox.entries.len(), "Mailbox subscribed");
        Ok(rx)
    }

    async fn delete(
        &self,
        room_id: &str,
        recipient_id: &str,
        key: &str,
    ) -> Result<(), MailboxError> {
        let inbox_key = (room_id.to_string(), recipient_id.to_string());
        let mut inboxes = self.inboxes.write().await;
        if let Some(inbox) = inboxes.get_mut(&inbox_key) {
            inbox.entries.retain(|e| e.key != key);
            if inbox.is_idle() {
                inboxes.remove(&inbox_key);
            }
        }
        Ok(())
    }
}
