//! Room-scoped signaling channel: send to one peer, receive our own inbox.

use std::sync::Arc;

use jamroom_common::{new_message_id, now_millis};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::dedup::RecentlySeen;
use super::SignalingError;
use crate::mailbox::{Mailbox, MailboxEntry};
use crate::protocol::{InboundSignal, Signal, SignalingMessage};

/// Signaling for one participant in one room.
///
/// Outbound signals get a fresh message id and land in the recipient's
/// inbox. The subscription delivers each inbound message at most once,
/// then deletes it from the mailbox.
pub struct SignalingChannel {
    mailbox: Arc<dyn Mailbox>,
    room_id: String,
    local_id: String,
    buffer: usize,
    /// Only the subscription task inserts; `cleanup` clears.
    seen: Arc<Mutex<RecentlySeen>>,
    subscription: Mutex<Option<JoinHandle<()>>>,
}

impl SignalingChannel {
    pub fn new(
        mailbox: Arc<dyn Mailbox>,
        room_id: &str,
        local_id: &str,
        dedup_capacity: usize,
        buffer: usize,
    ) -> Self {
        Self {
            mailbox,
            room_id: room_id.to_string(),
            local_id: local_id.to_string(),
            buffer: buffer.max(1),
            seen: Arc::new(Mutex::new(RecentlySeen::new(dedup_capacity))),
            subscription: Mutex::new(None),
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    /// Append `signal` to `recipient_id`'s inbox. Returns the message id.
    ///
    /// Write failures are returned as-is; nothing is retried.
    pub async fn send(&self, signal: &Signal, recipient_id: &str) -> Result<String, SignalingError> {
        let data = signal.encode().map_err(SignalingError::Encode)?;
        let message_id = new_message_id();
        let message = SignalingMessage {
            kind: signal.signal_type(),
            data,
            from: self.local_id.clone(),
            to: recipient_id.to_string(),
            room_id: self.room_id.clone(),
            timestamp: now_millis(),
            message_id: Some(message_id.clone()),
        };

        self.mailbox
            .append(message)
            .await
            .map_err(SignalingError::Send)?;

        debug!(
            to = recipient_id,
            kind = signal.signal_type().as_str(),
            message_id = %message_id,
            "Signal sent"
        );
        Ok(message_id)
    }

    /// Open the live subscription to our inbox.
    ///
    /// Replaces any previous subscription. The returned receiver ends when
    /// the mailbox subscription ends or [`cleanup`](Self::cleanup) is called.
    pub async fn subscribe(&self) -> Result<mpsc::Receiver<InboundSignal>, SignalingError> {
        self.cancel_subscription().await;

        let entries = self
            .mailbox
            .subscribe(&self.room_id, &self.local_id)
            .await
            .map_err(SignalingError::Subscribe)?;
        let (tx, rx) = mpsc::channel(self.buffer);

        let task = tokio::spawn(subscription_loop(
            entries,
            tx,
            Arc::clone(&self.mailbox),
            Arc::clone(&self.seen),
            self.room_id.clone(),
            self.local_id.clone(),
        ));
        *self.subscription.lock().await = Some(task);

        info!(room_id = %self.room_id, user_id = %self.local_id, "Signaling subscription opened");
        Ok(rx)
    }

    /// Cancel the subscription and forget every seen message id.
    pub async fn cleanup(&self) {
        self.cancel_subscription().await;
        self.seen.lock().await.clear();
        debug!(room_id = %self.room_id, "Signaling channel cleaned up");
    }

    async fn cancel_subscription(&self) {
        if let Some(task) = self.subscription.lock().await.take() {
            task.abort();
        }
    }
}

async fn subscription_loop(
    mut entries: mpsc::UnboundedReceiver<MailboxEntry>,
    tx: mpsc::Sender<InboundSignal>,
    mailbox: Arc<dyn Mailbox>,
    seen: Arc<Mutex<RecentlySeen>>,
    room_id: String,
    local_id: String,
) {
    while let Some(entry) = entries.recv().await {
        let message = &entry.message;
        if message.to != local_id || message.room_id != room_id {
            debug!(to = %message.to, room_id = %message.room_id, "Ignoring entry for another inbox");
            continue;
        }

        let fresh = {
            let mut seen = seen.lock().await;
            let fresh = seen.insert(message.dedup_key());
            debug!(seen = seen.len(), fresh, "Dedup check");
            fresh
        };

        if fresh {
            match InboundSignal::from_message(message) {
                Ok(inbound) => {
                    if tx.send(inbound).await.is_err() {
                        debug!("Signal receiver dropped, ending subscription");
                        break;
                    }
                }
                Err(e) => {
                    warn!(from = %message.from, kind = message.kind.as_str(), error = %e, "Dropping undecodable signal");
                }
            }
        } else {
            debug!(from = %message.from, key = %message.dedup_key(), "Dropping duplicate signal");
        }

        if let Err(e) = mailbox.delete(&room_id, &local_id, &entry.key).await {
            warn!(key = %entry.key, error = %e, "Failed to acknowledge signal");
        }
    }
    debug!(room_id = %room_id, "Signaling subscription ended");
}
