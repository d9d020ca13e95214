//! WebSocket client for the `jamroom-relay` mailbox server.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::wire::{ClientFrame, RelayFrame};
use super::{Mailbox, MailboxEntry, MailboxError};
use crate::protocol::SignalingMessage;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, WsMessage>;
type WsRead = SplitStream<WsStream>;

type Reply = oneshot::Sender<Result<(), MailboxError>>;

/// A frame queued for the writer task plus the slot that reports whether
/// it reached the socket.
type Outbound = (ClientFrame, Reply);

/// Requests written to the relay and still waiting for `done` / `error`.
type PendingAcks = Arc<Mutex<HashMap<u64, Reply>>>;

/// Slot holding the sender of the current subscription, if any.
type SubscriberSlot = Arc<Mutex<Option<mpsc::UnboundedSender<MailboxEntry>>>>;

/// Mailbox backed by one relay connection bound to `(room_id, user_id)`.
///
/// Appends may target any recipient in the bound room; subscribe and
/// delete only reach the bound inbox. Each call resolves once the relay
/// has applied or refused it. The connection is not re-established if it
/// drops.
pub struct RelayMailbox {
    room_id: String,
    user_id: String,
    command_tx: mpsc::Sender<Outbound>,
    subscriber: SubscriberSlot,
    pending: PendingAcks,
    next_request: AtomicU64,
    request_timeout: Duration,
    connected: Arc<RwLock<bool>>,
}

impl RelayMailbox {
    /// Connect, send the hello frame, and wait for the relay to confirm.
    ///
    /// `hello_timeout` also bounds how long each later request waits for
    /// the relay's reply.
    pub async fn connect(
        url: &str,
        room_id: &str,
        user_id: &str,
        hello_timeout: Duration,
    ) -> Result<Self, MailboxError> {
        info!(url = %url.split('?').next().unwrap_or(""), room_id, user_id, "Connecting to mailbox relay");

        let (ws, _) = tokio::time::timeout(hello_timeout, tokio_tungstenite::connect_async(url))
            .await
            .map_err(|_| MailboxError::Timeout)?
            .map_err(|e| MailboxError::Connection(e.to_string()))?;
        let (mut sink, mut stream) = ws.split();

        let hello = ClientFrame::Hello {
            room_id: room_id.to_string(),
            user_id: user_id.to_string(),
        };
        send_frame(&mut sink, &hello).await?;

        tokio::time::timeout(hello_timeout, wait_for_ready(&mut stream))
            .await
            .map_err(|_| MailboxError::Timeout)??;

        let connected = Arc::new(RwLock::new(true));
        let subscriber: SubscriberSlot = Arc::new(Mutex::new(None));
        let pending: PendingAcks = Arc::new(Mutex::new(HashMap::new()));
        let (command_tx, command_rx) = mpsc::channel(64);

        tokio::spawn(writer_task(sink, command_rx, Arc::clone(&connected)));
        tokio::spawn(reader_task(
            stream,
            Arc::clone(&subscriber),
            Arc::clone(&pending),
            Arc::clone(&connected),
        ));

        info!(room_id, user_id, "Mailbox relay ready");
        Ok(Self {
            room_id: room_id.to_string(),
            user_id: user_id.to_string(),
            command_tx,
            subscriber,
            pending,
            next_request: AtomicU64::new(0),
            request_timeout: hello_timeout,
            connected,
        })
    }

    pub async fn is_connected(&self) -> bool {
        *self.connected.read().await
    }

    fn check_inbox(&self, room_id: &str, recipient_id: &str) -> Result<(), MailboxError> {
        if room_id == self.room_id && recipient_id == self.user_id {
            Ok(())
        } else {
            Err(MailboxError::WrongInbox(format!("{room_id}/{recipient_id}")))
        }
    }

    /// Write one request and wait for the relay's verdict on it.
    async fn submit(&self, build: impl FnOnce(u64) -> ClientFrame) -> Result<(), MailboxError> {
        if !self.is_connected().await {
            return Err(MailboxError::Closed);
        }
        let id = self.next_request.fetch_add(1, Ordering::SeqCst) + 1;
        let (ack_tx, ack_rx) = oneshot::channel();
        self.pending.lock().await.insert(id, ack_tx);

        if let Err(e) = self.write(build(id)).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(self.request_timeout, ack_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(MailboxError::Closed),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(MailboxError::Timeout)
            }
        }
    }

    async fn write(&self, frame: ClientFrame) -> Result<(), MailboxError> {
        let (written_tx, written_rx) = oneshot::channel();
        self.command_tx
            .send((frame, written_tx))
            .await
            .map_err(|_| MailboxError::Closed)?;
        written_rx.await.map_err(|_| MailboxError::Closed)?
    }
}

#[async_trait]
impl Mailbox for RelayMailbox {
    async fn append(&self, message: SignalingMessage) -> Result<(), MailboxError> {
        if message.room_id != self.room_id {
            return Err(MailboxError::WrongInbox(format!(
                "{}/{}",
                message.room_id, message.to
            )));
        }
        self.submit(|id| ClientFrame::Append { id, message }).await
    }

    async fn subscribe(
        &self,
        room_id: &str,
        recipient_id: &str,
    ) -> Result<mpsc::UnboundedReceiver<MailboxEntry>, MailboxError> {
        self.check_inbox(room_id, recipient_id)?;
        let (tx, rx) = mpsc::unbounded_channel();
        // Replacing the slot ends any previous subscription.
        *self.subscriber.lock().await = Some(tx);
        if let Err(e) = self.submit(|id| ClientFrame::Subscribe { id }).await {
            self.subscriber.lock().await.take();
            return Err(e);
        }
        Ok(rx)
    }

    async fn delete(
        &self,
        room_id: &str,
        recipient_id: &str,
        key: &str,
    ) -> Result<(), MailboxError> {
        self.check_inbox(room_id, recipient_id)?;
        let key = key.to_string();
        self.submit(|id| ClientFrame::Delete { id, key }).await
    }
}

// ---------------------------------------------------------------------------
// Connection tasks
// ---------------------------------------------------------------------------

async fn send_frame(sink: &mut WsSink, frame: &ClientFrame) -> Result<(), MailboxError> {
    let json =
        serde_json::to_string(frame).map_err(|e| MailboxError::Protocol(e.to_string()))?;
    sink.send(WsMessage::Text(json.into()))
        .await
        .map_err(|e| MailboxError::Connection(e.to_string()))
}

async fn wait_for_ready(stream: &mut WsRead) -> Result<(), MailboxError> {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => match serde_json::from_str::<RelayFrame>(&text) {
                Ok(RelayFrame::Ready { .. }) => return Ok(()),
                Ok(RelayFrame::Error { message, .. }) => return Err(MailboxError::Protocol(message)),
                Ok(other) => {
                    return Err(MailboxError::Protocol(format!(
                        "expected ready, got {other:?}"
                    )))
                }
                Err(e) => return Err(MailboxError::Protocol(e.to_string())),
            },
            Ok(WsMessage::Close(_)) => return Err(MailboxError::Closed),
            Ok(_) => continue,
            Err(e) => return Err(MailboxError::Connection(e.to_string())),
        }
    }
    Err(MailboxError::Closed)
}

/// Drain queued frames into the socket, reporting each write's outcome.
async fn writer_task(
    mut sink: WsSink,
    mut command_rx: mpsc::Receiver<Outbound>,
    connected: Arc<RwLock<bool>>,
) {
    while let Some((frame, done)) = command_rx.recv().await {
        let result = send_frame(&mut sink, &frame).await;
        let failed = result.is_err();
        let _ = done.send(result);
        if failed {
            warn!("Mailbox relay write failed, closing connection");
            break;
        }
    }
    *connected.write().await = false;
    let _ = sink.close().await;
}

/// Forward delivered entries to the current subscriber and settle
/// request replies.
async fn reader_task(
    mut stream: WsRead,
    subscriber: SubscriberSlot,
    pending: PendingAcks,
    connected: Arc<RwLock<bool>>,
) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => match serde_json::from_str::<RelayFrame>(&text) {
                Ok(RelayFrame::Entry { key, message }) => {
                    let slot = subscriber.lock().await;
                    match slot.as_ref() {
                        Some(tx) => {
                            let _ = tx.send(MailboxEntry { key, message });
                        }
                        None => debug!(key = %key, "Entry received with no subscriber"),
                    }
                }
                Ok(RelayFrame::Done { id }) => settle(&pending, id, Ok(())).await,
                Ok(RelayFrame::Error { id: Some(id), message }) => {
                    debug!(id, error = %message, "Mailbox relay refused a request");
                    settle(&pending, id, Err(MailboxError::Rejected(message))).await;
                }
                Ok(RelayFrame::Error { id: None, message }) => {
                    warn!(error = %message, "Mailbox relay reported an error");
                }
                Ok(RelayFrame::Ready { .. }) => {}
                Err(e) => warn!(error = %e, "Undecodable relay frame"),
            },
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Mailbox relay read error");
                break;
            }
        }
    }

    info!("Mailbox relay connection closed");
    *connected.write().await = false;
    // Dropping the senders ends the subscription stream and fails every
    // request still waiting on a reply.
    subscriber.lock().await.take();
    pending.lock().await.clear();
}

async fn settle(pending: &PendingAcks, id: u64, result: Result<(), MailboxError>) {
    match pending.lock().await.remove(&id) {
        Some(reply) => {
            let _ = reply.send(result);
        }
        None => debug!(id, "Reply for unknown request"),
    }
}
