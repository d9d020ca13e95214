//! Per-connection handler: bind to an inbox, then serve mailbox frames.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use jamroom_mesh::mailbox::wire::{ClientFrame, RelayFrame};
use jamroom_mesh::{Mailbox, MailboxEntry, MemoryMailbox, SignalingMessage};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsRead = SplitStream<WebSocketStream<TcpStream>>;

/// Handle a single WebSocket connection.
pub async fn handle_connection(
    ws: WebSocketStream<TcpStream>,
    addr: SocketAddr,
    store: MemoryMailbox,
    hello_timeout: Duration,
) {
    let (mut sink, mut stream) = ws.split();

    // 1. The hello frame binds this connection to one inbox.
    let (room_id, user_id) = match read_hello(&mut stream, addr, hello_timeout).await {
        Some(v) => v,
        None => return,
    };

    let ready = RelayFrame::Ready {
        room_id: room_id.clone(),
        user_id: user_id.clone(),
    };
    if send_frame(&mut sink, &ready).await.is_err() {
        return;
    }
    tracing::info!(peer = %addr, room_id = %room_id, user_id = %user_id, "Client bound to inbox");

    // 2. Serve frames until the client goes away.
    let mut inbox: Option<mpsc::UnboundedReceiver<MailboxEntry>> = None;
    loop {
        tokio::select! {
            Some(entry) = next_entry(&mut inbox) => {
                let frame = RelayFrame::Entry { key: entry.key, message: entry.message };
                if send_frame(&mut sink, &frame).await.is_err() {
                    break;
                }
            }

            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        let reply = match serde_json::from_str::<ClientFrame>(&text) {
                            Ok(frame) => {
                                let id = frame.id();
                                let result = apply_frame(frame, &store, &room_id, &user_id, &mut inbox).await;
                                reply_frame(id, result)
                            }
                            Err(e) => reply_frame(None, Err(format!("invalid frame: {e}"))),
                        };
                        if let RelayFrame::Error { message, .. } = &reply {
                            tracing::debug!(peer = %addr, error = %message, "Rejected client frame");
                        }
                        if send_frame(&mut sink, &reply).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(peer = %addr, error = %e, "WS error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    // 3. Cleanup. Undelivered entries stay in the inbox until they expire.
    tracing::info!(peer = %addr, room_id = %room_id, user_id = %user_id, "Client disconnected");
}

/// Apply one client frame to the bound inbox.
async fn apply_frame(
    frame: ClientFrame,
    store: &MemoryMailbox,
    room_id: &str,
    user_id: &str,
    inbox: &mut Option<mpsc::UnboundedReceiver<MailboxEntry>>,
) -> Result<(), String> {
    match frame {
        ClientFrame::Subscribe { .. } => {
            let rx = store.subscribe(room_id, user_id).await.map_err(|e| e.to_string())?;
            *inbox = Some(rx);
            Ok(())
        }
        ClientFrame::Append { message, .. } => {
            check_append(&message, room_id, user_id)?;
            tracing::debug!(room_id, from = user_id, to = %message.to, kind = message.kind.as_str(), "Append");
            store.append(message).await.map_err(|e| e.to_string())
        }
        ClientFrame::Delete { key, .. } => store
            .delete(room_id, user_id, &key)
            .await
            .map_err(|e| e.to_string()),
        ClientFrame::Hello { .. } => Err("connection is already bound to an inbox".into()),
    }
}

/// The reply owed for a request: `done` or `error`, echoing its id.
fn reply_frame(id: Option<u64>, result: Result<(), String>) -> RelayFrame {
    match (id, result) {
        (Some(id), Ok(())) => RelayFrame::Done { id },
        (None, Ok(())) => RelayFrame::Error {
            id: None,
            message: "request without id".into(),
        },
        (id, Err(message)) => RelayFrame::Error { id, message },
    }
}

/// A client may only write into its own room, as itself.
fn check_append(message: &SignalingMessage, room_id: &str, user_id: &str) -> Result<(), String> {
    if message.room_id != room_id {
        return Err(format!("cannot append to room {}", message.room_id));
    }
    if message.from != user_id {
        return Err(format!("cannot append as {}", message.from));
    }
    if message.to.is_empty() {
        return Err("message has no recipient".into());
    }
    Ok(())
}

async fn next_entry(inbox: &mut Option<mpsc::UnboundedReceiver<MailboxEntry>>) -> Option<MailboxEntry> {
    match inbox {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Read and parse the first message as a hello frame.
async fn read_hello(
    stream: &mut WsRead,
    addr: SocketAddr,
    timeout: Duration,
) -> Option<(String, String)> {
    let frame = tokio::time::timeout(timeout, stream.next()).await;

    match frame {
        Ok(Some(Ok(Message::Text(text)))) => match serde_json::from_str::<ClientFrame>(&text) {
            Ok(ClientFrame::Hello { room_id, user_id }) if !room_id.is_empty() && !user_id.is_empty() => {
                Some((room_id, user_id))
            }
            Ok(other) => {
                tracing::warn!(peer = %addr, frame = ?other, "Expected hello");
                None
            }
            Err(e) => {
                tracing::warn!(peer = %addr, error = %e, "Invalid hello message");
                None
            }
        },
        Ok(Some(Ok(_))) => {
            tracing::warn!(peer = %addr, "Expected text hello, got binary");
            None
        }
        Ok(Some(Err(e))) => {
            tracing::warn!(peer = %addr, error = %e, "WS error during hello");
            None
        }
        Ok(None) => {
            tracing::debug!(peer = %addr, "Connection closed before hello");
            None
        }
        Err(_) => {
            tracing::warn!(peer = %addr, timeout_secs = timeout.as_secs(), "Hello timeout");
            None
        }
    }
}

/// Send a relay frame as a JSON text frame.
async fn send_frame(sink: &mut WsSink, frame: &RelayFrame) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let json = match serde_json::to_string(frame) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode relay frame");
            return Ok(());
        }
    };
    sink.send(Message::Text(json.into())).await
}
