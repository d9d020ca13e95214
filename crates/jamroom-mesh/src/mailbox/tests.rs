//! Tests for the in-memory mailbox and the relay wire frames.

use std::time::Duration;

use super::wire::{ClientFrame, RelayFrame};
use super::*;
use crate::protocol::SignalType;

fn message(from: &str, to: &str, timestamp: i64) -> SignalingMessage {
    SignalingMessage {
        kind: SignalType::Offer,
        data: serde_json::json!({"type": "offer", "sdp": "v=0"}),
        from: from.into(),
        to: to.into(),
        room_id: "r1".into(),
        timestamp,
        message_id: Some(format!("{from}-{timestamp}")),
    }
}

#[tokio::test]
async fn subscribe_delivers_backlog_then_live_entries_in_order() {
    let mailbox = MemoryMailbox::new();
    mailbox.append(message("alice", "bob", 1)).await.unwrap();
    mailbox.append(message("carol", "bob", 2)).await.unwrap();

    let mut rx = mailbox.subscribe("r1", "bob").await.unwrap();
    mailbox.append(message("dave", "bob", 3)).await.unwrap();

    let senders: Vec<String> = vec![
        rx.recv().await.unwrap().message.from,
        rx.recv().await.unwrap().message.from,
        rx.recv().await.unwrap().message.from,
    ];
    assert_eq!(senders, vec!["alice", "carol", "dave"]);
}

#[tokio::test]
async fn subscription_is_filtered_by_recipient_and_room() {
    let mailbox = MemoryMailbox::new();
    let mut rx = mailbox.subscribe("r1", "bob").await.unwrap();

    mailbox.append(message("alice", "carol", 1)).await.unwrap();
    let mut other_room = message("alice", "bob", 2);
    other_room.room_id = "r2".into();
    mailbox.append(other_room).await.unwrap();
    mailbox.append(message("alice", "bob", 3)).await.unwrap();

    let entry = rx.recv().await.unwrap();
    assert_eq!(entry.message.timestamp, 3);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn delete_removes_only_the_acknowledged_entry() {
    let mailbox = MemoryMailbox::new();
    mailbox.append(message("alice", "bob", 1)).await.unwrap();
    mailbox.append(message("alice", "bob", 2)).await.unwrap();

    let pending = mailbox.pending("r1", "bob").await;
    assert_eq!(pending.len(), 2);

    mailbox.delete("r1", "bob", &pending[0].key).await.unwrap();
    let remaining = mailbox.pending("r1", "bob").await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].message.timestamp, 2);
}

#[tokio::test]
async fn delete_of_last_entry_forgets_idle_inbox() {
    let mailbox = MemoryMailbox::new();
    mailbox.append(message("alice", "bob", 1)).await.unwrap();
    let key = mailbox.pending("r1", "bob").await[0].key.clone();

    mailbox.delete("r1", "bob", &key).await.unwrap();
    assert_eq!(mailbox.inbox_count().await, 0);
}

#[tokio::test]
async fn delete_of_unknown_key_is_harmless() {
    let mailbox = MemoryMailbox::new();
    mailbox.append(message("alice", "bob", 1)).await.unwrap();
    mailbox.delete("r1", "bob", "missing").await.unwrap();
    mailbox.delete("r9", "nobody", "missing").await.unwrap();
    assert_eq!(mailbox.pending("r1", "bob").await.len(), 1);
}

#[tokio::test]
async fn prune_drops_stale_entries_only() {
    let mailbox = MemoryMailbox::new();
    let now = jamroom_common::now_millis();
    mailbox.append(message("alice", "bob", now - 600_000)).await.unwrap();
    mailbox.append(message("alice", "bob", now)).await.unwrap();

    let removed = mailbox.prune_older_than(Duration::from_secs(300)).await;
    assert_eq!(removed, 1);

    let pending = mailbox.pending("r1", "bob").await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].message.timestamp, now);
}

#[tokio::test]
async fn dropped_subscriber_is_forgotten_on_next_append() {
    let mailbox = MemoryMailbox::new();
    let rx = mailbox.subscribe("r1", "bob").await.unwrap();
    drop(rx);

    mailbox.append(message("alice", "bob", 1)).await.unwrap();
    let key = mailbox.pending("r1", "bob").await[0].key.clone();
    mailbox.delete("r1", "bob", &key).await.unwrap();
    assert_eq!(mailbox.inbox_count().await, 0);
}

#[test]
fn client_frames_are_type_tagged() {
    let hello = ClientFrame::Hello {
        room_id: "r1".into(),
        user_id: "alice".into(),
    };
    let json = serde_json::to_value(&hello).unwrap();
    assert_eq!(json["type"], "hello");
    assert_eq!(json["room_id"], "r1");

    assert_eq!(hello.id(), None);

    let json = serde_json::to_value(ClientFrame::Subscribe { id: 7 }).unwrap();
    assert_eq!(json, serde_json::json!({"type": "subscribe", "id": 7}));
}

#[test]
fn relay_replies_echo_the_request_id() {
    let done = serde_json::to_value(RelayFrame::Done { id: 3 }).unwrap();
    assert_eq!(done, serde_json::json!({"type": "done", "id": 3}));

    let refused = RelayFrame::Error {
        id: Some(4),
        message: "cannot append as mallory".into(),
    };
    let json = serde_json::to_value(&refused).unwrap();
    assert_eq!(json["id"], 4);

    // Errors not tied to a request omit the id.
    let json = serde_json::json!({"type": "error", "message": "invalid frame"});
    match serde_json::from_value::<RelayFrame>(json).unwrap() {
        RelayFrame::Error { id, .. } => assert_eq!(id, None),
        other => panic!("unexpected frame: {other:?}"),
    }
}

#[test]
fn relay_entry_frame_carries_the_envelope() {
    let frame = RelayFrame::Entry {
        key: "k1".into(),
        message: message("alice", "bob", 5),
    };
    let text = serde_json::to_string(&frame).unwrap();
    match serde_json::from_str::<RelayFrame>(&text).unwrap() {
        RelayFrame::Entry { key, message } => {
            assert_eq!(key, "k1");
            assert_eq!(message.from, "alice");
            assert_eq!(message.room_id, "r1");
        }
        other => panic!("unexpected frame: {other:?}"),
    }
}
