//! Signaling wire types.
//!
//! A [`SignalingMessage`] is the envelope stored in a recipient's mailbox.
//! Its `data` field carries either a session description or a serialized
//! ICE candidate; [`Signal`] is the typed form the mesh works with.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Signal types
// ---------------------------------------------------------------------------

/// Discriminator carried in the envelope's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalType {
    #[serde(rename = "offer")]
    Offer,
    #[serde(rename = "answer")]
    Answer,
    #[serde(rename = "ice-candidate")]
    IceCandidate,
}

impl SignalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::IceCandidate => "ice-candidate",
        }
    }
}

/// SDP type of a session description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

/// Negotiated session parameters exchanged as offer or answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// ICE candidate in its serialized form.
///
/// Absent optional fields are written as `null`, never omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMLineIndex", default)]
    pub sdp_m_line_index: Option<u16>,
    #[serde(rename = "sdpMid", default)]
    pub sdp_mid: Option<String>,
    #[serde(rename = "usernameFragment", default)]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_m_line_index: None,
            sdp_mid: None,
            username_fragment: None,
        }
    }
}

/// Typed signaling payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Offer(SessionDescription),
    Answer(SessionDescription),
    IceCandidate(IceCandidate),
}

impl Signal {
    pub fn signal_type(&self) -> SignalType {
        match self {
            Self::Offer(_) => SignalType::Offer,
            Self::Answer(_) => SignalType::Answer,
            Self::IceCandidate(_) => SignalType::IceCandidate,
        }
    }

    /// Serialize the payload into the envelope's `data` field.
    pub fn encode(&self) -> Result<Value, serde_json::Error> {
        match self {
            Self::Offer(desc) | Self::Answer(desc) => serde_json::to_value(desc),
            Self::IceCandidate(candidate) => serde_json::to_value(candidate),
        }
    }

    /// Rebuild a typed signal from an envelope's `type` and `data`.
    pub fn decode(kind: SignalType, data: &Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            SignalType::Offer => Self::Offer(SessionDescription::deserialize(data)?),
            SignalType::Answer => Self::Answer(SessionDescription::deserialize(data)?),
            SignalType::IceCandidate => Self::IceCandidate(IceCandidate::deserialize(data)?),
        })
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// A message addressed to one participant in one room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalingMessage {
    #[serde(rename = "type")]
    pub kind: SignalType,
    pub data: Value,
    pub from: String,
    pub to: String,
    pub room_id: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

impl SignalingMessage {
    /// Key used to recognise a redelivered message.
    ///
    /// Messages from senders that never stamped an id fall back to
    /// `from:type:timestamp`.
    pub fn dedup_key(&self) -> String {
        match &self.message_id {
            Some(id) => id.clone(),
            None => format!("{}:{}:{}", self.from, self.kind.as_str(), self.timestamp),
        }
    }
}

/// A decoded signal handed to the session manager.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundSignal {
    pub from: String,
    pub signal: Signal,
    pub timestamp: i64,
    pub message_id: Option<String>,
}

impl InboundSignal {
    pub fn from_message(message: &SignalingMessage) -> Result<Self, serde_json::Error> {
        Ok(Self {
            from: message.from.clone(),
            signal: Signal::decode(message.kind, &message.data)?,
            timestamp: message.timestamp,
            message_id: message.message_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_candidate() -> IceCandidate {
        IceCandidate {
            candidate: "candidate:842163049 1 udp 1677729535 203.0.113.7 46154 typ srflx".into(),
            sdp_m_line_index: Some(0),
            sdp_mid: Some("0".into()),
            username_fragment: Some("f9Xk".into()),
        }
    }

    #[test]
    fn candidate_survives_encode_decode() {
        let signal = Signal::IceCandidate(full_candidate());
        let data = signal.encode().unwrap();
        let decoded = Signal::decode(SignalType::IceCandidate, &data).unwrap();
        assert_eq!(decoded, signal);
    }

    #[test]
    fn candidate_with_null_fields_survives_encode_decode() {
        let signal = Signal::IceCandidate(IceCandidate::new("candidate:1 1 udp 1 10.0.0.1 9 typ host"));
        let data = signal.encode().unwrap();
        assert!(data["sdpMid"].is_null());
        assert!(data["sdpMLineIndex"].is_null());
        assert!(data["usernameFragment"].is_null());
        assert_eq!(Signal::decode(SignalType::IceCandidate, &data).unwrap(), signal);
    }

    #[test]
    fn candidate_uses_browser_field_names() {
        let data = Signal::IceCandidate(full_candidate()).encode().unwrap();
        assert_eq!(data["sdpMLineIndex"], 0);
        assert_eq!(data["sdpMid"], "0");
        assert_eq!(data["usernameFragment"], "f9Xk");
        assert!(data["candidate"].as_str().unwrap().starts_with("candidate:"));
    }

    #[test]
    fn candidate_accepts_missing_optional_fields() {
        let data = serde_json::json!({"candidate": "candidate:2 1 tcp 5 10.0.0.2 9 typ host"});
        let decoded = Signal::decode(SignalType::IceCandidate, &data).unwrap();
        match decoded {
            Signal::IceCandidate(c) => {
                assert_eq!(c.sdp_mid, None);
                assert_eq!(c.sdp_m_line_index, None);
            }
            other => panic!("unexpected signal: {other:?}"),
        }
    }

    #[test]
    fn description_encodes_type_and_sdp() {
        let data = Signal::Offer(SessionDescription::offer("v=0")).encode().unwrap();
        assert_eq!(data, serde_json::json!({"type": "offer", "sdp": "v=0"}));
    }

    #[test]
    fn envelope_uses_camel_case_wire_names() {
        let message = SignalingMessage {
            kind: SignalType::IceCandidate,
            data: serde_json::json!({}),
            from: "alice".into(),
            to: "bob".into(),
            room_id: "r1".into(),
            timestamp: 1_700_000_000_000,
            message_id: Some("m-1".into()),
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "ice-candidate");
        assert_eq!(json["roomId"], "r1");
        assert_eq!(json["messageId"], "m-1");
        assert_eq!(json["timestamp"], 1_700_000_000_000_i64);
    }

    #[test]
    fn dedup_key_prefers_message_id() {
        let mut message = SignalingMessage {
            kind: SignalType::Answer,
            data: Value::Null,
            from: "bob".into(),
            to: "alice".into(),
            room_id: "r1".into(),
            timestamp: 42,
            message_id: Some("abc".into()),
        };
        assert_eq!(message.dedup_key(), "abc");

        message.message_id = None;
        assert_eq!(message.dedup_key(), "bob:answer:42");
    }

    #[test]
    fn envelope_without_message_id_deserializes() {
        let json = r#"{"type":"offer","data":{"type":"offer","sdp":"v=0"},"from":"a","to":"b","roomId":"r","timestamp":7}"#;
        let message: SignalingMessage = serde_json::from_str(json).unwrap();
        assert_eq!(message.message_id, None);
        let inbound = InboundSignal::from_message(&message).unwrap();
        assert_eq!(inbound.signal, Signal::Offer(SessionDescription::offer("v=0")));
    }

    #[test]
    fn mismatched_payload_fails_to_decode() {
        let data = serde_json::json!({"type": "offer", "sdp": "v=0"});
        assert!(Signal::decode(SignalType::IceCandidate, &data).is_err());
    }
}
