//! Client-server message protocol definitions

use serde::{Deserialize, Serialize};

/// Client → server messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    // Connection
    Heartbeat,

    // Room Management
    Join {
        room_id: String,
        display_name: String,
    },
    Leave,

    // WebRTC Signaling
    Signal {
        target: String,
        payload: SignalPayload,
    },

    // Chat & Presence
    Chat {
        text: String,
        display_name: String,
    },
    Typing {
        room_id: String,
        is_typing: bool,
        display_name: String,
    },
}

/// Server → client messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    // Connection
    Connected {
        participant_id: String,
    },
    HeartbeatAck,

    // Room Events
    RosterUpdate {
        joined_id: String,
        members: Vec<RosterEntry>,
    },
    PeerLeft {
        departed_id: String,
    },

    // WebRTC Signaling
    Signal {
        from: String,
        payload: SignalPayload,
    },

    // Chat & Presence
    ChatDelivered {
        text: String,
        display_name: String,
        sender_id: String,
        timestamp: u64,
    },
    TypingUpdate {
        sender_id: String,
        is_typing: bool,
        display_name: String,
    },
}

/// One roster row: arrival order is preserved by the member list itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: String,
    pub display_name: String,
}

/// Signaling payload routed 1:1 between peers. The relay validates the shape
/// but never interprets the contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalPayload {
    Description { description: SessionDescription },
    Candidate { candidate: IceCandidate },
}

/// A proposed or accepted media session, as produced by the WebRTC engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
}

/// A single proposed network path for the direct connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdp_mline_index: Option<u16>,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}
