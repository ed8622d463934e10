//! Wire protocol for the room-scoped signaling channel.
//!
//! Every payload is a tagged JSON object; the `type` field selects the kind
//! and the remaining fields are kind-specific. Decoding happens once, at the
//! signaling boundary, and unrecognized shapes are an explicit error rather
//! than a silently ignored message.

use crate::stroke::Stroke;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Protocol-level failures.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unrecognized payload shape: {0}")]
    Unrecognized(String),
    #[error("payload encoding failed: {0}")]
    Encode(String),
}

/// Kind of a forwarded session description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
}

/// A session description relayed between two peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

/// ICE candidate fields, mirroring the platform candidate-init shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidateInit {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u16>,
}

/// Every payload kind carried by the signaling channel.
///
/// `offer`, `answer` and `ice-candidate` are addressed to a single peer via
/// `targetUserId`; the remaining kinds fan out to the whole room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Payload {
    Join {
        room: String,
    },
    Leave {
        room: String,
    },
    #[serde(rename_all = "camelCase")]
    PeerJoined {
        user_id: String,
    },
    #[serde(rename_all = "camelCase")]
    PeerLeft {
        user_id: String,
    },
    #[serde(rename_all = "camelCase")]
    Offer {
        target_user_id: String,
        user_id: String,
        offer: SessionDescription,
        room: String,
    },
    #[serde(rename_all = "camelCase")]
    Answer {
        target_user_id: String,
        user_id: String,
        answer: SessionDescription,
        room: String,
    },
    #[serde(rename_all = "camelCase")]
    IceCandidate {
        target_user_id: String,
        user_id: String,
        candidate: IceCandidateInit,
        room: String,
    },
    #[serde(rename_all = "camelCase")]
    StrokeCommitted {
        room: String,
        stroke: Stroke,
    },
    #[serde(rename_all = "camelCase")]
    StrokesReplaced {
        room: String,
        surviving_strokes: Vec<Stroke>,
    },
}

impl Payload {
    /// Decode one payload from its wire form.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Unrecognized(e.to_string()))
    }

    /// Encode this payload to its wire form.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// The peer this payload is addressed to, if it is targeted rather than
    /// room-wide.
    pub fn target(&self) -> Option<&str> {
        match self {
            Payload::Offer { target_user_id, .. }
            | Payload::Answer { target_user_id, .. }
            | Payload::IceCandidate { target_user_id, .. } => Some(target_user_id),
            _ => None,
        }
    }

    /// The room this payload belongs to, when it carries one.
    pub fn room(&self) -> Option<&str> {
        match self {
            Payload::Join { room }
            | Payload::Leave { room }
            | Payload::Offer { room, .. }
            | Payload::Answer { room, .. }
            | Payload::IceCandidate { room, .. }
            | Payload::StrokeCommitted { room, .. }
            | Payload::StrokesReplaced { room, .. } => Some(room),
            Payload::PeerJoined { .. } | Payload::PeerLeft { .. } => None,
        }
    }
}
