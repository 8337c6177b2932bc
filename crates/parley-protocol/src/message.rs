//! Signaling message envelope.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Type tag of a client-originated signaling message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// Room membership request.
    Join,
    /// Session description offer (relayed verbatim).
    Offer,
    /// Session description answer (relayed verbatim).
    Answer,
    /// Connectivity candidate (relayed verbatim).
    Ice,
    /// Peer-initiated hangup (relayed verbatim, never a registry leave).
    Bye,
}

impl SignalKind {
    /// Map a wire tag to its kind. Unrecognized tags return `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "join" => Some(Self::Join),
            "offer" => Some(Self::Offer),
            "answer" => Some(Self::Answer),
            "ice" => Some(Self::Ice),
            "bye" => Some(Self::Bye),
            _ => None,
        }
    }

    /// The wire tag for this kind.
    pub fn as_tag(self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::Ice => "ice",
            Self::Bye => "bye",
        }
    }

    /// Whether frames of this kind are forwarded to room peers as-is.
    pub fn is_relay(self) -> bool {
        !matches!(self, Self::Join)
    }
}

/// Why an inbound frame was rejected.
///
/// Every variant is handled the same way by the dispatcher: the frame is
/// dropped silently and the connection stays in its current state. The
/// taxonomy exists so the drop is an explicit decision, not a swallowed
/// exception.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The frame is not a JSON object with a string `type` field.
    #[error("unparseable frame: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The `type` tag is not part of the protocol.
    #[error("unrecognized type tag `{0}`")]
    UnknownTag(String),
    /// A `join` or relay frame without the `room` it applies to.
    #[error("`{tag}` frame missing required `room` field")]
    MissingRoom {
        /// The tag of the offending frame.
        tag: &'static str,
    },
}

/// Raw deserialization target. Only routing fields; the rest of the frame
/// stays opaque.
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    tag: String,
    #[serde(default)]
    room: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

/// A classified inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// `{"type":"join","room":...}` with an optional `role`.
    Join {
        /// Room identifier to join. May be empty (a degenerate room).
        room: String,
        /// Role advertised by the joiner, carried into `peer-joined`.
        role: Option<String>,
    },
    /// An `offer`/`answer`/`ice`/`bye` frame to forward verbatim.
    Relay {
        /// Which relay tag the frame carried.
        kind: SignalKind,
        /// Room whose members (minus the sender) receive the frame.
        room: String,
    },
}

impl Inbound {
    /// Classify a raw text frame.
    pub fn parse(raw: &str) -> Result<Self, EnvelopeError> {
        let envelope: RawEnvelope = serde_json::from_str(raw)?;
        let Some(kind) = SignalKind::from_tag(&envelope.tag) else {
            return Err(EnvelopeError::UnknownTag(envelope.tag));
        };
        let tag = kind.as_tag();
        let Some(room) = envelope.room else {
            return Err(EnvelopeError::MissingRoom { tag });
        };
        if kind.is_relay() {
            Ok(Self::Relay { kind, room })
        } else {
            Ok(Self::Join {
                room,
                role: envelope.role,
            })
        }
    }
}

/// A frame originated by the relay itself.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Sent to existing room members when a new peer joins.
    #[serde(rename = "peer-joined")]
    PeerJoined {
        /// Role the joiner advertised, omitted when absent.
        #[serde(skip_serializing_if = "Option::is_none")]
        role: Option<String>,
    },
    /// Departure notice sent to remaining members when a peer's transport
    /// terminates. Wire-identical to a relayed client `bye` for
    /// compatibility, but produced by a separate code path.
    #[serde(rename = "bye")]
    Bye,
}

impl ServerEvent {
    /// Serialize to a wire frame.
    pub fn to_frame(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to serialize server event");
            String::new()
        })
    }
}
