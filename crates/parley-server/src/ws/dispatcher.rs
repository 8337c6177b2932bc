//! Inbound frame dispatch.
//!
//! Classifies a raw text frame into a registry operation. Relay frames
//! are forwarded verbatim: the parser only extracts routing fields, and
//! the original string (payload fields included) is what fans out.

use std::sync::Arc;

use parley_protocol::{Inbound, ServerEvent};
use tracing::{debug, info};

use super::connection::PeerConnection;
use super::registry::{DeliveryReport, JoinOutcome, RoomRegistry};

/// What a single inbound frame did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// The peer joined a room. `announced` is false when the join was a
    /// no-op re-join and no notice went out.
    Joined {
        /// Room joined.
        room: String,
        /// Whether existing members were told about it.
        announced: bool,
    },
    /// A signaling frame was relayed to the peer's room.
    Relayed {
        /// Target room.
        room: String,
        /// Fan-out accounting.
        report: DeliveryReport,
    },
    /// The frame was malformed or unrecognized and was dropped.
    Ignored,
}

/// Route one inbound text frame.
///
/// Unparseable or unknown frames are logged at debug and dropped; they
/// never terminate the connection.
pub fn dispatch_frame(registry: &RoomRegistry, conn: &Arc<PeerConnection>, raw: &str) -> Dispatch {
    let inbound = match Inbound::parse(raw) {
        Ok(inbound) => inbound,
        Err(err) => {
            debug!(peer = %conn.id, %err, "ignoring frame");
            return Dispatch::Ignored;
        }
    };

    match inbound {
        Inbound::Join { room, role } => {
            let outcome = registry.join(&room, conn);
            let announced = outcome != JoinOutcome::AlreadyMember;
            if announced {
                let notice = Arc::new(ServerEvent::PeerJoined { role }.to_frame());
                let report = registry.broadcast(&room, notice, &conn.id);
                info!(
                    peer = %conn.id,
                    room,
                    ?outcome,
                    peers_told = report.delivered,
                    "peer joined room"
                );
            }
            Dispatch::Joined { room, announced }
        }
        Inbound::Relay { kind, room } => {
            let report = registry.broadcast(&room, Arc::new(raw.to_owned()), &conn.id);
            debug!(
                peer = %conn.id,
                room,
                kind = kind.as_tag(),
                delivered = report.delivered,
                failed = report.failed,
                "relayed frame"
            );
            Dispatch::Relayed { room, report }
        }
    }
}
