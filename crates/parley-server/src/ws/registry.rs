//! Room membership and best-effort fan-out.
//!
//! The registry is the only shared mutable state in the relay. Every
//! read-modify-write sequence runs under one internal mutex, and the lock
//! is never held across an await point or a delivery: fan-out snapshots
//! the membership first, then delivers with the lock released.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use parley_protocol::ServerEvent;
use tracing::debug;

use super::connection::{PeerConnection, PeerId};

/// Result of a `join` call, naming the room state transition it caused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The room did not exist; it was created with this peer as its first
    /// member.
    Created,
    /// The peer was added to an existing room.
    Joined,
    /// The peer was already a member of this room; nothing changed.
    AlreadyMember,
    /// The peer was a member of a different room and was moved here. The
    /// old room received a departure notice and was pruned if it emptied.
    Moved {
        /// Room the peer left.
        from: String,
    },
}

/// Result of a `leave` call for a peer that was a room member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    /// Room the peer was removed from.
    pub room: String,
    /// How many remaining members the departure notice reached.
    pub peers_notified: usize,
    /// Whether the room emptied and was deleted.
    pub room_closed: bool,
}

/// Per-broadcast delivery accounting.
///
/// Delivery is best-effort by contract: callers are expected to discard
/// this report (or log it) — a failed recipient is never an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Recipients whose queue accepted the frame.
    pub delivered: usize,
    /// Recipients skipped because their queue was full or closed.
    pub failed: usize,
}

#[derive(Default)]
struct RegistryInner {
    /// Room id → membership set.
    rooms: HashMap<String, HashMap<PeerId, Arc<PeerConnection>>>,
    /// Peer → the one room it belongs to.
    member_of: HashMap<PeerId, String>,
}

impl RegistryInner {
    /// Remove a peer from its room, pruning the room if it empties.
    ///
    /// Returns the room id and a snapshot of the remaining members.
    fn detach(&mut self, peer: &PeerId) -> Option<(String, Vec<Arc<PeerConnection>>)> {
        let room = self.member_of.remove(peer)?;
        let Some(members) = self.rooms.get_mut(&room) else {
            return Some((room, Vec::new()));
        };
        let _ = members.remove(peer);
        let remaining: Vec<Arc<PeerConnection>> = members.values().cloned().collect();
        if remaining.is_empty() {
            // A room id maps to a non-empty set or is absent, never empty.
            let _ = self.rooms.remove(&room);
        }
        Some((room, remaining))
    }
}

/// Process-wide room membership registry.
///
/// Injectable rather than ambient: each server instance owns one, and
/// tests build as many independent instances as they need.
pub struct RoomRegistry {
    inner: Mutex<RegistryInner>,
}

impl RoomRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    /// Add a peer to a room, creating the room if absent.
    ///
    /// Idempotent per peer: re-joining the current room is a no-op. A peer
    /// can belong to at most one room, so joining a different room first
    /// runs the departure path for the old one (notice included).
    pub fn join(&self, room: &str, conn: &Arc<PeerConnection>) -> JoinOutcome {
        let (moved, created) = {
            let mut inner = self.inner.lock();
            if inner.member_of.get(&conn.id).is_some_and(|r| r == room) {
                return JoinOutcome::AlreadyMember;
            }
            let moved = inner.detach(&conn.id);
            let created = !inner.rooms.contains_key(room);
            let members = inner.rooms.entry(room.to_owned()).or_default();
            let _ = members.insert(conn.id.clone(), Arc::clone(conn));
            let _ = inner.member_of.insert(conn.id.clone(), room.to_owned());
            (moved, created)
        };

        match moved {
            Some((from, remaining)) => {
                let _ = notify_departure(&remaining);
                debug!(peer = %conn.id, from, to = room, "peer moved rooms");
                JoinOutcome::Moved { from }
            }
            None if created => JoinOutcome::Created,
            None => JoinOutcome::Joined,
        }
    }

    /// Remove a peer from whichever room it belongs to.
    ///
    /// Sends `{"type":"bye"}` to the remaining members and deletes the
    /// room if it emptied. Silent no-op for peers that never joined.
    pub fn leave(&self, peer: &PeerId) -> Option<Departure> {
        let (room, remaining) = self.inner.lock().detach(peer)?;
        let room_closed = remaining.is_empty();
        let peers_notified = notify_departure(&remaining);
        Some(Departure {
            room,
            peers_notified,
            room_closed,
        })
    }

    /// Deliver a frame to every member of `room` except `exclude`.
    ///
    /// Snapshot-then-iterate: the recipient set is captured under the
    /// lock, then deliveries happen with the lock released, so a slow or
    /// dead peer never stalls unrelated registry operations. Per-recipient
    /// failure is counted, never raised; callers discard the report by
    /// design.
    pub fn broadcast(&self, room: &str, frame: Arc<String>, exclude: &PeerId) -> DeliveryReport {
        let recipients: Vec<Arc<PeerConnection>> = {
            let inner = self.inner.lock();
            match inner.rooms.get(room) {
                Some(members) => members
                    .values()
                    .filter(|c| c.id != *exclude)
                    .cloned()
                    .collect(),
                None => Vec::new(),
            }
        };

        let mut report = DeliveryReport::default();
        for conn in recipients {
            if conn.send(Arc::clone(&frame)) {
                report.delivered += 1;
            } else {
                report.failed += 1;
                debug!(peer = %conn.id, room, "dropped frame for unreachable peer");
            }
        }
        report
    }

    /// Number of live rooms.
    pub fn room_count(&self) -> usize {
        self.inner.lock().rooms.len()
    }

    /// Whether a room currently exists.
    pub fn contains_room(&self, room: &str) -> bool {
        self.inner.lock().rooms.contains_key(room)
    }

    /// Membership size of a room (`0` if absent).
    pub fn member_count(&self, room: &str) -> usize {
        self.inner
            .lock()
            .rooms
            .get(room)
            .map_or(0, HashMap::len)
    }

    /// The room a peer belongs to, if any.
    pub fn room_of(&self, peer: &PeerId) -> Option<String> {
        self.inner.lock().member_of.get(peer).cloned()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Send the departure notice to a membership snapshot. Returns how many
/// queues accepted it.
fn notify_departure(remaining: &[Arc<PeerConnection>]) -> usize {
    let frame = Arc::new(ServerEvent::Bye.to_frame());
    remaining
        .iter()
        .filter(|conn| conn.send(Arc::clone(&frame)))
        .count()
}
