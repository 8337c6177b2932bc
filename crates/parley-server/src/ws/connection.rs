//! Per-peer connection state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use uuid::Uuid;

/// Unique peer identifier, minted at accept time.
///
/// Stands in for reference equality on the underlying socket: the socket
/// itself is owned by its transport task and never leaves it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PeerId(String);

impl PeerId {
    /// Mint a fresh id.
    pub fn new() -> Self {
        Self(format!("peer_{}", Uuid::now_v7()))
    }
}

impl Default for PeerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Routing handle for one connected peer.
///
/// The registry holds these by `Arc`; the socket stays with the transport
/// task, which is the only place the connection is ever closed.
pub struct PeerConnection {
    /// Unique peer id.
    pub id: PeerId,
    /// Outbound queue drained by the peer's writer task.
    tx: mpsc::Sender<Arc<String>>,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Whether the peer has shown activity since the last heartbeat check.
    is_alive: AtomicBool,
    /// Count of frames dropped due to a full or closed queue.
    dropped_frames: AtomicU64,
}

impl PeerConnection {
    /// Create a new connection handle.
    pub fn new(id: PeerId, tx: mpsc::Sender<Arc<String>>) -> Self {
        Self {
            id,
            tx,
            connected_at: Instant::now(),
            is_alive: AtomicBool::new(true),
            dropped_frames: AtomicU64::new(0),
        }
    }

    /// Queue a text frame for delivery.
    ///
    /// Non-blocking: returns `false` if the queue is full or the writer is
    /// gone, and increments the dropped-frame counter. Callers treat a
    /// `false` as a per-recipient delivery failure to be counted, never an
    /// error to propagate.
    pub fn send(&self, frame: Arc<String>) -> bool {
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped_frames.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Total frames dropped for this peer.
    pub fn drop_count(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    /// Mark the peer as alive (pong or any inbound frame).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
    }

    /// Check and reset the alive flag.
    ///
    /// Returns `true` if the peer showed activity since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
