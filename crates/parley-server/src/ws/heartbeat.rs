//! Heartbeat liveness monitoring.
//!
//! The writer task sends the pings; this loop only watches the alive
//! flag, which the reader sets on every pong or inbound frame.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use super::connection::PeerConnection;

/// Outcome of the heartbeat loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// The peer stopped responding within the timeout window.
    TimedOut,
    /// The heartbeat was cancelled externally.
    Cancelled,
}

/// Watch a connection's liveness.
///
/// At each `interval` tick the alive flag is checked and reset. A peer
/// that shows no activity for `timeout / interval` consecutive ticks
/// (clamped to at least 1) is declared dead and `TimedOut` is returned;
/// the caller closes the socket.
pub async fn run_heartbeat(
    conn: Arc<PeerConnection>,
    interval: Duration,
    timeout: Duration,
    cancel: CancellationToken,
) -> HeartbeatResult {
    let mut ticks = time::interval(interval);
    let mut missed: u32 = 0;
    #[allow(clippy::cast_possible_truncation)]
    let max_missed = (timeout.as_millis() / interval.as_millis().max(1)).max(1) as u32;

    // The first tick fires immediately; consume it so a fresh connection
    // gets a full interval before its first check.
    let _ = ticks.tick().await;

    loop {
        tokio::select! {
            _ = ticks.tick() => {
                if conn.check_alive() {
                    missed = 0;
                } else {
                    missed += 1;
                    if missed >= max_missed {
                        return HeartbeatResult::TimedOut;
                    }
                }
            }
            () = cancel.cancelled() => {
                return HeartbeatResult::Cancelled;
            }
        }
    }
}
