//! # parley-server
//!
//! Axum HTTP + `WebSocket` signaling relay.
//!
//! - `WebSocket` gateway: one reader loop + one writer task per peer,
//!   bounded per-peer send queues, ping/pong heartbeat
//! - Room registry: membership tracking and best-effort fan-out to room
//!   peers (always excluding the sender)
//! - Signaling dispatcher: `join` handling and verbatim relay of
//!   `offer`/`answer`/`ice`/`bye` frames
//! - Graceful shutdown via `tokio::signal` + `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod server;
pub mod shutdown;
pub mod ws;
