//! WebSocket connection management, room registry, and signaling dispatch.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `connection` | Per-peer handle: id, outbound queue, liveness flags |
//! | `registry` | Room membership and best-effort fan-out |
//! | `dispatcher` | Inbound frame classification → registry operations |
//! | `heartbeat` | Periodic ping/pong for connection liveness detection |
//!
//! ## Data Flow
//!
//! reader loop → `dispatcher` → `registry` (join / fan-out) → per-peer
//! outbound queues → writer tasks. On disconnect the reader's owner calls
//! `registry.leave` exactly once.

pub mod connection;
pub mod dispatcher;
pub mod heartbeat;
pub mod registry;
