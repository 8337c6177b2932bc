//! # parley-protocol
//!
//! Wire format of the signaling relay.
//!
//! - Inbound frame classification (`join` vs relay types vs noise)
//! - Server-emitted event frames (`peer-joined`, departure `bye`)
//!
//! Relay payloads (`sdp`, `candidate`, ...) are deliberately NOT modeled:
//! the relay forwards the raw frame untouched, so this crate only extracts
//! the fields needed for routing.

#![deny(unsafe_code)]

pub mod message;

pub use message::{EnvelopeError, Inbound, ServerEvent, SignalKind};
