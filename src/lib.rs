//! CallBuddy real-time signaling core.
//!
//! Server side: session registry, message relay, chat log and typing state
//! behind a WebSocket endpoint. Client side: the per-peer negotiation state
//! machine (`peer` module) that drives an external WebRTC engine.

pub mod chat;
pub mod config;
pub mod handlers;
pub mod peer;
pub mod protocol;
pub mod relay;
pub mod state;
