//! Client-side peer negotiation core
//!
//! Everything here is control-plane: it sequences offers, answers, and ICE
//! candidates against an external WebRTC engine reached through the traits
//! in [`engine`]. Media bytes never pass through this crate.

pub mod engine;
pub mod link;
pub mod media;
pub mod queue;
pub mod session;

pub use engine::{EngineError, IceConfig, PeerConnection, PeerConnectionFactory};
pub use link::{LinkState, PeerLink, Role};
pub use media::{MediaSource, MediaStream, MediaTrack, MediaTrackController, TrackKind, TrackSource};
pub use queue::CandidateQueue;
pub use session::{CallSession, ChatEntry};
