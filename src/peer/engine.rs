//! Seam to the external WebRTC engine
//!
//! The engine owns codecs, transports, and the media path. This crate only
//! sequences control-plane calls against it, so the whole surface is a pair
//! of object-safe traits the embedder implements.

use crate::peer::media::MediaStream;
use crate::protocol::{IceCandidate, SessionDescription};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("description error: {0}")]
    Description(String),
    #[error("candidate error: {0}")]
    Candidate(String),
    #[error("media capture error: {0}")]
    Capture(String),
    #[error("connection closed")]
    Closed,
}

/// ICE servers handed to every new peer connection.
#[derive(Debug, Clone)]
pub struct IceConfig {
    pub stun_servers: Vec<String>,
}

impl Default for IceConfig {
    fn default() -> Self {
        Self {
            stun_servers: vec!["stun:stun.l.google.com:19302".to_string()],
        }
    }
}

/// Control-plane surface of one underlying peer connection.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription, EngineError>;

    async fn create_answer(&self) -> Result<SessionDescription, EngineError>;

    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), EngineError>;

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), EngineError>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), EngineError>;

    /// Replaces every outgoing sender with the tracks of `stream`.
    async fn replace_local_tracks(&self, stream: &MediaStream) -> Result<(), EngineError>;

    /// Releases the underlying transport. Idempotent.
    fn close(&self);
}

/// Creates engine connections for new peer links.
pub trait PeerConnectionFactory: Send + Sync {
    fn create(&self, ice: &IceConfig) -> Result<Arc<dyn PeerConnection>, EngineError>;
}
