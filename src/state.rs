//! Application state management

use crate::chat::{ChatLog, TypingState};
use crate::config::Config;
use crate::protocol::ServerMessage;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc::UnboundedSender, RwLock};

/// Global application state
pub struct AppState {
    /// Room registry (room_id -> Room)
    pub rooms: DashMap<String, Room>,
    /// Peer sessions (participant_id -> PeerSession)
    pub peers: DashMap<String, PeerSession>,
    /// Configuration
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            rooms: DashMap::new(),
            peers: DashMap::new(),
            config: Arc::new(config),
        }
    }

    /// Room the participant is currently registered to, if any.
    pub async fn current_room_of(&self, participant_id: &str) -> Option<String> {
        match self.peers.get(participant_id) {
            Some(session) => session.room_id.read().await.clone(),
            None => None,
        }
    }
}

/// One named session. Owns its chat log and typing state so all three are
/// deleted in the same instant the last member leaves.
pub struct Room {
    #[allow(dead_code)]
    pub id: String,
    /// Member ids in arrival order. The order is part of the roster contract.
    pub members: RwLock<Vec<String>>,
    pub chat: RwLock<ChatLog>,
    pub typing: RwLock<TypingState>,
    pub created_at: Instant,
}

impl Room {
    pub fn new(id: String) -> Self {
        Self {
            id,
            members: RwLock::new(Vec::new()),
            chat: RwLock::new(ChatLog::new()),
            typing: RwLock::new(TypingState::new()),
            created_at: Instant::now(),
        }
    }
}

/// Per-connection participant session
pub struct PeerSession {
    #[allow(dead_code)]
    pub id: String,
    pub display_name: RwLock<String>,
    pub room_id: RwLock<Option<String>>,
    pub sender: UnboundedSender<ServerMessage>,
    #[allow(dead_code)]
    pub connected_at: Instant,
}

impl PeerSession {
    pub fn new(id: String, sender: UnboundedSender<ServerMessage>) -> Self {
        Self {
            id,
            display_name: RwLock::new("Anonymous".to_string()),
            room_id: RwLock::new(None),
            sender,
            connected_at: Instant::now(),
        }
    }
}
