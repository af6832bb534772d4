//! Connection lifecycle handlers

use crate::protocol::ServerMessage;
use crate::state::{AppState, PeerSession};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// Registers a new connection and assigns its participant id.
pub async fn handle_connection(
    state: Arc<AppState>,
    sender: UnboundedSender<ServerMessage>,
) -> String {
    let peer_id = Uuid::new_v4().to_string();

    state
        .peers
        .insert(peer_id.clone(), PeerSession::new(peer_id.clone(), sender.clone()));

    let _ = sender.send(ServerMessage::Connected {
        participant_id: peer_id.clone(),
    });

    tracing::info!(peer_id = %peer_id, "New connection established");
    peer_id
}

/// Tears down a closed connection: leave the current room, drop the session.
pub async fn handle_disconnect(state: Arc<AppState>, peer_id: &str) {
    if let Some((_, session)) = state.peers.remove(peer_id) {
        let room_id = session.room_id.read().await.clone();
        if let Some(room_id) = room_id {
            crate::handlers::room::leave_room_internal(&state, peer_id, &room_id).await;
        }
    }
    tracing::info!(peer_id = %peer_id, "Connection closed");
}

/// Heartbeat reply
pub fn handle_heartbeat(sender: &UnboundedSender<ServerMessage>) {
    let _ = sender.send(ServerMessage::HeartbeatAck);
}
