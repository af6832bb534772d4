//! Message relay: the single fan-out path between participant connections.
//!
//! Delivery is fire-and-forget. A participant that disconnected by the time
//! a message is routed simply does not receive it.

use crate::protocol::ServerMessage;
use crate::state::AppState;

/// Forwards a message to exactly one participant. No room co-membership
/// check: only room-mates are expected to target each other.
pub fn send_to_peer(state: &AppState, peer_id: &str, message: ServerMessage) {
    match state.peers.get(peer_id) {
        Some(session) => {
            let _ = session.sender.send(message);
        }
        None => {
            tracing::debug!(target_id = %peer_id, "Dropped message for stale target");
        }
    }
}

/// Fans a message out to every member of the room, optionally excluding the
/// sender.
pub async fn broadcast_to_room(
    state: &AppState,
    room_id: &str,
    exclude: Option<&str>,
    message: ServerMessage,
) {
    if let Some(room) = state.rooms.get(room_id) {
        let members = room.members.read().await;
        for peer_id in members.iter() {
            if exclude == Some(peer_id.as_str()) {
                continue;
            }
            if let Some(session) = state.peers.get(peer_id) {
                let _ = session.sender.send(message.clone());
            }
        }
    }
}
