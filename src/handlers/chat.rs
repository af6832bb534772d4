//! Chat and typing-presence handlers

use crate::protocol::ServerMessage;
use crate::relay;
use crate::state::AppState;
use std::sync::Arc;

/// Appends a chat message to the sender's room and fans it out to everyone
/// else. The sender's room comes from the registry, never from the payload.
pub async fn handle_chat(state: Arc<AppState>, peer_id: &str, text: &str, display_name: &str) {
    let Some(room_id) = state.current_room_of(peer_id).await else {
        tracing::warn!(peer_id = %peer_id, "Chat from participant in no room dropped");
        return;
    };

    let stored = {
        let Some(room) = state.rooms.get(&room_id) else {
            tracing::warn!(peer_id = %peer_id, room_id = %room_id, "Chat for missing room dropped");
            return;
        };
        let stored = room.chat.write().await.append(peer_id, display_name, text);
        // Sending a message implicitly stops typing.
        room.typing.write().await.set(peer_id, display_name, false);
        stored
    };

    relay::broadcast_to_room(
        &state,
        &room_id,
        Some(peer_id),
        ServerMessage::ChatDelivered {
            text: stored.text,
            display_name: stored.sender_name,
            sender_id: stored.sender_id,
            timestamp: stored.timestamp,
        },
    )
    .await;

    tracing::debug!(peer_id = %peer_id, room_id = %room_id, "Relayed chat message");
}

/// Updates the sender's typing entry and fans the change out to the rest of
/// the room.
pub async fn handle_typing(
    state: Arc<AppState>,
    peer_id: &str,
    is_typing: bool,
    display_name: &str,
) {
    let Some(room_id) = state.current_room_of(peer_id).await else {
        tracing::warn!(peer_id = %peer_id, "Typing event from participant in no room dropped");
        return;
    };

    {
        let Some(room) = state.rooms.get(&room_id) else {
            tracing::warn!(peer_id = %peer_id, room_id = %room_id, "Typing event for missing room dropped");
            return;
        };
        room.typing
            .write()
            .await
            .set(peer_id, display_name, is_typing);
    }

    relay::broadcast_to_room(
        &state,
        &room_id,
        Some(peer_id),
        ServerMessage::TypingUpdate {
            sender_id: peer_id.to_string(),
            is_typing,
            display_name: display_name.to_string(),
        },
    )
    .await;
}
