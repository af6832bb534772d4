//! Room membership handlers

use crate::protocol::{RosterEntry, ServerMessage};
use crate::relay;
use crate::state::{AppState, Room};
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

/// Admits a participant into a room and notifies the membership.
///
/// The member list mutation, the roster snapshot, and the resulting sends all
/// happen while the room's map entry is held, so every broadcast roster
/// matches the member set at that instant. Joining a room the participant is
/// already in is idempotent: the roster is re-sent to the caller only and the
/// chat history is not replayed again.
pub async fn handle_join(state: Arc<AppState>, peer_id: &str, room_id: &str, display_name: &str) {
    let room_id = room_id.trim().to_string();
    if room_id.is_empty() {
        tracing::warn!(peer_id = %peer_id, "Join with empty room id dropped");
        return;
    }

    let display_name = {
        let trimmed = display_name.trim();
        if trimmed.is_empty() {
            "Anonymous".to_string()
        } else {
            trimmed.to_string()
        }
    };

    // Record the display name and find out where the participant currently is.
    let previous_room = match state.peers.get(peer_id) {
        Some(session) => {
            *session.display_name.write().await = display_name.clone();
            session.room_id.read().await.clone()
        }
        None => {
            tracing::warn!(peer_id = %peer_id, "Join from unregistered connection dropped");
            return;
        }
    };

    // At most one room per participant.
    if let Some(previous) = previous_room {
        if previous == room_id {
            resend_roster(&state, peer_id, &room_id).await;
            return;
        }
        leave_room_internal(&state, peer_id, &previous).await;
    }

    {
        let room = state.rooms.entry(room_id.clone()).or_insert_with(|| {
            tracing::info!(room_id = %room_id, "Room created");
            Room::new(room_id.clone())
        });

        let member_ids: Vec<String> = {
            let mut members = room.members.write().await;
            members.push(peer_id.to_string());
            members.clone()
        };

        let roster = build_roster(&state, &member_ids).await;
        let update = ServerMessage::RosterUpdate {
            joined_id: peer_id.to_string(),
            members: roster.clone(),
        };
        for entry in &roster {
            relay::send_to_peer(&state, &entry.id, update.clone());
        }

        // Late joiners get the room's history once, then the current typers.
        for message in room.chat.read().await.entries() {
            relay::send_to_peer(
                &state,
                peer_id,
                ServerMessage::ChatDelivered {
                    text: message.text.clone(),
                    display_name: message.sender_name.clone(),
                    sender_id: message.sender_id.clone(),
                    timestamp: message.timestamp,
                },
            );
        }
        for (typer_id, typer_name) in room.typing.read().await.view() {
            relay::send_to_peer(
                &state,
                peer_id,
                ServerMessage::TypingUpdate {
                    sender_id: typer_id,
                    is_typing: true,
                    display_name: typer_name,
                },
            );
        }

        tracing::info!(
            peer_id = %peer_id,
            room_id = %room_id,
            user_count = member_ids.len(),
            "User joined room"
        );
    }

    if let Some(session) = state.peers.get(peer_id) {
        *session.room_id.write().await = Some(room_id);
    }
}

/// Removes a participant from a room, notifies the remaining members, and
/// deletes the room in the same critical section when it empties. The room
/// owns its chat log and typing state, so the three are destroyed together.
pub async fn leave_room_internal(state: &AppState, peer_id: &str, room_id: &str) {
    if let Entry::Occupied(entry) = state.rooms.entry(room_id.to_string()) {
        let (remaining, was_member) = {
            let room = entry.get();
            let mut members = room.members.write().await;
            let before = members.len();
            members.retain(|m| m != peer_id);
            (members.clone(), members.len() != before)
        };
        if !was_member {
            return;
        }
        entry.get().typing.write().await.clear_participant(peer_id);

        for member in &remaining {
            relay::send_to_peer(
                state,
                member,
                ServerMessage::PeerLeft {
                    departed_id: peer_id.to_string(),
                },
            );
        }

        tracing::info!(
            peer_id = %peer_id,
            room_id = %room_id,
            remaining = remaining.len(),
            "User left room"
        );

        if remaining.is_empty() {
            entry.remove();
            tracing::info!(room_id = %room_id, "Room deleted");
        }
    }
}

/// Explicit leave without dropping the connection.
pub async fn handle_leave(state: Arc<AppState>, peer_id: &str) {
    let room_id = match state.peers.get(peer_id) {
        Some(session) => session.room_id.read().await.clone(),
        None => None,
    };

    if let Some(room_id) = room_id {
        leave_room_internal(&state, peer_id, &room_id).await;
        if let Some(session) = state.peers.get(peer_id) {
            *session.room_id.write().await = None;
        }
    }
}

async fn resend_roster(state: &AppState, peer_id: &str, room_id: &str) {
    if let Some(room) = state.rooms.get(room_id) {
        let member_ids: Vec<String> = room.members.read().await.clone();
        let roster = build_roster(state, &member_ids).await;
        relay::send_to_peer(
            state,
            peer_id,
            ServerMessage::RosterUpdate {
                joined_id: peer_id.to_string(),
                members: roster,
            },
        );
        tracing::debug!(peer_id = %peer_id, room_id = %room_id, "Repeat join, roster re-sent");
    }
}

async fn build_roster(state: &AppState, member_ids: &[String]) -> Vec<RosterEntry> {
    let mut roster = Vec::with_capacity(member_ids.len());
    for id in member_ids {
        let display_name = match state.peers.get(id) {
            Some(session) => session.display_name.read().await.clone(),
            None => "Anonymous".to_string(),
        };
        roster.push(RosterEntry {
            id: id.clone(),
            display_name,
        });
    }
    roster
}
