//! Handler modules

pub mod chat;
pub mod connection;
pub mod room;
pub mod signaling;

pub use chat::*;
pub use connection::*;
pub use room::*;
pub use signaling::*;

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Dispatches one decoded client message to its handler.
pub async fn dispatch(
    state: &Arc<AppState>,
    peer_id: &str,
    sender: &UnboundedSender<ServerMessage>,
    msg: ClientMessage,
) {
    match msg {
        ClientMessage::Heartbeat => {
            handle_heartbeat(sender);
        }
        ClientMessage::Join {
            room_id,
            display_name,
        } => {
            handle_join(state.clone(), peer_id, &room_id, &display_name).await;
        }
        ClientMessage::Leave => {
            handle_leave(state.clone(), peer_id).await;
        }
        ClientMessage::Signal { target, payload } => {
            handle_signal(state.clone(), peer_id, &target, payload).await;
        }
        ClientMessage::Chat { text, display_name } => {
            handle_chat(state.clone(), peer_id, &text, &display_name).await;
        }
        ClientMessage::Typing {
            room_id: _,
            is_typing,
            display_name,
        } => {
            handle_typing(state.clone(), peer_id, is_typing, &display_name).await;
        }
    }
}
