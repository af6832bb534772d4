//! WebRTC signaling relay handler

use crate::protocol::{ServerMessage, SignalPayload};
use crate::relay;
use crate::state::AppState;
use std::sync::Arc;

/// Routes one signaling payload to exactly one target participant. The
/// payload is opaque here; only PeerLink interprets it. A target that is no
/// longer connected is a silent drop.
pub async fn handle_signal(
    state: Arc<AppState>,
    from_peer_id: &str,
    target: &str,
    payload: SignalPayload,
) {
    relay::send_to_peer(
        &state,
        target,
        ServerMessage::Signal {
            from: from_peer_id.to_string(),
            payload,
        },
    );

    tracing::debug!(
        from = %from_peer_id,
        target = %target,
        "Relayed signal"
    );
}
