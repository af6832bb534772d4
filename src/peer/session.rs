//! Call session coordinator
//!
//! Owns the remote-id → PeerLink map and everything that mutates it: roster
//! updates, routed signals, peer departures, and local media changes. Each
//! link sits behind its own async mutex, so negotiation steps for one peer
//! are strictly sequenced while different peers negotiate concurrently.

use crate::chat::now_millis;
use crate::peer::engine::{EngineError, IceConfig, PeerConnectionFactory};
use crate::peer::link::{LinkState, PeerLink, Role};
use crate::peer::media::{MediaSource, MediaStream, MediaTrackController};
use crate::protocol::{ClientMessage, IceCandidate, RosterEntry, ServerMessage, SignalPayload};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::{mpsc::UnboundedSender, Mutex};

/// One row of the client-side transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatEntry {
    pub text: String,
    pub sender_name: String,
    pub sender_id: String,
    pub timestamp: u64,
    pub own: bool,
}

pub struct CallSession {
    room_id: String,
    display_name: String,
    local_id: OnceLock<String>,
    outbound: UnboundedSender<ClientMessage>,
    factory: Arc<dyn PeerConnectionFactory>,
    ice: IceConfig,
    links: Mutex<HashMap<String, Arc<Mutex<PeerLink>>>>,
    media: Mutex<MediaTrackController>,
    participants: Mutex<HashMap<String, String>>,
    messages: Mutex<Vec<ChatEntry>>,
    typing: Mutex<HashMap<String, String>>,
}

impl CallSession {
    pub fn new(
        room_id: impl Into<String>,
        display_name: impl Into<String>,
        outbound: UnboundedSender<ClientMessage>,
        factory: Arc<dyn PeerConnectionFactory>,
        ice: IceConfig,
        media_source: Arc<dyn MediaSource>,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            display_name: display_name.into(),
            local_id: OnceLock::new(),
            outbound,
            factory,
            ice,
            links: Mutex::new(HashMap::new()),
            media: Mutex::new(MediaTrackController::new(media_source)),
            participants: Mutex::new(HashMap::new()),
            messages: Mutex::new(Vec::new()),
            typing: Mutex::new(HashMap::new()),
        }
    }

    pub fn local_id(&self) -> Option<&str> {
        self.local_id.get().map(String::as_str)
    }

    /// Dispatches one server event. The transport loop feeds every inbound
    /// message through here in arrival order.
    pub async fn handle_server_message(&self, message: ServerMessage) {
        match message {
            ServerMessage::Connected { participant_id } => {
                let _ = self.local_id.set(participant_id);
                let _ = self.outbound.send(ClientMessage::Join {
                    room_id: self.room_id.clone(),
                    display_name: self.display_name.clone(),
                });
            }
            ServerMessage::HeartbeatAck => {}
            ServerMessage::RosterUpdate { joined_id, members } => {
                self.handle_roster_update(&joined_id, members).await;
            }
            ServerMessage::Signal { from, payload } => {
                self.handle_signal(&from, payload).await;
            }
            ServerMessage::ChatDelivered {
                text,
                display_name,
                sender_id,
                timestamp,
            } => {
                let own = self.local_id() == Some(sender_id.as_str());
                self.messages.lock().await.push(ChatEntry {
                    text,
                    sender_name: display_name,
                    sender_id: sender_id.clone(),
                    timestamp,
                    own,
                });
                // A delivered message means its sender stopped typing.
                self.typing.lock().await.remove(&sender_id);
            }
            ServerMessage::TypingUpdate {
                sender_id,
                is_typing,
                display_name,
            } => {
                let mut typing = self.typing.lock().await;
                if is_typing {
                    typing.insert(sender_id, display_name);
                } else {
                    typing.remove(&sender_id);
                }
            }
            ServerMessage::PeerLeft { departed_id } => {
                self.handle_peer_left(&departed_id).await;
            }
        }
    }

    /// Creates links for unseen members. When the roster change is our own
    /// join, we are the newly joined side of every pair and open all the
    /// offer rounds; otherwise we hold an answer ready for the joiner.
    async fn handle_roster_update(&self, joined_id: &str, members: Vec<RosterEntry>) {
        let Some(local_id) = self.local_id().map(str::to_string) else {
            tracing::warn!("Roster update before id assignment dropped");
            return;
        };

        {
            let mut participants = self.participants.lock().await;
            participants.clear();
            for member in &members {
                if member.id != local_id {
                    participants.insert(member.id.clone(), member.display_name.clone());
                }
            }
        }

        let joining = joined_id == local_id;
        let role = if joining {
            Role::Initiator
        } else {
            Role::Responder
        };

        let mut created = Vec::new();
        for member in &members {
            if member.id == local_id {
                continue;
            }
            match self.ensure_link(&member.id, role).await {
                Ok(Some(link)) => created.push(link),
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(remote_id = %member.id, %error, "Peer link creation failed");
                }
            }
        }

        if joining {
            join_all(created.iter().map(|link| async move {
                link.lock().await.send_offer().await;
            }))
            .await;
        }
    }

    async fn ensure_link(
        &self,
        remote_id: &str,
        role: Role,
    ) -> Result<Option<Arc<Mutex<PeerLink>>>, EngineError> {
        if self.links.lock().await.contains_key(remote_id) {
            return Ok(None);
        }

        let conn = self.factory.create(&self.ice)?;
        let stream = self.media.lock().await.stream().clone();
        conn.replace_local_tracks(&stream).await?;

        let link = Arc::new(Mutex::new(PeerLink::new(
            remote_id.to_string(),
            role,
            conn,
            self.outbound.clone(),
        )));
        self.links
            .lock()
            .await
            .insert(remote_id.to_string(), link.clone());

        tracing::debug!(remote_id = %remote_id, ?role, "Peer link created");
        Ok(Some(link))
    }

    async fn handle_signal(&self, from: &str, payload: SignalPayload) {
        let link = self.links.lock().await.get(from).cloned();
        let Some(link) = link else {
            tracing::warn!(from = %from, "Signal for unknown peer dropped");
            return;
        };

        let mut link = link.lock().await;
        match payload {
            SignalPayload::Description { description } => {
                link.apply_remote_description(description).await;
            }
            SignalPayload::Candidate { candidate } => {
                link.apply_candidate(candidate).await;
            }
        }
    }

    async fn handle_peer_left(&self, departed_id: &str) {
        let link = self.links.lock().await.remove(departed_id);
        if let Some(link) = link {
            link.lock().await.close();
        }
        self.participants.lock().await.remove(departed_id);
        self.typing.lock().await.remove(departed_id);
        tracing::info!(remote_id = %departed_id, "Peer left");
    }

    /// Forwards a locally gathered ICE candidate to one remote peer. The
    /// embedder wires the engine's candidate events here.
    pub fn send_local_candidate(&self, remote_id: &str, candidate: IceCandidate) {
        let _ = self.outbound.send(ClientMessage::Signal {
            target: remote_id.to_string(),
            payload: SignalPayload::Candidate { candidate },
        });
    }

    pub async fn send_chat(&self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        let _ = self.outbound.send(ClientMessage::Chat {
            text: text.to_string(),
            display_name: self.display_name.clone(),
        });
        // Sending a message implicitly stops typing.
        let _ = self.outbound.send(ClientMessage::Typing {
            room_id: self.room_id.clone(),
            is_typing: false,
            display_name: self.display_name.clone(),
        });

        let sender_id = self.local_id().unwrap_or_default().to_string();
        self.messages.lock().await.push(ChatEntry {
            text: text.to_string(),
            sender_name: self.display_name.clone(),
            sender_id,
            timestamp: now_millis(),
            own: true,
        });
    }

    pub fn set_typing(&self, is_typing: bool) {
        let _ = self.outbound.send(ClientMessage::Typing {
            room_id: self.room_id.clone(),
            is_typing,
            display_name: self.display_name.clone(),
        });
    }

    pub async fn set_video_enabled(&self, enabled: bool) {
        self.media.lock().await.set_video_enabled(enabled).await;
        self.renegotiate_all().await;
    }

    pub async fn set_audio_enabled(&self, enabled: bool) {
        self.media.lock().await.set_audio_enabled(enabled).await;
        self.renegotiate_all().await;
    }

    pub async fn start_screen_share(&self) {
        let result = self.media.lock().await.start_screen_share().await.map(|_| ());
        match result {
            Ok(()) => self.renegotiate_all().await,
            Err(error) => {
                tracing::warn!(%error, "Screen share not started");
            }
        }
    }

    pub async fn stop_screen_share(&self) {
        self.media.lock().await.stop_screen_share().await;
        self.renegotiate_all().await;
    }

    /// Pushes the current local stream to every link and opens a fresh offer
    /// round on each connected one. Peers renegotiate independently: the
    /// rounds run concurrently and one slow peer holds nobody else up.
    async fn renegotiate_all(&self) {
        let stream = self.media.lock().await.stream().clone();
        let links: Vec<Arc<Mutex<PeerLink>>> =
            self.links.lock().await.values().cloned().collect();

        join_all(links.into_iter().map(|link| {
            let stream = stream.clone();
            async move {
                let mut link = link.lock().await;
                link.replace_local_tracks(&stream).await;
                if link.state() == LinkState::Connected {
                    link.send_offer().await;
                }
            }
        }))
        .await;
    }

    /// Ends the call: every link goes straight to `Closed` and the server is
    /// told we left the room.
    pub async fn hang_up(&self) {
        let links: Vec<Arc<Mutex<PeerLink>>> =
            self.links.lock().await.drain().map(|(_, link)| link).collect();
        for link in links {
            link.lock().await.close();
        }
        self.participants.lock().await.clear();
        self.typing.lock().await.clear();
        let _ = self.outbound.send(ClientMessage::Leave);
    }

    /// Bounded-wait policy for negotiations that never complete: closes
    /// links whose current offer round has been unanswered for `max_wait`.
    /// Returns the remote ids that were reaped. Meant to be driven on an
    /// interval by the embedder.
    pub async fn close_stalled(&self, max_wait: Duration) -> Vec<String> {
        let links: Vec<(String, Arc<Mutex<PeerLink>>)> = self
            .links
            .lock()
            .await
            .iter()
            .map(|(id, link)| (id.clone(), link.clone()))
            .collect();

        let mut reaped = Vec::new();
        for (remote_id, link) in links {
            let mut link = link.lock().await;
            if link
                .offer_round_elapsed()
                .is_some_and(|elapsed| elapsed >= max_wait)
            {
                link.close();
                reaped.push(remote_id);
            }
        }

        if !reaped.is_empty() {
            let mut links = self.links.lock().await;
            for remote_id in &reaped {
                links.remove(remote_id);
                tracing::warn!(remote_id = %remote_id, "Stalled negotiation closed");
            }
        }
        reaped
    }

    // View accessors for the embedding UI.

    pub async fn link_state(&self, remote_id: &str) -> Option<LinkState> {
        match self.links.lock().await.get(remote_id) {
            Some(link) => Some(link.lock().await.state()),
            None => None,
        }
    }

    pub async fn link_role(&self, remote_id: &str) -> Option<Role> {
        match self.links.lock().await.get(remote_id) {
            Some(link) => Some(link.lock().await.role()),
            None => None,
        }
    }

    pub async fn link_count(&self) -> usize {
        self.links.lock().await.len()
    }

    pub async fn participants(&self) -> HashMap<String, String> {
        self.participants.lock().await.clone()
    }

    pub async fn transcript(&self) -> Vec<ChatEntry> {
        self.messages.lock().await.clone()
    }

    pub async fn typing_view(&self) -> HashMap<String, String> {
        self.typing.lock().await.clone()
    }

    pub async fn local_stream(&self) -> MediaStream {
        self.media.lock().await.stream().clone()
    }
}
