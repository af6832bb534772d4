//! Per-remote-peer negotiation state machine

use crate::peer::engine::PeerConnection;
use crate::peer::media::MediaStream;
use crate::peer::queue::CandidateQueue;
use crate::protocol::{ClientMessage, IceCandidate, SdpKind, SessionDescription, SignalPayload};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Just created, no description on either side.
    New,
    /// Local offer sent, awaiting the answer.
    OfferSent,
    /// Remote offer received, local answer on its way out.
    AnswerSent,
    /// Both descriptions set, media flowing.
    Connected,
    /// A fresh offer round is in flight while the previous media keeps going.
    Renegotiating,
    /// Terminal.
    Closed,
}

/// Who opens the offer round for this pair: the side that was joining the
/// room when the link was created. Only one side of any pair is ever the
/// newly joined side, so offers cannot collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Responder,
}

/// Owns one peer connection and sequences every negotiation step against it.
/// Engine failures are logged and leave the state untouched: they are
/// usually benign races, not reasons to tear the link down.
pub struct PeerLink {
    remote_id: String,
    role: Role,
    conn: Arc<dyn PeerConnection>,
    outbound: UnboundedSender<ClientMessage>,
    state: LinkState,
    pending: CandidateQueue,
    remote_description_set: bool,
    offer_round_started: Option<Instant>,
}

impl PeerLink {
    pub fn new(
        remote_id: String,
        role: Role,
        conn: Arc<dyn PeerConnection>,
        outbound: UnboundedSender<ClientMessage>,
    ) -> Self {
        Self {
            remote_id,
            role,
            conn,
            outbound,
            state: LinkState::New,
            pending: CandidateQueue::new(),
            remote_description_set: false,
            offer_round_started: None,
        }
    }

    pub fn remote_id(&self) -> &str {
        &self.remote_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn queued_candidates(&self) -> usize {
        self.pending.len()
    }

    /// Opens an offer round: the initial one from `New`, or a renegotiation
    /// from `Connected` after a local media change.
    pub async fn send_offer(&mut self) {
        if self.state == LinkState::Closed {
            return;
        }

        let offer = match self.conn.create_offer().await {
            Ok(offer) => offer,
            Err(error) => {
                tracing::warn!(remote_id = %self.remote_id, %error, "Offer creation failed");
                return;
            }
        };
        if let Err(error) = self.conn.set_local_description(offer.clone()).await {
            tracing::warn!(remote_id = %self.remote_id, %error, "Local description rejected");
            return;
        }
        self.send_signal(SignalPayload::Description { description: offer });

        self.state = match self.state {
            LinkState::New => LinkState::OfferSent,
            LinkState::Connected => LinkState::Renegotiating,
            other => other,
        };
        self.offer_round_started = Some(Instant::now());

        tracing::debug!(remote_id = %self.remote_id, state = ?self.state, "Offer sent");
    }

    /// Applies a remote description, drains the candidate queue, and answers
    /// if the description was an offer.
    pub async fn apply_remote_description(&mut self, description: SessionDescription) {
        if self.state == LinkState::Closed {
            return;
        }

        if let Err(error) = self.conn.set_remote_description(description.clone()).await {
            tracing::warn!(remote_id = %self.remote_id, %error, "Remote description rejected");
            return;
        }
        self.remote_description_set = true;

        // Candidates that arrived early apply now, in arrival order. A bad
        // candidate is skipped, not fatal.
        for candidate in self.pending.drain() {
            if let Err(error) = self.conn.add_ice_candidate(candidate).await {
                tracing::warn!(remote_id = %self.remote_id, %error, "Queued candidate skipped");
            }
        }

        match description.kind {
            SdpKind::Offer => {
                if self.state == LinkState::New {
                    self.state = LinkState::AnswerSent;
                }
                let answer = match self.conn.create_answer().await {
                    Ok(answer) => answer,
                    Err(error) => {
                        tracing::warn!(remote_id = %self.remote_id, %error, "Answer creation failed");
                        return;
                    }
                };
                if let Err(error) = self.conn.set_local_description(answer.clone()).await {
                    tracing::warn!(remote_id = %self.remote_id, %error, "Local description rejected");
                    return;
                }
                self.send_signal(SignalPayload::Description {
                    description: answer,
                });
                // Both descriptions are set. A fresh offer on a live link is
                // the remote renegotiating; the link stays live throughout.
                self.state = LinkState::Connected;
                self.offer_round_started = None;
            }
            SdpKind::Answer => match self.state {
                LinkState::OfferSent | LinkState::Renegotiating => {
                    self.state = LinkState::Connected;
                    self.offer_round_started = None;
                }
                state => {
                    tracing::warn!(
                        remote_id = %self.remote_id,
                        ?state,
                        "Answer in unexpected state ignored"
                    );
                }
            },
        }
    }

    /// Applies a candidate, or queues it while no remote description is set.
    pub async fn apply_candidate(&mut self, candidate: IceCandidate) {
        if self.state == LinkState::Closed {
            return;
        }

        if !self.remote_description_set {
            self.pending.push(candidate);
            tracing::debug!(
                remote_id = %self.remote_id,
                queued = self.pending.len(),
                "Candidate queued before remote description"
            );
            return;
        }

        if let Err(error) = self.conn.add_ice_candidate(candidate).await {
            tracing::warn!(remote_id = %self.remote_id, %error, "Candidate skipped");
        }
    }

    /// Swaps the outgoing senders to a new local stream.
    pub async fn replace_local_tracks(&mut self, stream: &MediaStream) {
        if self.state == LinkState::Closed {
            return;
        }
        if let Err(error) = self.conn.replace_local_tracks(stream).await {
            tracing::warn!(remote_id = %self.remote_id, %error, "Track replacement failed");
        }
    }

    /// Terminal transition: releases the connection and discards any queued
    /// candidates. Every later operation on this link is a no-op.
    pub fn close(&mut self) {
        if self.state == LinkState::Closed {
            return;
        }
        self.state = LinkState::Closed;
        self.pending.clear();
        self.conn.close();
        tracing::debug!(remote_id = %self.remote_id, "Peer link closed");
    }

    /// How long the current offer round has been waiting, if one is in
    /// flight and unanswered.
    pub fn offer_round_elapsed(&self) -> Option<Duration> {
        match self.state {
            LinkState::OfferSent | LinkState::Renegotiating => {
                self.offer_round_started.map(|started| started.elapsed())
            }
            _ => None,
        }
    }

    fn send_signal(&self, payload: SignalPayload) {
        let _ = self.outbound.send(ClientMessage::Signal {
            target: self.remote_id.clone(),
            payload,
        });
    }
}
