//! Client-core integration tests: the call session driving peer links
//! against a mock engine, fed with server events exactly as a transport
//! loop would feed them.

use async_trait::async_trait;
use callbuddy_signaling_rs::peer::{
    CallSession, EngineError, IceConfig, LinkState, MediaSource, MediaStream, MediaTrack,
    PeerConnection, PeerConnectionFactory, Role, TrackKind, TrackSource,
};
use callbuddy_signaling_rs::protocol::{
    ClientMessage, IceCandidate, RosterEntry, SdpKind, ServerMessage, SessionDescription,
    SignalPayload,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};

#[derive(Debug, Clone, PartialEq)]
enum Op {
    CreateOffer,
    CreateAnswer,
    SetLocal(SdpKind),
    SetRemote(SdpKind),
    AddCandidate(String),
    Close,
}

#[derive(Default)]
struct MockConnection {
    ops: Mutex<Vec<Op>>,
    streams: Mutex<Vec<MediaStream>>,
    offers: AtomicU32,
}

impl MockConnection {
    fn ops(&self) -> Vec<Op> {
        self.ops.lock().unwrap().clone()
    }

    fn candidates(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::AddCandidate(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    fn last_stream(&self) -> Option<MediaStream> {
        self.streams.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl PeerConnection for MockConnection {
    async fn create_offer(&self) -> Result<SessionDescription, EngineError> {
        let n = self.offers.fetch_add(1, Ordering::SeqCst);
        self.ops.lock().unwrap().push(Op::CreateOffer);
        Ok(SessionDescription::offer(format!("v=0 offer-{n}")))
    }

    async fn create_answer(&self) -> Result<SessionDescription, EngineError> {
        self.ops.lock().unwrap().push(Op::CreateAnswer);
        Ok(SessionDescription::answer("v=0 answer"))
    }

    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), EngineError> {
        self.ops.lock().unwrap().push(Op::SetLocal(description.kind));
        Ok(())
    }

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), EngineError> {
        self.ops.lock().unwrap().push(Op::SetRemote(description.kind));
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), EngineError> {
        self.ops
            .lock()
            .unwrap()
            .push(Op::AddCandidate(candidate.candidate));
        Ok(())
    }

    async fn replace_local_tracks(&self, stream: &MediaStream) -> Result<(), EngineError> {
        self.streams.lock().unwrap().push(stream.clone());
        Ok(())
    }

    fn close(&self) {
        self.ops.lock().unwrap().push(Op::Close);
    }
}

#[derive(Default)]
struct MockFactory {
    created: Mutex<Vec<Arc<MockConnection>>>,
}

impl MockFactory {
    fn connection(&self, index: usize) -> Arc<MockConnection> {
        self.created.lock().unwrap()[index].clone()
    }

    fn count(&self) -> usize {
        self.created.lock().unwrap().len()
    }
}

impl PeerConnectionFactory for MockFactory {
    fn create(&self, _ice: &IceConfig) -> Result<Arc<dyn PeerConnection>, EngineError> {
        let conn = Arc::new(MockConnection::default());
        self.created.lock().unwrap().push(conn.clone());
        Ok(conn)
    }
}

struct MockMedia;

#[async_trait]
impl MediaSource for MockMedia {
    async fn capture_user_media(
        &self,
        video: bool,
        audio: bool,
    ) -> Result<MediaStream, EngineError> {
        let mut tracks = Vec::new();
        if video {
            tracks.push(MediaTrack {
                kind: TrackKind::Video,
                source: TrackSource::Camera,
                enabled: true,
            });
        }
        if audio {
            tracks.push(MediaTrack {
                kind: TrackKind::Audio,
                source: TrackSource::Microphone,
                enabled: true,
            });
        }
        Ok(MediaStream { tracks })
    }

    async fn capture_display(&self) -> Result<MediaStream, EngineError> {
        Ok(MediaStream {
            tracks: vec![MediaTrack {
                kind: TrackKind::Video,
                source: TrackSource::Screen,
                enabled: true,
            }],
        })
    }
}

struct Harness {
    session: CallSession,
    outbound: UnboundedReceiver<ClientMessage>,
    factory: Arc<MockFactory>,
}

impl Harness {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let factory = Arc::new(MockFactory::default());
        let session = CallSession::new(
            "ABC123",
            "Alice",
            tx,
            factory.clone(),
            IceConfig::default(),
            Arc::new(MockMedia),
        );
        Self {
            session,
            outbound: rx,
            factory,
        }
    }

    /// Assigns the local id and swallows the resulting Join message.
    async fn connect_as(&mut self, id: &str) {
        self.session
            .handle_server_message(ServerMessage::Connected {
                participant_id: id.to_string(),
            })
            .await;
        match self.outbound.try_recv() {
            Ok(ClientMessage::Join { room_id, .. }) => assert_eq!(room_id, "ABC123"),
            other => panic!("expected Join after Connected, got {other:?}"),
        }
    }

    async fn roster(&self, joined: &str, ids: &[&str]) {
        self.session
            .handle_server_message(ServerMessage::RosterUpdate {
                joined_id: joined.to_string(),
                members: ids
                    .iter()
                    .map(|id| RosterEntry {
                        id: id.to_string(),
                        display_name: format!("name-{id}"),
                    })
                    .collect(),
            })
            .await;
    }

    async fn signal_from(&self, from: &str, payload: SignalPayload) {
        self.session
            .handle_server_message(ServerMessage::Signal {
                from: from.to_string(),
                payload,
            })
            .await;
    }

    fn drain_signals(&mut self) -> Vec<(String, SignalPayload)> {
        let mut out = Vec::new();
        while let Ok(msg) = self.outbound.try_recv() {
            if let ClientMessage::Signal { target, payload } = msg {
                out.push((target, payload));
            }
        }
        out
    }
}

fn offer_targets(signals: &[(String, SignalPayload)]) -> Vec<String> {
    signals
        .iter()
        .filter_map(|(target, payload)| match payload {
            SignalPayload::Description {
                description:
                    SessionDescription {
                        kind: SdpKind::Offer,
                        ..
                    },
            } => Some(target.clone()),
            _ => None,
        })
        .collect()
}

fn candidate(n: u32) -> IceCandidate {
    IceCandidate {
        candidate: format!("candidate:{n}"),
        sdp_mid: Some("0".to_string()),
        sdp_mline_index: Some(0),
    }
}

#[tokio::test]
async fn joiner_offers_to_every_existing_member() {
    let mut h = Harness::new();
    h.connect_as("me").await;
    h.roster("me", &["a", "b", "me"]).await;

    assert_eq!(h.session.link_count().await, 2);
    assert_eq!(h.session.link_role("a").await, Some(Role::Initiator));
    assert_eq!(h.session.link_state("a").await, Some(LinkState::OfferSent));
    assert_eq!(h.session.link_state("b").await, Some(LinkState::OfferSent));

    let mut targets = offer_targets(&h.drain_signals());
    targets.sort();
    assert_eq!(targets, ["a", "b"]);
}

#[tokio::test]
async fn existing_member_answers_the_joiner() {
    let mut h = Harness::new();
    h.connect_as("me").await;
    h.roster("me", &["me"]).await;
    assert!(h.drain_signals().is_empty());

    // B arrives: we hold a Responder link and stay quiet.
    h.roster("b", &["me", "b"]).await;
    assert_eq!(h.session.link_role("b").await, Some(Role::Responder));
    assert_eq!(h.session.link_state("b").await, Some(LinkState::New));
    assert!(h.drain_signals().is_empty());

    // B's offer lands: we answer automatically and come up.
    h.signal_from(
        "b",
        SignalPayload::Description {
            description: SessionDescription::offer("v=0 b-offer"),
        },
    )
    .await;
    assert_eq!(h.session.link_state("b").await, Some(LinkState::Connected));

    let signals = h.drain_signals();
    assert_eq!(signals.len(), 1);
    assert!(matches!(
        &signals[0],
        (target, SignalPayload::Description { description })
            if target == "b" && description.kind == SdpKind::Answer
    ));
}

#[tokio::test]
async fn early_candidates_wait_for_description_then_apply_in_order() {
    let mut h = Harness::new();
    h.connect_as("me").await;
    h.roster("me", &["me"]).await;
    h.roster("b", &["me", "b"]).await;
    h.drain_signals();

    h.signal_from("b", SignalPayload::Candidate { candidate: candidate(1) })
        .await;
    h.signal_from("b", SignalPayload::Candidate { candidate: candidate(2) })
        .await;
    h.signal_from("b", SignalPayload::Candidate { candidate: candidate(3) })
        .await;

    let conn = h.factory.connection(0);
    assert!(conn.candidates().is_empty());

    h.signal_from(
        "b",
        SignalPayload::Description {
            description: SessionDescription::offer("v=0 b-offer"),
        },
    )
    .await;

    assert_eq!(
        conn.candidates(),
        ["candidate:1", "candidate:2", "candidate:3"]
    );

    // Candidates after the description skip the queue.
    h.signal_from("b", SignalPayload::Candidate { candidate: candidate(4) })
        .await;
    assert_eq!(conn.candidates().len(), 4);
}

#[tokio::test]
async fn two_sessions_negotiate_to_connected() {
    let mut a = Harness::new();
    let mut b = Harness::new();
    a.connect_as("a").await;
    b.connect_as("b").await;

    // A was alone; B joins and offers.
    a.roster("a", &["a"]).await;
    a.roster("b", &["a", "b"]).await;
    b.roster("b", &["a", "b"]).await;

    // Pump signaling both ways until quiet.
    loop {
        let from_b = b.drain_signals();
        let from_a = a.drain_signals();
        if from_a.is_empty() && from_b.is_empty() {
            break;
        }
        for (target, payload) in from_b {
            assert_eq!(target, "a");
            a.signal_from("b", payload).await;
        }
        for (target, payload) in from_a {
            assert_eq!(target, "b");
            b.signal_from("a", payload).await;
        }
    }

    assert_eq!(a.session.link_state("b").await, Some(LinkState::Connected));
    assert_eq!(b.session.link_state("a").await, Some(LinkState::Connected));
    assert_eq!(a.session.link_role("b").await, Some(Role::Responder));
    assert_eq!(b.session.link_role("a").await, Some(Role::Initiator));
}

#[tokio::test]
async fn media_toggle_renegotiates_each_connected_link_once() {
    let mut h = Harness::new();
    h.connect_as("me").await;
    h.roster("me", &["a", "b", "me"]).await;
    h.drain_signals();

    // Both answers land; both links are up.
    for peer in ["a", "b"] {
        h.signal_from(
            peer,
            SignalPayload::Description {
                description: SessionDescription::answer("v=0 answer"),
            },
        )
        .await;
        assert_eq!(
            h.session.link_state(peer).await,
            Some(LinkState::Connected)
        );
    }

    h.session.set_video_enabled(true).await;

    // Exactly one fresh offer per peer, links renegotiating.
    let mut targets = offer_targets(&h.drain_signals());
    targets.sort();
    assert_eq!(targets, ["a", "b"]);
    assert_eq!(
        h.session.link_state("a").await,
        Some(LinkState::Renegotiating)
    );
    assert_eq!(
        h.session.link_state("b").await,
        Some(LinkState::Renegotiating)
    );

    // Peers answer independently; each returns to Connected on its own.
    h.signal_from(
        "a",
        SignalPayload::Description {
            description: SessionDescription::answer("v=1 answer"),
        },
    )
    .await;
    assert_eq!(h.session.link_state("a").await, Some(LinkState::Connected));
    assert_eq!(
        h.session.link_state("b").await,
        Some(LinkState::Renegotiating)
    );

    // The camera track reached both connections.
    for index in 0..2 {
        let stream = h.factory.connection(index).last_stream().unwrap();
        assert!(stream.has_source(TrackSource::Camera));
    }
}

#[tokio::test]
async fn all_media_disabled_pushes_placeholder_stream() {
    let mut h = Harness::new();
    h.connect_as("me").await;
    h.roster("me", &["a", "me"]).await;
    h.drain_signals();
    h.signal_from(
        "a",
        SignalPayload::Description {
            description: SessionDescription::answer("v=0 answer"),
        },
    )
    .await;

    h.session.set_video_enabled(true).await;
    h.drain_signals();
    h.signal_from(
        "a",
        SignalPayload::Description {
            description: SessionDescription::answer("v=1 answer"),
        },
    )
    .await;

    h.session.set_video_enabled(false).await;

    // Never zero senders: the link carries black frames and silence now.
    let stream = h.factory.connection(0).last_stream().unwrap();
    assert_eq!(stream, MediaStream::placeholder());
    assert_eq!(h.session.local_stream().await, MediaStream::placeholder());

    // And the swap still costs exactly one renegotiation offer.
    assert_eq!(offer_targets(&h.drain_signals()), ["a"]);
}

#[tokio::test]
async fn peer_left_closes_link_and_clears_views() {
    let mut h = Harness::new();
    h.connect_as("me").await;
    h.roster("me", &["a", "me"]).await;
    h.drain_signals();

    h.session
        .handle_server_message(ServerMessage::TypingUpdate {
            sender_id: "a".to_string(),
            is_typing: true,
            display_name: "name-a".to_string(),
        })
        .await;
    assert!(h.session.typing_view().await.contains_key("a"));

    h.session
        .handle_server_message(ServerMessage::PeerLeft {
            departed_id: "a".to_string(),
        })
        .await;

    assert_eq!(h.session.link_state("a").await, None);
    assert!(h.session.participants().await.is_empty());
    assert!(h.session.typing_view().await.is_empty());
    assert!(h.factory.connection(0).ops().contains(&Op::Close));

    // A signal from the departed peer is dropped, not applied.
    h.signal_from("a", SignalPayload::Candidate { candidate: candidate(1) })
        .await;
    assert!(h.factory.connection(0).candidates().is_empty());
}

#[tokio::test]
async fn chat_delivery_updates_transcript_and_typing_view() {
    let mut h = Harness::new();
    h.connect_as("me").await;

    h.session
        .handle_server_message(ServerMessage::TypingUpdate {
            sender_id: "a".to_string(),
            is_typing: true,
            display_name: "name-a".to_string(),
        })
        .await;
    h.session
        .handle_server_message(ServerMessage::ChatDelivered {
            text: "hi".to_string(),
            display_name: "name-a".to_string(),
            sender_id: "a".to_string(),
            timestamp: 42,
        })
        .await;

    let transcript = h.session.transcript().await;
    assert_eq!(transcript.len(), 1);
    assert_eq!(transcript[0].text, "hi");
    assert!(!transcript[0].own);
    // Delivery implies the sender stopped typing.
    assert!(h.session.typing_view().await.is_empty());

    h.session.send_chat("hello back").await;
    match h.outbound.try_recv() {
        Ok(ClientMessage::Chat { text, .. }) => assert_eq!(text, "hello back"),
        other => panic!("expected Chat, got {other:?}"),
    }
    match h.outbound.try_recv() {
        Ok(ClientMessage::Typing { is_typing, .. }) => assert!(!is_typing),
        other => panic!("expected typing stop, got {other:?}"),
    }
    let transcript = h.session.transcript().await;
    assert_eq!(transcript.len(), 2);
    assert!(transcript[1].own);
}

#[tokio::test]
async fn stalled_offer_round_is_reaped_after_bound() {
    let mut h = Harness::new();
    h.connect_as("me").await;
    h.roster("me", &["a", "me"]).await;
    h.drain_signals();
    assert_eq!(h.session.link_state("a").await, Some(LinkState::OfferSent));

    // Nothing is stalled yet under a generous bound.
    assert!(h
        .session
        .close_stalled(Duration::from_secs(3600))
        .await
        .is_empty());

    // Under a zero bound the unanswered round is reaped.
    let reaped = h.session.close_stalled(Duration::ZERO).await;
    assert_eq!(reaped, ["a"]);
    assert_eq!(h.session.link_state("a").await, None);
    assert!(h.factory.connection(0).ops().contains(&Op::Close));
}

#[tokio::test]
async fn typing_and_local_candidates_are_forwarded() {
    let mut h = Harness::new();
    h.connect_as("me").await;
    h.roster("me", &["a", "me"]).await;
    h.drain_signals();

    h.session.set_typing(true);
    match h.outbound.try_recv() {
        Ok(ClientMessage::Typing {
            room_id, is_typing, ..
        }) => {
            assert_eq!(room_id, "ABC123");
            assert!(is_typing);
        }
        other => panic!("expected Typing, got {other:?}"),
    }

    // The engine's gathered candidates go out addressed to their peer.
    h.session.send_local_candidate("a", candidate(9));
    let signals = h.drain_signals();
    assert!(matches!(
        &signals[..],
        [(target, SignalPayload::Candidate { candidate })]
            if target == "a" && candidate.candidate == "candidate:9"
    ));
}

#[tokio::test]
async fn hang_up_closes_everything_and_leaves() {
    let mut h = Harness::new();
    h.connect_as("me").await;
    h.roster("me", &["a", "b", "me"]).await;
    h.drain_signals();

    h.session.hang_up().await;

    assert_eq!(h.session.link_count().await, 0);
    assert!(h.session.participants().await.is_empty());
    for index in 0..2 {
        assert!(h.factory.connection(index).ops().contains(&Op::Close));
    }
    assert!(matches!(h.outbound.try_recv(), Ok(ClientMessage::Leave)));
}
