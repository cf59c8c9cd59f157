use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{ViewerConfig, DEFAULT_ICE_SERVERS};
use crate::error::FailureReason;
use crate::peer::{
    IceCandidate, OfferOptions, PeerConnectionState, PeerConnector, PeerEvent, PeerSession,
    RemoteStreamDescriptor,
};
use crate::resolver::ChannelResolver;
use crate::session::{Session, SessionState};
use crate::signaling::{SignalingChannel, SignalingConnector, SignalingEvent, SignalingMessage};

/// Everything the orchestrator reacts to, serialized into one queue. The
/// producers (signaling receive loop, peer callback dispatch) each preserve
/// their own order; interleaving across them is handled by the buffering
/// rules below.
enum Input {
    Signaling(SignalingEvent),
    Peer(PeerEvent),
    Stop,
}

/// Observable outputs of a session; the only surface a host UI or test
/// harness needs to subscribe to.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChanged(SessionState),
    Error {
        reason: FailureReason,
        detail: String,
    },
    RemoteStream(RemoteStreamDescriptor),
}

/// Handle to a running session.
pub struct SessionHandle {
    input_tx: mpsc::UnboundedSender<Input>,
    task: JoinHandle<Session>,
}

impl SessionHandle {
    /// Request a clean shutdown. Valid from any state, idempotent, and safe
    /// to call concurrently with in-flight operations; completions arriving
    /// after the terminal state are discarded.
    pub fn stop(&self) {
        let _ = self.input_tx.send(Input::Stop);
    }

    /// Wait for the session to reach a terminal state and take its record.
    pub async fn join(self) -> Session {
        self.task.await.expect("session task panicked")
    }
}

/// Start one viewer session. Returns immediately; progress is reported on
/// the returned event stream and the session ends in `Connected`-then-
/// `Closed` or in `Failed`.
pub fn start(
    config: ViewerConfig,
    resolver: Arc<dyn ChannelResolver>,
    signaling: Arc<dyn SignalingConnector>,
    peers: Arc<dyn PeerConnector>,
) -> (SessionHandle, mpsc::UnboundedReceiver<SessionEvent>) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (input_tx, input_rx) = mpsc::unbounded_channel();

    let orchestrator = Orchestrator {
        config,
        resolver,
        signaling,
        peers,
        session: Session::new(),
        events: event_tx,
        channel: None,
        peer: None,
        channel_open: false,
    };
    let task = tokio::spawn(orchestrator.run(input_tx.clone(), input_rx));

    (SessionHandle { input_tx, task }, event_rx)
}

struct Orchestrator {
    config: ViewerConfig,
    resolver: Arc<dyn ChannelResolver>,
    signaling: Arc<dyn SignalingConnector>,
    peers: Arc<dyn PeerConnector>,
    session: Session,
    events: mpsc::UnboundedSender<SessionEvent>,
    channel: Option<Box<dyn SignalingChannel>>,
    peer: Option<Box<dyn PeerSession>>,
    channel_open: bool,
}

impl Orchestrator {
    async fn run(
        mut self,
        input_tx: mpsc::UnboundedSender<Input>,
        mut input_rx: mpsc::UnboundedReceiver<Input>,
    ) -> Session {
        info!(session = %self.session.id, channel = %self.config.channel_name, "starting viewer session");
        self.transition(SessionState::Resolving);

        let resolved = match self
            .resolver
            .resolve(&self.config.channel_name, &self.config.region)
            .await
        {
            Ok(resolved) => resolved,
            Err(e) => {
                self.fail(FailureReason::ResolveFailed, e.to_string()).await;
                return self.session;
            }
        };

        self.session.endpoints = Some(resolved.endpoints.clone());
        let mut ice_servers = DEFAULT_ICE_SERVERS.clone();
        for server in resolved.ice_servers {
            if server.is_usable() {
                ice_servers.push(server);
            } else {
                warn!(session = %self.session.id, ?server, "skipping unusable ICE server");
            }
        }
        self.session.ice_servers = ice_servers.clone();

        let (peer, peer_events) = match self.peers.create(&ice_servers).await {
            Ok(created) => created,
            Err(e) => {
                self.fail(FailureReason::NegotiationError, e.to_string())
                    .await;
                return self.session;
            }
        };
        self.peer = Some(peer);

        let (channel, signaling_events) = match self.signaling.connect(&resolved.endpoints).await {
            Ok(connected) => connected,
            Err(e) => {
                self.fail(FailureReason::SignalingLost, e.to_string()).await;
                return self.session;
            }
        };
        self.channel = Some(channel);
        self.transition(SessionState::ConnectingSignaling);

        forward(signaling_events, input_tx.clone(), Input::Signaling);
        forward(peer_events, input_tx, Input::Peer);

        while let Some(input) = input_rx.recv().await {
            self.handle(input).await;
            if self.session.state.is_terminal() {
                break;
            }
        }
        self.session
    }

    async fn handle(&mut self, input: Input) {
        match input {
            Input::Stop => {
                debug!(session = %self.session.id, "stop requested");
                self.release().await;
                self.transition(SessionState::Closed);
            }
            Input::Signaling(event) => self.handle_signaling(event).await,
            Input::Peer(event) => self.handle_peer(event).await,
        }
    }

    async fn handle_signaling(&mut self, event: SignalingEvent) {
        match event {
            SignalingEvent::Open => {
                if self.session.state != SessionState::ConnectingSignaling {
                    debug!(session = %self.session.id, "duplicate OPEN ignored");
                    return;
                }
                self.channel_open = true;
                self.transition(SessionState::Negotiating);
                if let Err((reason, detail)) = self.send_offer().await {
                    self.fail(reason, detail).await;
                    return;
                }
                // Candidates the peer gathered while the socket was still
                // connecting go out now, in generation order.
                for candidate in self.session.drain_local_candidates() {
                    self.send_candidate(candidate).await;
                }
            }
            SignalingEvent::SdpAnswer(sdp) => {
                if self.session.remote_description_set() {
                    // Protocol violation by the master; applying it again
                    // would disturb an established session.
                    warn!(session = %self.session.id, "second SDP answer ignored");
                    return;
                }
                let Some(peer) = self.peer.as_ref() else {
                    warn!(session = %self.session.id, "answer received without a peer session");
                    return;
                };
                match peer.set_remote_description(sdp.clone()).await {
                    Ok(()) => {
                        info!(session = %self.session.id, "remote description applied");
                        self.session.set_remote_description(sdp);
                        for candidate in self.session.drain_remote_candidates() {
                            self.apply_remote_candidate(candidate).await;
                        }
                    }
                    Err(e) => {
                        self.fail(FailureReason::NegotiationError, e.to_string())
                            .await;
                    }
                }
            }
            SignalingEvent::IceCandidate(candidate) => {
                if self.session.remote_description_set() {
                    self.apply_remote_candidate(candidate).await;
                } else {
                    debug!(session = %self.session.id, "buffering remote candidate until answer");
                    self.session.queue_remote_candidate(candidate);
                }
            }
            SignalingEvent::Error(cause) => {
                self.fail(FailureReason::SignalingLost, cause).await;
            }
            SignalingEvent::Closed { reason } => {
                if self.session.state == SessionState::Connected {
                    info!(session = %self.session.id, reason = %reason, "signaling closed after connect");
                    self.release().await;
                    self.transition(SessionState::Closed);
                } else {
                    self.fail(FailureReason::SignalingLost, reason).await;
                }
            }
        }
    }

    async fn handle_peer(&mut self, event: PeerEvent) {
        match event {
            PeerEvent::LocalCandidate(candidate) => {
                if self.channel_open {
                    self.send_candidate(candidate).await;
                } else {
                    self.session.queue_local_candidate(candidate);
                }
            }
            PeerEvent::ConnectionStateChanged(PeerConnectionState::Connected) => {
                if self.session.state == SessionState::Negotiating {
                    info!(session = %self.session.id, "media connection established");
                    self.transition(SessionState::Connected);
                }
            }
            PeerEvent::ConnectionStateChanged(PeerConnectionState::Failed) => {
                self.fail(
                    FailureReason::MediaNegotiationFailed,
                    "peer connection reported failure".into(),
                )
                .await;
            }
            PeerEvent::ConnectionStateChanged(PeerConnectionState::Disconnected) => {
                // Non-fatal; escalation is an external supervisory concern.
                warn!(session = %self.session.id, "peer connection disconnected");
            }
            PeerEvent::ConnectionStateChanged(state) => {
                debug!(session = %self.session.id, ?state, "peer connection state");
            }
            PeerEvent::RemoteStream(descriptor) => {
                self.emit(SessionEvent::RemoteStream(descriptor));
            }
        }
    }

    /// Offer path on channel open: create, apply locally, transmit. Runs at
    /// most once per session because `Negotiating` is entered at most once.
    async fn send_offer(&mut self) -> Result<(), (FailureReason, String)> {
        let options = OfferOptions {
            receive_audio: self.config.receive_audio,
            receive_video: self.config.receive_video,
        };
        let Some(peer) = self.peer.as_ref() else {
            warn!(session = %self.session.id, "offer requested without a peer session");
            return Ok(());
        };
        let sdp = peer
            .create_offer(options)
            .await
            .map_err(|e| (FailureReason::NegotiationError, e.to_string()))?;
        peer.set_local_description(sdp.clone())
            .await
            .map_err(|e| (FailureReason::NegotiationError, e.to_string()))?;
        self.session.set_local_description(sdp.clone());

        let Some(channel) = self.channel.as_ref() else {
            warn!(session = %self.session.id, "offer ready without a signaling channel");
            return Ok(());
        };
        channel
            .send(SignalingMessage::Offer {
                sdp,
                sender: Some(self.session.id.clone()),
            })
            .await
            .map_err(|e| (FailureReason::SignalingLost, e.to_string()))?;
        info!(session = %self.session.id, "SDP offer sent");
        Ok(())
    }

    /// Transmit a local candidate. A send failure drops the candidate rather
    /// than the session; trickle ICE tolerates gaps.
    async fn send_candidate(&mut self, candidate: IceCandidate) {
        let Some(channel) = self.channel.as_ref() else {
            warn!(session = %self.session.id, "dropping local candidate, channel released");
            return;
        };
        let message = SignalingMessage::IceCandidate {
            candidate,
            sender: Some(self.session.id.clone()),
        };
        if let Err(e) = channel.send(message).await {
            warn!(session = %self.session.id, error = %e, "dropping local candidate");
        }
    }

    /// Apply a remote candidate. Malformed candidates are logged and dropped,
    /// never fatal.
    async fn apply_remote_candidate(&mut self, candidate: IceCandidate) {
        let Some(peer) = self.peer.as_ref() else {
            warn!(session = %self.session.id, "dropping remote candidate, peer released");
            return;
        };
        if let Err(e) = peer.add_remote_candidate(candidate).await {
            warn!(session = %self.session.id, error = %e, "dropping invalid remote candidate");
        }
    }

    async fn fail(&mut self, reason: FailureReason, detail: String) {
        error!(session = %self.session.id, reason = %reason, detail = %detail, "session failed");
        self.release().await;
        if self.transition(SessionState::Failed(reason)) {
            self.emit(SessionEvent::Error { reason, detail });
        }
    }

    async fn release(&mut self) {
        self.channel_open = false;
        if let Some(channel) = self.channel.take() {
            channel.close().await;
        }
        if let Some(peer) = self.peer.take() {
            peer.close().await;
        }
    }

    fn transition(&mut self, next: SessionState) -> bool {
        if self.session.transition(next) {
            self.emit(SessionEvent::StateChanged(next));
            true
        } else {
            false
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

fn forward<T, F>(mut rx: mpsc::UnboundedReceiver<T>, tx: mpsc::UnboundedSender<Input>, wrap: F)
where
    T: Send + 'static,
    F: Fn(T) -> Input + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if tx.send(wrap(event)).is_err() {
                break;
            }
        }
    });
}
