use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::peer_connection::policy::rtcp_mux_policy::RTCRtcpMuxPolicy;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;

use crate::config::{normalize_ice_url, IceServerDescriptor};
use crate::error::PeerError;
use crate::peer::types::{
    IceCandidate, OfferOptions, PeerConnectionState, PeerEvent, RemoteStreamDescriptor,
};
use crate::peer::{PeerConnector, PeerSession};

/// Builds `RtcPeerSession`s over the webrtc-rs engine with default codecs and
/// interceptors registered.
pub struct RtcPeerConnector;

impl RtcPeerConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RtcPeerConnector {
    fn default() -> Self {
        Self::new()
    }
}

fn build_api() -> Result<API, PeerError> {
    let mut media_engine = MediaEngine::default();
    media_engine
        .register_default_codecs()
        .map_err(|e| PeerError::Negotiation(e.to_string()))?;

    let mut registry = Registry::new();
    registry = register_default_interceptors(registry, &mut media_engine)
        .map_err(|e| PeerError::Negotiation(e.to_string()))?;

    Ok(APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(registry)
        .build())
}

fn rtc_config(ice_servers: &[IceServerDescriptor]) -> RTCConfiguration {
    RTCConfiguration {
        ice_servers: ice_servers.iter().map(to_rtc_ice_server).collect(),
        ice_candidate_pool_size: 10,
        bundle_policy: RTCBundlePolicy::MaxBundle,
        rtcp_mux_policy: RTCRtcpMuxPolicy::Require,
        ..Default::default()
    }
}

fn to_rtc_ice_server(server: &IceServerDescriptor) -> RTCIceServer {
    let has_credentials = server.username.is_some() && server.credential.is_some();
    RTCIceServer {
        urls: server
            .urls
            .iter()
            .map(|u| normalize_ice_url(u, has_credentials))
            .collect(),
        username: server.username.clone().unwrap_or_default(),
        credential: server.credential.clone().unwrap_or_default(),
    }
}

fn map_state(state: RTCPeerConnectionState) -> PeerConnectionState {
    match state {
        RTCPeerConnectionState::Connecting => PeerConnectionState::Connecting,
        RTCPeerConnectionState::Connected => PeerConnectionState::Connected,
        RTCPeerConnectionState::Disconnected => PeerConnectionState::Disconnected,
        RTCPeerConnectionState::Failed => PeerConnectionState::Failed,
        RTCPeerConnectionState::Closed => PeerConnectionState::Closed,
        _ => PeerConnectionState::New,
    }
}

/// Counts candidate types once local gathering finishes. Sessions behind a
/// strict NAT need at least one relay candidate to stand a chance.
fn analyze_candidates(candidates: &[String]) {
    let host = candidates.iter().filter(|c| c.contains("typ host")).count();
    let srflx = candidates.iter().filter(|c| c.contains("typ srflx")).count();
    let relay = candidates.iter().filter(|c| c.contains("typ relay")).count();

    debug!(host, srflx, relay, "local candidate gathering complete");
    if relay == 0 {
        warn!("no TURN relay candidates gathered; connection through strict NAT may fail");
    }
}

/// Production peer session over an `RTCPeerConnection`.
pub struct RtcPeerSession {
    pc: Arc<RTCPeerConnection>,
}

#[async_trait]
impl PeerConnector for RtcPeerConnector {
    async fn create(
        &self,
        ice_servers: &[IceServerDescriptor],
    ) -> Result<(Box<dyn PeerSession>, mpsc::UnboundedReceiver<PeerEvent>), PeerError> {
        let api = build_api()?;
        let pc = Arc::new(
            api.new_peer_connection(rtc_config(ice_servers))
                .await
                .map_err(|e| PeerError::Negotiation(e.to_string()))?,
        );

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let gathered: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let candidate_tx = event_tx.clone();
        pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            match candidate {
                Some(c) => match c.to_json() {
                    Ok(init) => {
                        debug!(candidate = %init.candidate, "local ICE candidate gathered");
                        gathered
                            .lock()
                            .expect("candidate list lock poisoned")
                            .push(init.candidate.clone());
                        let _ = candidate_tx.send(PeerEvent::LocalCandidate(IceCandidate {
                            candidate: init.candidate,
                            sdp_mid: init.sdp_mid,
                            sdp_mline_index: init.sdp_mline_index,
                        }));
                    }
                    Err(e) => warn!(error = %e, "failed to serialize local candidate"),
                },
                // A null candidate marks the end of gathering.
                None => {
                    let list = gathered.lock().expect("candidate list lock poisoned");
                    analyze_candidates(&list);
                }
            }
            Box::pin(async {})
        }));

        let state_tx = event_tx.clone();
        pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            debug!(?state, "peer connection state changed");
            let _ = state_tx.send(PeerEvent::ConnectionStateChanged(map_state(state)));
            Box::pin(async {})
        }));

        let track_tx = event_tx.clone();
        pc.on_track(Box::new(move |track, _receiver, _transceiver| {
            let descriptor = RemoteStreamDescriptor {
                stream_id: track.stream_id(),
                track_id: track.id(),
                kind: track.kind().to_string(),
            };
            debug!(stream = %descriptor.stream_id, kind = %descriptor.kind, "remote track started");
            let _ = track_tx.send(PeerEvent::RemoteStream(descriptor));
            Box::pin(async {})
        }));

        Ok((Box::new(RtcPeerSession { pc }), event_rx))
    }
}

#[async_trait]
impl PeerSession for RtcPeerSession {
    async fn create_offer(&self, options: OfferOptions) -> Result<String, PeerError> {
        // Recvonly transceivers must exist before the offer so it carries
        // m-lines for the media the viewer wants to receive.
        if options.receive_audio {
            self.pc
                .add_transceiver_from_kind(RTPCodecType::Audio, Some(recvonly()))
                .await
                .map_err(|e| PeerError::Negotiation(e.to_string()))?;
        }
        if options.receive_video {
            self.pc
                .add_transceiver_from_kind(RTPCodecType::Video, Some(recvonly()))
                .await
                .map_err(|e| PeerError::Negotiation(e.to_string()))?;
        }

        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| PeerError::Negotiation(e.to_string()))?;
        Ok(offer.sdp)
    }

    async fn set_local_description(&self, sdp: String) -> Result<(), PeerError> {
        let desc =
            RTCSessionDescription::offer(sdp).map_err(|e| PeerError::InvalidSdp(e.to_string()))?;
        self.pc
            .set_local_description(desc)
            .await
            .map_err(|e| PeerError::InvalidState(e.to_string()))
    }

    async fn set_remote_description(&self, sdp: String) -> Result<(), PeerError> {
        let desc =
            RTCSessionDescription::answer(sdp).map_err(|e| PeerError::InvalidSdp(e.to_string()))?;
        self.pc
            .set_remote_description(desc)
            .await
            .map_err(|e| PeerError::InvalidSdp(e.to_string()))
    }

    async fn add_remote_candidate(&self, candidate: IceCandidate) -> Result<(), PeerError> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_mline_index,
            username_fragment: None,
        };
        self.pc
            .add_ice_candidate(init)
            .await
            .map_err(|e| PeerError::InvalidCandidate(e.to_string()))
    }

    async fn close(&self) {
        if let Err(e) = self.pc.close().await {
            warn!(error = %e, "peer connection close failed");
        }
    }
}

fn recvonly() -> RTCRtpTransceiverInit {
    RTCRtpTransceiverInit {
        direction: RTCRtpTransceiverDirection::Recvonly,
        send_encodings: vec![],
    }
}
