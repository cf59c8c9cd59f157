use serde::{Deserialize, Serialize};

/// ICE candidate as carried over signaling.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IceCandidate {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_mline_index: Option<u16>,
}

/// What the viewer offers to receive.
#[derive(Debug, Clone, Copy)]
pub struct OfferOptions {
    pub receive_audio: bool,
    pub receive_video: bool,
}

impl Default for OfferOptions {
    fn default() -> Self {
        Self {
            receive_audio: true,
            receive_video: true,
        }
    }
}

/// Connection state of the peer engine, normalized away from the underlying
/// engine's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// A remote media track that started flowing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStreamDescriptor {
    pub stream_id: String,
    pub track_id: String,
    /// "audio" or "video".
    pub kind: String,
}

/// Events emitted by a peer session. Local candidates arrive zero or more
/// times; there is no explicit end-of-gathering event on this stream.
#[derive(Debug, Clone)]
pub enum PeerEvent {
    LocalCandidate(IceCandidate),
    ConnectionStateChanged(PeerConnectionState),
    RemoteStream(RemoteStreamDescriptor),
}
