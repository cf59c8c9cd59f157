use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Channel discovery errors. The resolver is called once per session; any of
/// these aborts the session before a socket is opened.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error("signaling channel not found")]
    NotFound,
    #[error("not authorized for signaling channel")]
    Unauthorized,
    #[error("signaling service unavailable: {0}")]
    Unavailable(String),
}

/// Errors from the signaling channel transport.
#[derive(Debug, Clone, Error)]
pub enum SignalingError {
    #[error("signaling channel is not open")]
    NotOpen,
    #[error("signaling transport error: {0}")]
    Transport(String),
}

/// Errors from the peer-connection capability.
#[derive(Debug, Clone, Error)]
pub enum PeerError {
    #[error("negotiation failed: {0}")]
    Negotiation(String),
    #[error("peer connection in invalid state: {0}")]
    InvalidState(String),
    #[error("invalid SDP: {0}")]
    InvalidSdp(String),
    #[error("invalid ICE candidate: {0}")]
    InvalidCandidate(String),
}

/// Reason attached to a session that ended in the failed state.
///
/// Malformed individual ICE candidates are deliberately absent: they are
/// logged and dropped, never fatal to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Channel discovery failed before any socket was opened.
    ResolveFailed,
    /// The signaling channel reported an error or closed before the session
    /// was established.
    SignalingLost,
    /// Offer creation or description application was rejected.
    NegotiationError,
    /// The peer connection itself reported failure.
    MediaNegotiationFailed,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureReason::ResolveFailed => "resolve_failed",
            FailureReason::SignalingLost => "signaling_lost",
            FailureReason::NegotiationError => "negotiation_error",
            FailureReason::MediaNegotiationFailed => "media_negotiation_failed",
        };
        f.write_str(s)
    }
}
