use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::config::IceServerDescriptor;
use crate::error::PeerError;

pub mod connection;
pub mod types;

pub use connection::RtcPeerConnector;
pub use types::{
    IceCandidate, OfferOptions, PeerConnectionState, PeerEvent, RemoteStreamDescriptor,
};

/// The local media-negotiation capability for one session. Descriptions are
/// plain SDP text; the engine's own types stay behind this trait.
#[async_trait]
pub trait PeerSession: Send + Sync {
    async fn create_offer(&self, options: OfferOptions) -> Result<String, PeerError>;
    async fn set_local_description(&self, sdp: String) -> Result<(), PeerError>;
    async fn set_remote_description(&self, sdp: String) -> Result<(), PeerError>;
    async fn add_remote_candidate(&self, candidate: IceCandidate) -> Result<(), PeerError>;
    async fn close(&self);
}

/// Builds one peer session per viewer session, returning the session handle
/// together with its ordered event stream.
#[async_trait]
pub trait PeerConnector: Send + Sync {
    async fn create(
        &self,
        ice_servers: &[IceServerDescriptor],
    ) -> Result<(Box<dyn PeerSession>, mpsc::UnboundedReceiver<PeerEvent>), PeerError>;
}
