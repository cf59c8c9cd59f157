//! Viewer-side WebRTC signaling orchestrator.
//!
//! Negotiates a single peer-to-peer media session with a remote master
//! through a cloud-hosted signaling relay. The caller supplies a channel
//! resolver (control-plane lookup) and a signaling connector (relay socket);
//! the crate drives channel discovery, the offer/answer exchange, and ICE
//! candidate trickling through one forward-only state machine, and ships a
//! peer-connection implementation backed by the `webrtc` crate.
//!
//! ```no_run
//! use std::sync::Arc;
//! use rtc_viewer::{start, RtcPeerConnector, SessionEvent, ViewerConfig};
//! # async fn demo(resolver: Arc<dyn rtc_viewer::ChannelResolver>,
//! #               signaling: Arc<dyn rtc_viewer::signaling::SignalingConnector>) {
//! let config = ViewerConfig::new("eu-west-1", "demo-channel");
//! let (handle, mut events) = start(config, resolver, signaling, Arc::new(RtcPeerConnector::new()));
//! while let Some(event) = events.recv().await {
//!     if let SessionEvent::StateChanged(state) = event {
//!         println!("session state: {state:?}");
//!     }
//! }
//! handle.join().await;
//! # }
//! ```

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod peer;
pub mod resolver;
pub mod session;
pub mod signaling;

pub use config::{IceServerDescriptor, ViewerConfig, DEFAULT_ICE_SERVERS};
pub use error::{FailureReason, PeerError, ResolveError, SignalingError};
pub use orchestrator::{start, SessionEvent, SessionHandle};
pub use peer::{IceCandidate, OfferOptions, RemoteStreamDescriptor, RtcPeerConnector};
pub use resolver::{ChannelResolver, ResolvedChannel, SignalingEndpoints};
pub use session::{Role, Session, SessionState};
pub use signaling::{SignalingEvent, SignalingMessage};
