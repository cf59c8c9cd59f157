use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::SignalingError;
use crate::peer::IceCandidate;
use crate::resolver::SignalingEndpoints;

/// Messages carried over the relay for SDP and ICE exchange. The optional
/// `sender` id correlates peers when the relay multiplexes several of them;
/// a single-master topology works without it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalingMessage {
    /// SDP offer from the viewer.
    Offer {
        sdp: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender: Option<String>,
    },
    /// SDP answer from the master.
    Answer {
        sdp: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender: Option<String>,
    },
    /// Trickled ICE candidate, either direction.
    IceCandidate {
        #[serde(flatten)]
        candidate: IceCandidate,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender: Option<String>,
    },
}

impl SignalingMessage {
    /// Relay wire framing: one JSON object per message.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(payload: &str) -> serde_json::Result<Self> {
        serde_json::from_str(payload)
    }
}

/// Inbound events from the signaling channel, delivered in order on a single
/// subscription per session.
#[derive(Debug, Clone)]
pub enum SignalingEvent {
    Open,
    SdpAnswer(String),
    IceCandidate(IceCandidate),
    Error(String),
    Closed { reason: String },
}

/// A persistent duplex message channel to the relay. `send` fails with
/// `NotOpen` until the subscription has yielded `SignalingEvent::Open`.
#[async_trait]
pub trait SignalingChannel: Send + Sync {
    async fn send(&self, message: SignalingMessage) -> Result<(), SignalingError>;
    async fn close(&self);
}

/// Opens a signaling channel against resolved endpoints. Opening does not
/// block: the returned event stream yields `Open` or `Error` asynchronously.
#[async_trait]
pub trait SignalingConnector: Send + Sync {
    async fn connect(
        &self,
        endpoints: &SignalingEndpoints,
    ) -> Result<
        (
            Box<dyn SignalingChannel>,
            mpsc::UnboundedReceiver<SignalingEvent>,
        ),
        SignalingError,
    >;
}

/// In-memory signaling channel pair. One half plays the relay-connected
/// viewer socket, the other the master peer; used by tests and demos in
/// place of a real socket.
pub struct LocalSignalingChannel {
    tx: mpsc::UnboundedSender<SignalingMessage>,
    rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<SignalingMessage>>>,
    open: Arc<AtomicBool>,
}

impl LocalSignalingChannel {
    /// Create a pair of connected halves.
    pub fn create_pair() -> (Self, Self) {
        let (tx1, rx1) = mpsc::unbounded_channel();
        let (tx2, rx2) = mpsc::unbounded_channel();

        let a = Self {
            tx: tx2,
            rx: Arc::new(tokio::sync::Mutex::new(rx1)),
            open: Arc::new(AtomicBool::new(false)),
        };
        let b = Self {
            tx: tx1,
            rx: Arc::new(tokio::sync::Mutex::new(rx2)),
            open: Arc::new(AtomicBool::new(true)),
        };
        (a, b)
    }

    /// Receive the next message sent by the other half.
    pub async fn recv(&self) -> Option<SignalingMessage> {
        let mut rx = self.rx.lock().await;
        rx.recv().await
    }

    fn mark_open(&self) {
        self.open.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SignalingChannel for LocalSignalingChannel {
    async fn send(&self, message: SignalingMessage) -> Result<(), SignalingError> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(SignalingError::NotOpen);
        }
        self.tx
            .send(message)
            .map_err(|e| SignalingError::Transport(e.to_string()))
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

/// Connector over a pre-built in-memory half: reports `Open` immediately and
/// pumps inbound messages into signaling events.
pub struct LocalSignalingConnector {
    inner: std::sync::Mutex<Option<LocalSignalingChannel>>,
}

impl LocalSignalingConnector {
    pub fn new(channel: LocalSignalingChannel) -> Self {
        Self {
            inner: std::sync::Mutex::new(Some(channel)),
        }
    }
}

#[async_trait]
impl SignalingConnector for LocalSignalingConnector {
    async fn connect(
        &self,
        _endpoints: &SignalingEndpoints,
    ) -> Result<
        (
            Box<dyn SignalingChannel>,
            mpsc::UnboundedReceiver<SignalingEvent>,
        ),
        SignalingError,
    > {
        let channel = self
            .inner
            .lock()
            .expect("local connector lock poisoned")
            .take()
            .ok_or_else(|| SignalingError::Transport("channel already connected".into()))?;
        channel.mark_open();

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let _ = event_tx.send(SignalingEvent::Open);

        let inbound = channel.rx.clone();
        let pump_tx = event_tx.clone();
        tokio::spawn(async move {
            loop {
                let message = { inbound.lock().await.recv().await };
                let event = match message {
                    Some(SignalingMessage::Answer { sdp, .. }) => SignalingEvent::SdpAnswer(sdp),
                    Some(SignalingMessage::IceCandidate { candidate, .. }) => {
                        SignalingEvent::IceCandidate(candidate)
                    }
                    Some(SignalingMessage::Offer { .. }) => {
                        warn!("viewer channel received an offer, ignoring");
                        continue;
                    }
                    None => {
                        let _ = pump_tx.send(SignalingEvent::Closed {
                            reason: "remote half dropped".into(),
                        });
                        break;
                    }
                };
                if pump_tx.send(event).is_err() {
                    break;
                }
            }
        });

        Ok((Box::new(channel), event_rx))
    }
}
