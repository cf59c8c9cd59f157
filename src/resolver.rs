use async_trait::async_trait;

use crate::config::IceServerDescriptor;
use crate::error::ResolveError;

/// Signaling endpoints for one channel. Both protocols must be present;
/// construction fails fast instead of letting a missing endpoint surface
/// later as an opaque connect error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalingEndpoints {
    pub wss: String,
    pub https: String,
}

impl SignalingEndpoints {
    pub fn new(wss: impl Into<String>, https: impl Into<String>) -> Result<Self, ResolveError> {
        let wss = wss.into();
        let https = https.into();
        if wss.is_empty() || https.is_empty() {
            return Err(ResolveError::Unavailable(
                "channel endpoint list is missing WSS or HTTPS".into(),
            ));
        }
        Ok(Self { wss, https })
    }
}

/// Result of channel discovery: where to open the signaling socket and which
/// ICE servers the relay issued for this session.
#[derive(Debug, Clone)]
pub struct ResolvedChannel {
    pub endpoints: SignalingEndpoints,
    pub ice_servers: Vec<IceServerDescriptor>,
}

/// The cloud control-plane lookup, consumed as an opaque service. Called once
/// at session start; retries are the caller's concern, not the core's.
#[async_trait]
pub trait ChannelResolver: Send + Sync {
    async fn resolve(
        &self,
        channel_name: &str,
        region: &str,
    ) -> Result<ResolvedChannel, ResolveError>;
}
