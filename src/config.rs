use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Caller-supplied configuration for one viewer session. No environment
/// variables or files are read here.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub region: String,
    pub channel_name: String,
    pub receive_audio: bool,
    pub receive_video: bool,
}

impl ViewerConfig {
    pub fn new(region: impl Into<String>, channel_name: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            channel_name: channel_name.into(),
            receive_audio: true,
            receive_video: true,
        }
    }
}

/// One ICE server as returned by the resolver. Immutable once fetched for a
/// session.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IceServerDescriptor {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl IceServerDescriptor {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }

    pub fn turn(
        url: impl Into<String>,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            urls: vec![url.into()],
            username: Some(username.into()),
            credential: Some(credential.into()),
        }
    }

    /// TURN servers are unusable without credentials; everything else is
    /// accepted as-is.
    pub fn is_usable(&self) -> bool {
        if self.urls.is_empty() || self.urls.iter().any(|u| u.is_empty()) {
            return false;
        }
        let is_turn = self
            .urls
            .iter()
            .any(|u| u.starts_with("turn:") || u.starts_with("turns:"));
        !is_turn || (self.username.is_some() && self.credential.is_some())
    }
}

/// Adds a `stun:`/`turn:` scheme to an ICE server URL when missing. Servers
/// carrying credentials are assumed to be TURN.
pub fn normalize_ice_url(url: &str, has_credentials: bool) -> String {
    if url.starts_with("stun:")
        || url.starts_with("stuns:")
        || url.starts_with("turn:")
        || url.starts_with("turns:")
    {
        url.to_string()
    } else if has_credentials {
        format!("turn:{url}")
    } else {
        format!("stun:{url}")
    }
}

/// Well-known default STUN entries prefixed to every resolved server list.
pub static DEFAULT_ICE_SERVERS: Lazy<Vec<IceServerDescriptor>> = Lazy::new(|| {
    vec![IceServerDescriptor {
        urls: vec![
            "stun:stun.l.google.com:19302".into(),
            "stun:stun1.l.google.com:19302".into(),
        ],
        username: None,
        credential: None,
    }]
});
