use graphdock_protocol::ErrorPayload;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BridgeError>;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// The transport closed before a reply arrived. A request whose handler
    /// never replies is indistinguishable from this only at process exit;
    /// while the process lives such a request simply waits forever.
    #[error("transport closed before a reply arrived")]
    ChannelClosed,

    /// The remote handler failed; the original error payload is preserved.
    #[error("remote handler failed: {0}")]
    Remote(ErrorPayload),

    #[error("transport send failed: {0}")]
    Transport(String),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Returns the remote failure payload, if this is a remote error.
    pub fn remote_payload(&self) -> Option<&ErrorPayload> {
        match self {
            BridgeError::Remote(payload) => Some(payload),
            _ => None,
        }
    }
}
