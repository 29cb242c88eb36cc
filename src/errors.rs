use crate::network::peer::PeerId;
use thiserror::Error;

/// Errors surfaced by the fallible container operations.
#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("duplicate peer id: {0}")]
    DuplicatePeer(PeerId),

    #[error("unknown peer id: {0}")]
    UnknownPeer(PeerId),

    #[error("peer {0} has no endpoint worth dialing")]
    NoEndpoint(PeerId),

    #[error("peer {0} has no active connection")]
    NotConnected(PeerId),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}
