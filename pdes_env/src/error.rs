//! Error types for the communication port layer.

use crate::types::PeerId;
use thiserror::Error;

/// Errors raised by a [`CommPort`](crate::CommPort) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvError {
    /// Destination index is outside `0..peer_count`
    #[error("Unknown peer {peer} (peer count is {peer_count})")]
    UnknownPeer { peer: PeerId, peer_count: usize },

    /// The destination's inbox is gone (peer shut down)
    #[error("Peer {0} disconnected")]
    Disconnected(PeerId),

    /// Transport-specific failure
    #[error("Network error: {0}")]
    Network(String),
}

impl EnvError {
    /// Creates a network error.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }
}
