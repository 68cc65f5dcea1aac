//! Common types for the communication port abstraction.

use serde::{Deserialize, Serialize};

/// Index of a cooperating peer process, in `0..peer_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId(pub usize);

impl PeerId {
    /// Returns the raw index.
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Integer message kind carried alongside every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tag(pub i32);

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A message as seen by the receiving peer.
///
/// The sender's identity comes from the transport, not from the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Peer that sent the message
    pub source: PeerId,

    /// Message kind
    pub tag: Tag,

    /// Opaque payload bytes (may be empty)
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Creates a new envelope.
    pub fn new(source: PeerId, tag: Tag, payload: Vec<u8>) -> Self {
        Self { source, tag, payload }
    }

    /// Returns the payload size in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}
