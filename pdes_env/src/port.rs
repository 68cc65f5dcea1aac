//! Communication port abstraction for PDES peers.

use crate::error::EnvError;
use crate::types::{Envelope, PeerId, Tag};

/// Message-passing boundary between one peer and the rest of the mesh.
///
/// # Implementations
///
/// - **In-process**: [`ChannelPort`](crate::ChannelPort) - one unbounded channel per peer
/// - **Tests**: scripted ports that replay a fixed inbox and record sends
///
/// # Message Flow
///
/// ```text
/// Peer A                     Port                      Peer B
///   |                          |                          |
///   |-- send(B, tag, bytes) -->|                          |
///   |                          |------------------------->|
///   |                          |                          |-- poll() -> Some(envelope)
/// ```
///
/// Both `poll` and `send` take `&mut self`: a port is owned exclusively by the
/// single control thread of its peer.
pub trait CommPort {
    /// Total number of peers in the mesh (static for the process lifetime).
    fn peer_count(&self) -> usize;

    /// This peer's index.
    fn self_index(&self) -> PeerId;

    /// Returns the next arrived message, if any, without blocking.
    fn poll(&mut self) -> Result<Option<Envelope>, EnvError>;

    /// Sends a tagged payload to `dest`.
    ///
    /// # Returns
    /// * `Ok(())` - Message handed to the transport
    /// * `Err(EnvError::UnknownPeer)` - `dest` is not a valid index
    /// * `Err(EnvError::Disconnected)` - `dest` no longer receives
    fn send(&mut self, dest: PeerId, tag: Tag, payload: Vec<u8>) -> Result<(), EnvError>;

    /// Sends the same tagged payload to every peer except self.
    ///
    /// Returns the number of peers the message was sent to.
    fn broadcast(&mut self, tag: Tag, payload: &[u8]) -> Result<usize, EnvError> {
        let me = self.self_index();
        let mut sent = 0;
        for i in 0..self.peer_count() {
            let dest = PeerId(i);
            if dest != me {
                self.send(dest, tag, payload.to_vec())?;
                sent += 1;
            }
        }
        Ok(sent)
    }
}
