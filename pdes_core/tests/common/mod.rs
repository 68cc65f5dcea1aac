//! Shared test doubles.

use pdes_env::{CommPort, EnvError, Envelope, PeerId, Tag};
use std::collections::VecDeque;

/// A port with a pre-loaded inbox that records everything sent through it.
pub struct ScriptedPort {
    me: PeerId,
    peer_count: usize,
    pub inbox: VecDeque<Envelope>,
    pub sent: Vec<(PeerId, Tag, Vec<u8>)>,
}

impl ScriptedPort {
    pub fn new(me: usize, peer_count: usize) -> Self {
        Self {
            me: PeerId(me),
            peer_count,
            inbox: VecDeque::new(),
            sent: Vec::new(),
        }
    }

    /// Queues a message as if `source` had sent it.
    pub fn push(&mut self, source: usize, tag: Tag, payload: Vec<u8>) {
        self.inbox.push_back(Envelope::new(PeerId(source), tag, payload));
    }

    /// Messages sent with `tag`, in send order.
    pub fn sent_with(&self, tag: Tag) -> Vec<&(PeerId, Tag, Vec<u8>)> {
        self.sent.iter().filter(|(_, t, _)| *t == tag).collect()
    }
}

impl CommPort for ScriptedPort {
    fn peer_count(&self) -> usize {
        self.peer_count
    }

    fn self_index(&self) -> PeerId {
        self.me
    }

    fn poll(&mut self) -> Result<Option<Envelope>, EnvError> {
        Ok(self.inbox.pop_front())
    }

    fn send(&mut self, dest: PeerId, tag: Tag, payload: Vec<u8>) -> Result<(), EnvError> {
        if dest.index() >= self.peer_count {
            return Err(EnvError::UnknownPeer { peer: dest, peer_count: self.peer_count });
        }
        self.sent.push((dest, tag, payload));
        Ok(())
    }
}
