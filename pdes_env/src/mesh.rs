//! In-process implementation of `CommPort` backed by Tokio channels.

use crate::error::EnvError;
use crate::port::CommPort;
use crate::types::{Envelope, PeerId, Tag};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

/// Builder for a fully connected set of in-process ports.
///
/// Each peer owns one unbounded inbox; every port holds a sender to every
/// inbox (its own included). A single sender per source keeps delivery FIFO
/// per source/destination pair.
pub struct ChannelMesh;

impl ChannelMesh {
    /// Creates `peer_count` connected ports, indexed `0..peer_count`.
    pub fn build(peer_count: usize) -> Vec<ChannelPort> {
        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..peer_count).map(|_| mpsc::unbounded_channel::<Envelope>()).unzip();

        receivers
            .into_iter()
            .enumerate()
            .map(|(i, inbox)| ChannelPort {
                index: PeerId(i),
                outboxes: senders.clone(),
                inbox,
                messages_sent: 0,
                messages_received: 0,
            })
            .collect()
    }
}

/// One peer's endpoint in a [`ChannelMesh`].
///
/// `Send`, so it can be moved onto the thread that runs the peer.
pub struct ChannelPort {
    index: PeerId,
    outboxes: Vec<UnboundedSender<Envelope>>,
    inbox: UnboundedReceiver<Envelope>,
    messages_sent: u64,
    messages_received: u64,
}

impl ChannelPort {
    /// Number of messages this port has sent.
    pub fn messages_sent(&self) -> u64 {
        self.messages_sent
    }

    /// Number of messages this port has received.
    pub fn messages_received(&self) -> u64 {
        self.messages_received
    }
}

impl CommPort for ChannelPort {
    fn peer_count(&self) -> usize {
        self.outboxes.len()
    }

    fn self_index(&self) -> PeerId {
        self.index
    }

    fn poll(&mut self) -> Result<Option<Envelope>, EnvError> {
        match self.inbox.try_recv() {
            Ok(envelope) => {
                self.messages_received += 1;
                Ok(Some(envelope))
            }
            Err(TryRecvError::Empty) => Ok(None),
            // Unreachable while we hold a sender to our own inbox
            Err(TryRecvError::Disconnected) => Err(EnvError::Disconnected(self.index)),
        }
    }

    fn send(&mut self, dest: PeerId, tag: Tag, payload: Vec<u8>) -> Result<(), EnvError> {
        let outbox = self.outboxes.get(dest.index()).ok_or(EnvError::UnknownPeer {
            peer: dest,
            peer_count: self.outboxes.len(),
        })?;

        outbox
            .send(Envelope::new(self.index, tag, payload))
            .map_err(|_| EnvError::Disconnected(dest))?;
        self.messages_sent += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_indices() {
        let ports = ChannelMesh::build(3);
        assert_eq!(ports.len(), 3);
        for (i, port) in ports.iter().enumerate() {
            assert_eq!(port.self_index(), PeerId(i));
            assert_eq!(port.peer_count(), 3);
        }
    }

    #[test]
    fn test_send_and_poll() {
        let mut ports = ChannelMesh::build(2);
        let mut b = ports.pop().unwrap();
        let mut a = ports.pop().unwrap();

        assert_eq!(b.poll().unwrap(), None);

        a.send(PeerId(1), Tag(16), vec![9]).unwrap();
        let env = b.poll().unwrap().unwrap();
        assert_eq!(env.source, PeerId(0));
        assert_eq!(env.tag, Tag(16));
        assert_eq!(env.payload, vec![9]);

        assert_eq!(a.messages_sent(), 1);
        assert_eq!(b.messages_received(), 1);
        assert_eq!(b.poll().unwrap(), None);
    }

    #[test]
    fn test_fifo_per_pair() {
        let mut ports = ChannelMesh::build(2);
        let mut b = ports.pop().unwrap();
        let mut a = ports.pop().unwrap();

        for i in 0..10u8 {
            a.send(PeerId(1), Tag(16), vec![i]).unwrap();
        }
        for i in 0..10u8 {
            assert_eq!(b.poll().unwrap().unwrap().payload, vec![i]);
        }
    }

    #[test]
    fn test_unknown_peer() {
        let mut ports = ChannelMesh::build(2);
        let err = ports[0].send(PeerId(5), Tag(0), vec![]).unwrap_err();
        assert_eq!(err, EnvError::UnknownPeer { peer: PeerId(5), peer_count: 2 });
    }

    #[test]
    fn test_disconnected_peer() {
        let mut ports = ChannelMesh::build(2);
        drop(ports.pop());
        let err = ports[0].send(PeerId(1), Tag(0), vec![]).unwrap_err();
        assert_eq!(err, EnvError::Disconnected(PeerId(1)));
    }

    #[test]
    fn test_broadcast_skips_self() {
        let mut ports = ChannelMesh::build(3);
        let sent = ports[0].broadcast(Tag(1), &[]).unwrap();
        assert_eq!(sent, 2);

        assert!(ports[0].poll().unwrap().is_none());
        assert_eq!(ports[1].poll().unwrap().unwrap().source, PeerId(0));
        assert_eq!(ports[2].poll().unwrap().unwrap().source, PeerId(0));
    }

    #[test]
    fn test_port_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<ChannelPort>();
    }
}
