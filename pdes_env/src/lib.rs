//! PDES Communication Port Abstraction
//!
//! This crate provides the message-passing boundary the simulation executive
//! is written against. The executive never talks to a transport directly; it
//! only sees a [`CommPort`]:
//!
//! - Identity (`self_index()`, `peer_count()`)
//! - Non-blocking arrival check (`poll()`)
//! - Point-to-point tagged send (`send()`)
//!
//! # Delivery Contract
//!
//! Delivery between any two peers is reliable and FIFO. No ordering is
//! promised across different source/destination pairs.
//!
//! # Example
//!
//! ```ignore
//! use pdes_env::{ChannelMesh, CommPort, PeerId, Tag};
//!
//! let mut ports = ChannelMesh::build(2);
//! let mut b = ports.pop().unwrap();
//! let mut a = ports.pop().unwrap();
//!
//! a.send(PeerId(1), Tag(16), b"hello".to_vec())?;
//! let envelope = b.poll()?.expect("delivered");
//! assert_eq!(envelope.source, PeerId(0));
//! ```

mod error;
mod mesh;
mod port;
mod types;

pub use error::EnvError;
pub use mesh::{ChannelMesh, ChannelPort};
pub use port::CommPort;
pub use types::{Envelope, PeerId, Tag};
