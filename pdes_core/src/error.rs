//! Error types for the executive kernel.

use pdes_env::{EnvError, PeerId, Tag};
use thiserror::Error;

/// Errors surfaced by the executive.
///
/// Causality violations are deliberately absent: they are counted by the
/// loop, never raised.
#[derive(Debug, Error)]
pub enum KernelError {
    /// Dequeue attempted on an empty event queue
    #[error("Event queue is empty")]
    EmptyQueue,

    /// A message arrived while no handler was installed
    #[error("No message handler registered (message {tag} from {sender})")]
    NoHandlerRegistered { sender: PeerId, tag: Tag },

    /// Attempted to schedule at a NaN time
    #[error("Invalid simulation time: {0}")]
    InvalidTime(f64),

    /// A barrier gave up waiting for acknowledgments
    #[error("Peers unresponsive: {received}/{expected} acknowledgments after {waited_ms}ms")]
    PeerUnresponsive {
        expected: usize,
        received: usize,
        waited_ms: u64,
    },

    /// Application message sent with a tag reserved for kernel traffic
    #[error("Tag {0} is reserved for kernel control messages")]
    ReservedTag(Tag),

    /// A control payload had the wrong size
    #[error("Malformed control payload: expected {expected} bytes, got {actual}")]
    MalformedPayload { expected: usize, actual: usize },

    /// Communication port failure
    #[error("Port error: {0}")]
    Port(#[from] EnvError),

    /// Failure raised by domain code inside an event action or handler
    #[error("Action failed: {0}")]
    Action(String),
}

impl KernelError {
    /// Creates an action error.
    pub fn action(msg: impl Into<String>) -> Self {
        Self::Action(msg.into())
    }
}

/// Convenience alias for `Result<T, KernelError>`.
pub type KernelResult<T> = Result<T, KernelError>;
