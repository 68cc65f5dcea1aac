//! Inbound message dispatch.
//!
//! Kernel control tags are consumed here; everything else goes to the single
//! registered handler.

use pdes_env::{CommPort, Envelope};
use tracing::{debug, warn};

use crate::error::{KernelError, KernelResult};
use crate::executive::Executive;
use crate::wire;

/// Callback invoked once per application message.
///
/// Receives the executive so it can schedule events in response. Messages
/// that arrive while the handler runs (for instance during a GVT round it
/// started) are queued and delivered in order once it returns.
pub type MessageHandler<P> = Box<dyn FnMut(&mut Executive<P>, Envelope) -> KernelResult<()>>;

impl<P: CommPort> Executive<P> {
    /// Installs the message handler, replacing any previous one.
    pub fn register_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&mut Executive<P>, Envelope) -> KernelResult<()> + 'static,
    {
        self.handler = Some(Box::new(handler));
    }

    /// Returns `true` if a handler is installed.
    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    /// Number of application messages delivered to the handler so far.
    pub fn messages_handled(&self) -> u64 {
        self.messages_handled
    }

    /// Number of application messages consumed with no handler installed.
    pub fn unhandled_messages(&self) -> u64 {
        self.unhandled_messages
    }

    /// Dispatches every message that has already arrived.
    ///
    /// Returns once a poll comes back empty. The return value counts every
    /// message consumed, control traffic included.
    pub fn drain_pending(&mut self) -> KernelResult<usize> {
        if !self.in_handler {
            self.deliver_deferred()?;
        }
        let mut consumed = 0;
        while let Some(envelope) = self.port.poll()? {
            consumed += 1;
            self.dispatch(envelope)?;
        }
        Ok(consumed)
    }

    /// Routes one message to the kernel or to the domain handler.
    pub(crate) fn dispatch(&mut self, envelope: Envelope) -> KernelResult<()> {
        match envelope.tag {
            wire::TERMINATION => {
                self.on_termination(envelope.source);
                Ok(())
            }
            wire::SHUTDOWN => {
                self.on_shutdown(envelope.source);
                Ok(())
            }
            wire::START_GVT | wire::COMPUTE_GVT => self.on_gvt_control(envelope),
            wire::QUIESCENCE_QUERY => self.on_query(envelope.source, &envelope.payload),
            wire::QUIESCENCE_REPORT => self.on_report(envelope.source, &envelope.payload),
            tag if wire::is_control_tag(tag) => {
                warn!(peer = %self.peer(), source = %envelope.source, %tag, "Ignoring unknown control message");
                Ok(())
            }
            _ => {
                self.termination.app_received += 1;
                self.deliver(envelope)
            }
        }
    }

    fn deliver(&mut self, envelope: Envelope) -> KernelResult<()> {
        if self.in_handler {
            debug!(peer = %self.peer(), source = %envelope.source, "Deferring message until the handler returns");
            self.deferred.push_back(envelope);
            return Ok(());
        }

        let Some(mut handler) = self.handler.take() else {
            self.unhandled_messages += 1;
            warn!(
                peer = %self.peer(),
                source = %envelope.source,
                tag = %envelope.tag,
                "Message dropped: no handler registered"
            );
            if self.config.strict_handlers {
                return Err(KernelError::NoHandlerRegistered {
                    sender: envelope.source,
                    tag: envelope.tag,
                });
            }
            return Ok(());
        };

        debug!(peer = %self.peer(), source = %envelope.source, tag = %envelope.tag, "Dispatching message");
        self.in_handler = true;
        let result = handler(self, envelope);
        self.in_handler = false;
        // Keep a replacement installed by the handler itself
        if self.handler.is_none() {
            self.handler = Some(handler);
        }
        self.messages_handled += 1;
        result?;
        self.deliver_deferred()
    }

    fn deliver_deferred(&mut self) -> KernelResult<()> {
        while let Some(envelope) = self.deferred.pop_front() {
            self.deliver(envelope)?;
        }
        Ok(())
    }
}
