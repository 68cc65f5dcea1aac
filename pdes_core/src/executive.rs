//! Simulation clock and event loop.
//!
//! The [`Executive`] owns simulated time, the event queue and the
//! communication port of one peer. Domain code holds it by `&mut` (actions
//! and message handlers receive it as an argument) instead of reaching for
//! process-wide state.
//!
//! # Loop
//!
//! ```text
//! while queue has an event (at or before the horizon):
//!     pop earliest event
//!     if event.time < now: count a causality violation (still executes)
//!     now = event.time
//!     execute action
//!     drain every message that has already arrived
//! coupled: wait for global quiescence, resuming the loop if a late
//!     message schedules work at or before the horizon
//! ```

use pdes_env::{CommPort, Envelope, PeerId, Tag};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::{debug, info};

use crate::config::{ExecutiveConfig, TerminationPolicy};
use crate::dispatch::MessageHandler;
use crate::error::{KernelError, KernelResult};
use crate::event::{ActionRef, EventAction, EventSeq};
use crate::gvt::GvtState;
use crate::queue::EventQueue;
use crate::termination::{Quiescence, TerminationState};
use crate::time::SimTime;
use crate::wire;

/// Summary returned by [`Executive::run`] and [`Executive::run_until`].
///
/// Counters are cumulative since the last [`Executive::initialize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Peer that produced the report
    pub peer: PeerId,

    /// Events dequeued and executed
    pub events_executed: u64,

    /// Events executed with a time earlier than the clock
    pub causality_violations: u64,

    /// Application messages delivered to the handler
    pub messages_handled: u64,

    /// Application messages consumed with no handler installed
    pub unhandled_messages: u64,

    /// Clock value when the run returned
    pub final_time: SimTime,

    /// Events still queued beyond the horizon
    pub pending_events: usize,
}

/// The executive of one simulation peer.
pub struct Executive<P: CommPort> {
    pub(crate) port: P,
    pub(crate) config: ExecutiveConfig,
    pub(crate) queue: EventQueue<ActionRef<P>>,
    pub(crate) now: SimTime,
    pub(crate) violations: u64,
    pub(crate) events_executed: u64,
    pub(crate) messages_handled: u64,
    pub(crate) unhandled_messages: u64,
    pub(crate) handler: Option<MessageHandler<P>>,
    pub(crate) in_handler: bool,
    pub(crate) deferred: VecDeque<Envelope>,
    pub(crate) gvt: GvtState,
    pub(crate) termination: TerminationState,
}

impl<P: CommPort> Executive<P> {
    /// Creates an initialized executive around `port`.
    pub fn new(port: P, config: ExecutiveConfig) -> Self {
        let peer_count = port.peer_count();
        let mut exec = Executive {
            port,
            config,
            queue: EventQueue::new(),
            now: SimTime::ZERO,
            violations: 0,
            events_executed: 0,
            messages_handled: 0,
            unhandled_messages: 0,
            handler: None,
            in_handler: false,
            deferred: VecDeque::new(),
            gvt: GvtState::new(peer_count),
            termination: TerminationState::new(peer_count),
        };
        exec.initialize();
        exec
    }

    /// Resets the clock to zero and clears every counter.
    ///
    /// Queued events and the registered handler are kept.
    pub fn initialize(&mut self) {
        let peer_count = self.port.peer_count();
        self.now = SimTime::ZERO;
        self.violations = 0;
        self.events_executed = 0;
        self.messages_handled = 0;
        self.unhandled_messages = 0;
        self.gvt = GvtState::new(peer_count);
        self.termination = TerminationState::new(peer_count);
        self.deferred.clear();
    }

    // ── Clock ────────────────────────────────────────────────────────

    /// Current simulated time.
    pub fn current_time(&self) -> SimTime {
        self.now
    }

    /// Number of events executed behind the clock so far.
    pub fn causality_violations(&self) -> u64 {
        self.violations
    }

    /// Number of events executed so far.
    pub fn events_executed(&self) -> u64 {
        self.events_executed
    }

    // ── Scheduling ───────────────────────────────────────────────────

    /// Schedules `action` at an absolute time.
    ///
    /// Times earlier than the clock are accepted; executing such an event
    /// counts a causality violation.
    pub fn schedule_at(
        &mut self,
        time: impl Into<SimTime>,
        action: ActionRef<P>,
    ) -> KernelResult<EventSeq> {
        let time = time.into();
        if !time.is_valid() {
            return Err(KernelError::InvalidTime(time.value()));
        }
        if time < self.now {
            debug!(peer = %self.peer(), %time, now = %self.now, "Scheduled behind the clock");
        }
        Ok(self.queue.insert(time, action))
    }

    /// Schedules `action` at `current_time() + delta`. `delta` may be negative.
    pub fn schedule_in(&mut self, delta: f64, action: ActionRef<P>) -> KernelResult<EventSeq> {
        self.schedule_at(self.now.offset(delta), action)
    }

    /// Schedules a closure at an absolute time.
    pub fn schedule_fn_at<F>(&mut self, time: impl Into<SimTime>, f: F) -> KernelResult<EventSeq>
    where
        F: Fn(&mut Executive<P>) -> KernelResult<()> + 'static,
    {
        let action: Rc<dyn EventAction<P>> = Rc::new(f);
        self.schedule_at(time, action)
    }

    /// Schedules a closure `delta` after the current time.
    pub fn schedule_fn_in<F>(&mut self, delta: f64, f: F) -> KernelResult<EventSeq>
    where
        F: Fn(&mut Executive<P>) -> KernelResult<()> + 'static,
    {
        let action: Rc<dyn EventAction<P>> = Rc::new(f);
        self.schedule_in(delta, action)
    }

    /// Returns `true` if an event is pending.
    pub fn has_event(&self) -> bool {
        self.queue.has_event()
    }

    /// Time of the earliest pending event.
    pub fn next_event_time(&self) -> Option<SimTime> {
        self.queue.peek_time()
    }

    /// Number of pending events.
    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    // ── Loop ─────────────────────────────────────────────────────────

    /// Runs until the event queue is empty.
    pub fn run(&mut self) -> KernelResult<RunReport> {
        self.run_loop(None)
    }

    /// Runs until the queue is empty or the earliest event lies beyond `end_time`.
    ///
    /// Events at exactly `end_time` execute. Later events stay queued and the
    /// clock never moves past `end_time`.
    pub fn run_until(&mut self, end_time: impl Into<SimTime>) -> KernelResult<RunReport> {
        let end_time = end_time.into();
        if !end_time.is_valid() {
            return Err(KernelError::InvalidTime(end_time.value()));
        }
        self.run_loop(Some(end_time))
    }

    /// Executes exactly one event.
    ///
    /// Fails with [`KernelError::EmptyQueue`] when nothing is pending. Does not
    /// drain messages.
    pub fn step(&mut self) -> KernelResult<SimTime> {
        let event = self.queue.pop_earliest()?;

        if event.time < self.now {
            self.violations += 1;
            debug!(
                peer = %self.peer(),
                event = %event.seq,
                time = %event.time,
                now = %self.now,
                "Causality violation"
            );
        }

        self.now = event.time;
        self.events_executed += 1;
        event.action.execute(self)?;
        Ok(event.time)
    }

    fn run_loop(&mut self, horizon: Option<SimTime>) -> KernelResult<RunReport> {
        let coupled = self.config.termination == TerminationPolicy::Coupled;
        if coupled {
            self.termination.rearm();
        }

        loop {
            while let Some(next) = self.queue.peek_time() {
                if horizon.is_some_and(|end| next > end) {
                    break;
                }
                self.step()?;
                self.drain_pending()?;
            }

            if !coupled {
                break;
            }
            match self.await_quiescence(horizon)? {
                Quiescence::Terminated => break,
                Quiescence::Resume => continue,
            }
        }

        info!(
            peer = %self.peer(),
            "Events executed out of order: {}",
            self.violations
        );
        Ok(self.report())
    }

    /// Snapshot of the run counters.
    pub fn report(&self) -> RunReport {
        RunReport {
            peer: self.peer(),
            events_executed: self.events_executed,
            causality_violations: self.violations,
            messages_handled: self.messages_handled,
            unhandled_messages: self.unhandled_messages,
            final_time: self.now,
            pending_events: self.queue.len(),
        }
    }

    // ── Port access ──────────────────────────────────────────────────

    /// This peer's index.
    pub fn peer(&self) -> PeerId {
        self.port.self_index()
    }

    /// Number of peers in the mesh.
    pub fn peer_count(&self) -> usize {
        self.port.peer_count()
    }

    /// Sends an application message.
    ///
    /// Tags reserved for kernel control traffic are rejected. Coupled
    /// termination counts only messages sent through here.
    pub fn send(&mut self, dest: PeerId, tag: Tag, payload: Vec<u8>) -> KernelResult<()> {
        if wire::is_control_tag(tag) {
            return Err(KernelError::ReservedTag(tag));
        }
        self.port.send(dest, tag, payload)?;
        self.termination.app_sent += 1;
        Ok(())
    }

    /// The owned port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// The owned port, mutably.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Active configuration.
    pub fn config(&self) -> &ExecutiveConfig {
        &self.config
    }

    /// Consumes the executive and returns its port.
    pub fn into_port(self) -> P {
        self.port
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdes_env::ChannelMesh;
    use std::cell::RefCell;

    fn solo() -> Executive<pdes_env::ChannelPort> {
        let port = ChannelMesh::build(1).remove(0);
        Executive::new(port, ExecutiveConfig::default())
    }

    #[test]
    fn test_starts_at_zero() {
        let exec = solo();
        assert_eq!(exec.current_time(), SimTime::ZERO);
        assert_eq!(exec.causality_violations(), 0);
        assert!(!exec.has_event());
    }

    #[test]
    fn test_run_executes_in_time_order() {
        let mut exec = solo();
        let seen = Rc::new(RefCell::new(Vec::new()));

        for t in [5.0, 1.0, 3.0] {
            let seen = seen.clone();
            exec.schedule_fn_at(t, move |exec| {
                seen.borrow_mut().push(exec.current_time().value());
                Ok(())
            })
            .unwrap();
        }

        let report = exec.run().unwrap();
        assert_eq!(*seen.borrow(), vec![1.0, 3.0, 5.0]);
        assert_eq!(report.causality_violations, 0);
        assert_eq!(report.events_executed, 3);
        assert_eq!(report.final_time, SimTime::new(5.0));
    }

    #[test]
    fn test_schedule_in_is_relative() {
        let mut exec = solo();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let inner = seen.clone();
        exec.schedule_fn_at(2.0, move |exec| {
            let inner = inner.clone();
            exec.schedule_fn_in(1.5, move |exec| {
                inner.borrow_mut().push(exec.current_time().value());
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();

        exec.run().unwrap();
        assert_eq!(*seen.borrow(), vec![3.5]);
    }

    #[test]
    fn test_nan_rejected() {
        let mut exec = solo();
        let err = exec.schedule_fn_at(f64::NAN, |_| Ok(())).unwrap_err();
        assert!(matches!(err, KernelError::InvalidTime(v) if v.is_nan()));
        assert!(matches!(exec.run_until(f64::NAN), Err(KernelError::InvalidTime(_))));
        assert!(!exec.has_event());
    }

    #[test]
    fn test_step_on_empty_queue() {
        let mut exec = solo();
        assert!(matches!(exec.step(), Err(KernelError::EmptyQueue)));
    }

    #[test]
    fn test_action_error_aborts_run() {
        let mut exec = solo();
        exec.schedule_fn_at(1.0, |_| Err(KernelError::action("boom"))).unwrap();
        exec.schedule_fn_at(2.0, |_| Ok(())).unwrap();

        let err = exec.run().unwrap_err();
        assert!(matches!(err, KernelError::Action(ref m) if m == "boom"));
        assert_eq!(exec.pending_events(), 1);
    }

    #[test]
    fn test_send_rejects_control_tags() {
        let mut exec = solo();
        let err = exec.send(PeerId(0), wire::START_GVT, vec![]).unwrap_err();
        assert!(matches!(err, KernelError::ReservedTag(t) if t == wire::START_GVT));
    }

    #[test]
    fn test_initialize_resets_clock_keeps_queue() {
        let mut exec = solo();
        exec.schedule_fn_at(4.0, |_| Ok(())).unwrap();
        exec.schedule_fn_at(8.0, |_| Ok(())).unwrap();
        exec.run_until(5.0).unwrap();
        assert_eq!(exec.current_time(), SimTime::new(4.0));

        exec.initialize();
        assert_eq!(exec.current_time(), SimTime::ZERO);
        assert_eq!(exec.events_executed(), 0);
        assert_eq!(exec.pending_events(), 1);
    }
}
