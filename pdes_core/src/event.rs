//! Events and the actions they carry.
//!
//! An [`Event`] pairs a simulated time with an action. Events are immutable
//! once created; the queue owns them until they are dequeued and executed.

use crate::error::KernelResult;
use crate::executive::Executive;
use crate::time::SimTime;
use pdes_env::CommPort;
use std::cmp::Ordering;
use std::rc::Rc;

/// Work to perform when an event's time arrives.
///
/// The action gets the executive by reference so it can read the clock,
/// schedule follow-up events or send messages through the port. Returning an
/// error aborts the current run.
pub trait EventAction<P: CommPort> {
    /// Executes the action at the event's scheduled time.
    fn execute(&self, exec: &mut Executive<P>) -> KernelResult<()>;
}

impl<P, F> EventAction<P> for F
where
    P: CommPort,
    F: Fn(&mut Executive<P>) -> KernelResult<()>,
{
    fn execute(&self, exec: &mut Executive<P>) -> KernelResult<()> {
        (self)(exec)
    }
}

/// Shared handle to an action.
///
/// The queue only references the action; domain code may keep its own handle
/// and reschedule the same action any number of times.
pub type ActionRef<P> = Rc<dyn EventAction<P>>;

/// Insertion sequence number, the FIFO tie-break among equal times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventSeq(u64);

impl EventSeq {
    /// Wraps a raw sequence number.
    #[inline]
    pub fn new(raw: u64) -> Self {
        EventSeq(raw)
    }

    /// Returns the raw value.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EventSeq {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "E#{}", self.0)
    }
}

/// A scheduled `(time, action)` pair.
///
/// Ordering looks only at `(time, seq)` and is reversed, so that
/// `BinaryHeap` (a max-heap) pops the earliest event first.
#[derive(Debug, Clone)]
pub struct Event<A> {
    /// When the action runs.
    pub time: SimTime,

    /// Insertion order among all events of the owning queue.
    pub seq: EventSeq,

    /// What runs.
    pub action: A,
}

impl<A> Event<A> {
    /// Creates an event.
    pub fn new(time: SimTime, seq: EventSeq, action: A) -> Self {
        Event { time, seq, action }
    }
}

impl<A> PartialEq for Event<A> {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl<A> Eq for Event<A> {}

impl<A> Ord for Event<A> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: smallest (time, seq) is the heap's greatest element.
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<A> PartialOrd for Event<A> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
