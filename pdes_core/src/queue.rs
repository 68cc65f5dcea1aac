//! Time-ordered event queue.
//!
//! A `BinaryHeap` min-heap keyed by `(time, seq)`. The heap alone is not
//! stable for equal keys, so every insert takes the next value of a
//! monotonically increasing sequence counter: among events with the same time
//! the one inserted first is dequeued first.

use std::collections::BinaryHeap;

use crate::error::{KernelError, KernelResult};
use crate::event::{Event, EventSeq};
use crate::time::SimTime;

/// Pending events in ascending time order, FIFO among ties.
#[derive(Debug, Clone)]
pub struct EventQueue<A> {
    heap: BinaryHeap<Event<A>>,
    next_seq: u64,
}

impl<A> EventQueue<A> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        EventQueue {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Inserts an event, placing it after every queued event whose time is
    /// less than or equal to `time`.
    pub fn insert(&mut self, time: SimTime, action: A) -> EventSeq {
        let seq = EventSeq::new(self.next_seq);
        self.next_seq += 1;
        self.heap.push(Event::new(time, seq, action));
        seq
    }

    /// Removes and returns the earliest event.
    pub fn pop_earliest(&mut self) -> KernelResult<Event<A>> {
        self.heap.pop().ok_or(KernelError::EmptyQueue)
    }

    /// Time of the earliest event, if any.
    pub fn peek_time(&self) -> Option<SimTime> {
        self.heap.peek().map(|e| e.time)
    }

    /// Returns `true` if at least one event is pending.
    pub fn has_event(&self) -> bool {
        !self.heap.is_empty()
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns `true` if no event is pending.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl<A> Default for EventQueue<A> {
    fn default() -> Self {
        Self::new()
    }
}
