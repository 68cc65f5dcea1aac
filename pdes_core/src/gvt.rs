//! GVT coordinator.
//!
//! A round broadcasts a control message to every other peer carrying this
//! peer's candidate bound, `min(min_red_timestamp, now)`, and its per-peer
//! sent-counter vector. `compute_round` then blocks on the termination
//! detector until every other peer acknowledged.
//!
//! Receiving side: every `START_GVT` / `COMPUTE_GVT` is recorded (sender's
//! bound, per-peer received count). A `COMPUTE_GVT` is answered with a
//! `TERMINATION` acknowledgment, which is what releases the sender's barrier.
//!
//! Not closed here: Mattern's reconciliation of red messages in flight
//! (`sent == received` per peer before accepting the bound). The colour,
//! counters and `note_red_timestamp` are the hooks for it.

use pdes_env::{CommPort, Envelope, PeerId};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::KernelResult;
use crate::executive::Executive;
use crate::time::SimTime;
use crate::wire::{self, GvtPayload, MessageColor};

/// Per-peer GVT round bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GvtState {
    sent: Vec<u32>,
    received: Vec<u32>,
    min_red_timestamp: SimTime,
    color: MessageColor,
    computing: bool,
    peer_bounds: Vec<Option<SimTime>>,
    rounds_completed: u64,
    last_gvt: Option<SimTime>,
}

impl GvtState {
    /// Zeroed state for a mesh of `peer_count` peers.
    pub fn new(peer_count: usize) -> Self {
        GvtState {
            sent: vec![0; peer_count],
            received: vec![0; peer_count],
            min_red_timestamp: SimTime::INFINITY,
            color: MessageColor::Green,
            computing: false,
            peer_bounds: vec![None; peer_count],
            rounds_completed: 0,
            last_gvt: None,
        }
    }

    /// Control messages sent to each peer.
    pub fn sent(&self) -> &[u32] {
        &self.sent
    }

    /// Control messages received from each peer.
    pub fn received(&self) -> &[u32] {
        &self.received
    }

    /// Smallest red timestamp noted so far (`INFINITY` if none).
    pub fn min_red_timestamp(&self) -> SimTime {
        self.min_red_timestamp
    }

    /// Current message colour.
    pub fn color(&self) -> MessageColor {
        self.color
    }

    /// Whether a round is in progress on this peer.
    pub fn is_computing(&self) -> bool {
        self.computing
    }

    /// Latest bound reported by `peer`, if any.
    pub fn peer_bound(&self, peer: PeerId) -> Option<SimTime> {
        self.peer_bounds.get(peer.index()).copied().flatten()
    }

    /// Number of `compute_round` calls that completed.
    pub fn rounds_completed(&self) -> u64 {
        self.rounds_completed
    }

    /// Bound returned by the last completed round.
    pub fn last_gvt(&self) -> Option<SimTime> {
        self.last_gvt
    }

    fn begin_round(&mut self) {
        self.computing = true;
        self.color = MessageColor::Red;
    }

    fn end_round(&mut self, bound: SimTime) {
        self.computing = false;
        self.color = MessageColor::Green;
        self.rounds_completed += 1;
        self.last_gvt = Some(bound);
    }

    fn abort_round(&mut self) {
        self.computing = false;
        self.color = MessageColor::Green;
    }

    /// A remote `COMPUTE_GVT` closes the round its `START_GVT` opened here.
    /// A local round (red) stays open until its own barrier lifts.
    fn close_remote_round(&mut self) {
        if self.color == MessageColor::Green {
            self.computing = false;
        }
    }
}

impl<P: CommPort> Executive<P> {
    /// Read-only view of the GVT bookkeeping.
    pub fn gvt(&self) -> &GvtState {
        &self.gvt
    }

    /// Lowers the running minimum red timestamp.
    pub fn note_red_timestamp(&mut self, time: impl Into<SimTime>) {
        let time = time.into();
        if time.is_valid() {
            self.gvt.min_red_timestamp = self.gvt.min_red_timestamp.min(time);
        }
    }

    /// `min(min_red_timestamp, current_time())`.
    pub fn candidate_bound(&self) -> SimTime {
        self.gvt.min_red_timestamp.min(self.now)
    }

    /// Broadcasts `START_GVT` to every other peer.
    ///
    /// Returns the number of messages sent.
    pub fn start_round(&mut self) -> KernelResult<usize> {
        self.gvt.begin_round();
        self.broadcast_control(wire::START_GVT)
    }

    /// Broadcasts `COMPUTE_GVT` and waits for every other peer to acknowledge.
    ///
    /// Returns the bound that was broadcast.
    pub fn compute_round(&mut self) -> KernelResult<SimTime> {
        let bound = self.candidate_bound();
        self.gvt.begin_round();
        self.broadcast_control(wire::COMPUTE_GVT)?;

        if let Err(e) = self.wait_for_all() {
            self.gvt.abort_round();
            return Err(e);
        }

        self.gvt.end_round(bound);
        info!(
            peer = %self.peer(),
            round = self.gvt.rounds_completed,
            %bound,
            "GVT round complete"
        );
        Ok(bound)
    }

    fn broadcast_control(&mut self, tag: pdes_env::Tag) -> KernelResult<usize> {
        let me = self.peer();
        let mut sent = 0;

        for i in 0..self.peer_count() {
            let dest = PeerId(i);
            if dest == me {
                continue;
            }
            self.gvt.sent[i] += 1;

            let payload = GvtPayload {
                bound: self.candidate_bound(),
                counters: self.gvt.sent.clone(),
            };
            debug!(peer = %me, %dest, %tag, bound = %payload.bound, "Sending GVT control");
            self.port.send(dest, tag, payload.encode())?;
            sent += 1;
        }
        Ok(sent)
    }

    pub(crate) fn on_gvt_control(&mut self, envelope: Envelope) -> KernelResult<()> {
        let payload = GvtPayload::decode(&envelope.payload, self.peer_count())?;
        let source = envelope.source;

        if let Some(count) = self.gvt.received.get_mut(source.index()) {
            *count += 1;
        }
        if let Some(slot) = self.gvt.peer_bounds.get_mut(source.index()) {
            *slot = Some(payload.bound);
        }
        debug!(
            peer = %self.peer(),
            %source,
            tag = %envelope.tag,
            bound = %payload.bound,
            "Received GVT control"
        );

        if envelope.tag == wire::COMPUTE_GVT {
            self.gvt.close_remote_round();
            self.port.send(source, wire::TERMINATION, Vec::new())?;
        } else {
            self.gvt.computing = true;
        }
        Ok(())
    }
}
