//! Termination detection.
//!
//! Two kinds of waiting live here:
//!
//! - `wait_for_all`: the GVT acknowledgment barrier. The counter restarts at
//!   zero on every call and the barrier lifts at `peer_count - 1`
//!   `TERMINATION` messages.
//! - Coupled end of run: distributed quiescence detection. Peer 0 coordinates
//!   query waves; every idle peer answers with its application message
//!   counters. A peer counts as idle when no event is pending at or before the
//!   horizon. The run is over once two consecutive waves report the same
//!   totals with `sent == received`: nothing was in flight and nobody woke up
//!   in between. A peer that is woken by a late message leaves the wait,
//!   executes the new events and rejoins.
//!
//! ```text
//!   P0 (coordinator)              P1..Pn (idle)
//!   ── QUERY(w) ────────────────────►
//!   ◄─────────── REPORT(w, sent, received)
//!   two stable waves?  ── SHUTDOWN ─►  return
//! ```
//!
//! While waiting, every other message is dispatched normally. This keeps
//! answering other peers' `COMPUTE_GVT` requests, so two peers waiting on
//! each other make progress.

use pdes_env::{CommPort, PeerId};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{KernelError, KernelResult};
use crate::executive::Executive;
use crate::time::SimTime;
use crate::wire::{self, QuiescenceReport};

/// Peer that drives quiescence detection.
pub const COORDINATOR: PeerId = PeerId(0);

/// Acknowledgment and quiescence bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TerminationState {
    acks: usize,
    awaiting_acks: bool,
    stray_acks: u64,
    pub(crate) app_sent: u64,
    pub(crate) app_received: u64,
    pending_query: Option<u64>,
    shutdown: bool,
    // Coordinator side
    wave: u64,
    collecting: bool,
    own_counts: (u64, u64),
    reports: Vec<Option<(u64, u64)>>,
    previous_received: Option<u64>,
    waves_completed: u64,
}

impl TerminationState {
    pub(crate) fn new(peer_count: usize) -> Self {
        TerminationState {
            acks: 0,
            awaiting_acks: false,
            stray_acks: 0,
            app_sent: 0,
            app_received: 0,
            pending_query: None,
            shutdown: false,
            wave: 0,
            collecting: false,
            own_counts: (0, 0),
            reports: vec![None; peer_count],
            previous_received: None,
            waves_completed: 0,
        }
    }

    /// Forgets the outcome of a previous coupled run.
    pub(crate) fn rearm(&mut self) {
        self.shutdown = false;
        self.abandon_wave();
    }

    fn abandon_wave(&mut self) {
        self.collecting = false;
        self.previous_received = None;
    }

    /// `(sent, received)` summed over the wave once every peer answered.
    fn wave_totals(&self, me: PeerId) -> Option<(u64, u64)> {
        let mut totals = self.own_counts;
        for (i, report) in self.reports.iter().enumerate() {
            if i == me.index() {
                continue;
            }
            let (sent, received) = (*report)?;
            totals.0 += sent;
            totals.1 += received;
        }
        Some(totals)
    }

    fn reports_in(&self) -> usize {
        self.reports.iter().filter(|r| r.is_some()).count()
    }
}

/// How a coupled wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Quiescence {
    /// Every peer is idle and nothing is in flight.
    Terminated,
    /// A late message scheduled work within the horizon.
    Resume,
}

impl<P: CommPort> Executive<P> {
    /// Blocks until every other peer sent a `TERMINATION` acknowledgment.
    ///
    /// Returns the number of acknowledgments received. Fails with
    /// [`KernelError::PeerUnresponsive`] once the configured barrier timeout
    /// elapses.
    pub fn wait_for_all(&mut self) -> KernelResult<usize> {
        self.termination.acks = 0;
        self.termination.awaiting_acks = true;
        let result = self.wait_for_acks();
        self.termination.awaiting_acks = false;
        result
    }

    /// Sends a `TERMINATION` message to every other peer.
    pub fn broadcast_termination(&mut self) -> KernelResult<usize> {
        Ok(self.port.broadcast(wire::TERMINATION, &[])?)
    }

    /// Acknowledgments received in the current (or last) barrier.
    pub fn acks_received(&self) -> usize {
        self.termination.acks
    }

    /// Acknowledgments that arrived while no barrier was waiting.
    pub fn stray_acks(&self) -> u64 {
        self.termination.stray_acks
    }

    /// Application messages sent through [`Executive::send`].
    pub fn app_messages_sent(&self) -> u64 {
        self.termination.app_sent
    }

    /// Application messages taken off the port.
    pub fn app_messages_received(&self) -> u64 {
        self.termination.app_received
    }

    /// Whether the last coupled run ended with global quiescence.
    pub fn is_terminated(&self) -> bool {
        self.termination.shutdown
    }

    /// Query waves this peer completed as coordinator.
    pub fn quiescence_waves(&self) -> u64 {
        self.termination.waves_completed
    }

    pub(crate) fn on_termination(&mut self, source: PeerId) {
        if self.termination.awaiting_acks {
            self.termination.acks += 1;
            debug!(
                peer = %self.peer(),
                %source,
                acks = self.termination.acks,
                "Termination acknowledgment"
            );
        } else {
            self.termination.stray_acks += 1;
            warn!(peer = %self.peer(), %source, "Acknowledgment outside of a barrier");
        }
    }

    pub(crate) fn on_shutdown(&mut self, source: PeerId) {
        self.termination.shutdown = true;
        debug!(peer = %self.peer(), %source, "Shutdown received");
    }

    pub(crate) fn on_query(&mut self, source: PeerId, payload: &[u8]) -> KernelResult<()> {
        let wave = wire::decode_query(payload)?;
        debug!(peer = %self.peer(), %source, wave, "Quiescence query");
        self.termination.pending_query = Some(wave);
        Ok(())
    }

    pub(crate) fn on_report(&mut self, source: PeerId, payload: &[u8]) -> KernelResult<()> {
        let report = QuiescenceReport::decode(payload)?;
        let state = &mut self.termination;
        if !state.collecting || report.wave != state.wave {
            debug!(%source, wave = report.wave, "Stale quiescence report");
            return Ok(());
        }
        if let Some(slot) = state.reports.get_mut(source.index()) {
            *slot = Some((report.sent, report.received));
        }
        Ok(())
    }

    fn has_work_within(&self, horizon: Option<SimTime>) -> bool {
        self.queue
            .peek_time()
            .is_some_and(|next| horizon.map_or(true, |end| next <= end))
    }

    fn start_wave(&mut self) -> KernelResult<()> {
        let me = self.peer();
        let state = &mut self.termination;
        state.wave += 1;
        state.collecting = true;
        state.own_counts = (state.app_sent, state.app_received);
        state.reports.iter_mut().for_each(|r| *r = None);
        let wave = state.wave;

        debug!(peer = %me, wave, "Starting quiescence wave");
        self.port.broadcast(wire::QUIESCENCE_QUERY, &wire::encode_query(wave))?;
        Ok(())
    }

    /// Closes the wave if complete. Returns `true` once termination is decided.
    fn close_wave(&mut self) -> KernelResult<bool> {
        let me = self.peer();
        let Some((sent, received)) = self.termination.wave_totals(me) else {
            return Ok(false);
        };

        let state = &mut self.termination;
        state.collecting = false;
        state.waves_completed += 1;
        debug!(peer = %me, wave = state.wave, sent, received, "Quiescence wave closed");

        if sent == received && state.previous_received == Some(sent) {
            state.shutdown = true;
            self.port.broadcast(wire::SHUTDOWN, &[])?;
            info!(peer = %me, waves = self.termination.waves_completed, "All peers quiescent");
            return Ok(true);
        }
        state.previous_received = Some(received);
        Ok(false)
    }

    /// Coupled end of run: waits until the whole mesh is quiescent, or until a
    /// late message gives this peer work at or before `horizon`.
    pub(crate) fn await_quiescence(&mut self, horizon: Option<SimTime>) -> KernelResult<Quiescence> {
        let coordinator = self.peer() == COORDINATOR;
        let mut last_progress = Instant::now();
        debug!(peer = %self.peer(), coordinator, "Waiting for quiescence");

        loop {
            if self.termination.shutdown {
                return Ok(Quiescence::Terminated);
            }
            if self.has_work_within(horizon) {
                if coordinator {
                    self.termination.abandon_wave();
                }
                debug!(peer = %self.peer(), "Woken by a late message");
                return Ok(Quiescence::Resume);
            }

            if let Some(wave) = self.termination.pending_query.take() {
                let report = QuiescenceReport {
                    wave,
                    sent: self.termination.app_sent,
                    received: self.termination.app_received,
                };
                self.port.send(COORDINATOR, wire::QUIESCENCE_REPORT, report.encode())?;
            }

            if coordinator {
                if !self.termination.collecting {
                    self.start_wave()?;
                }
                if self.close_wave()? {
                    return Ok(Quiescence::Terminated);
                }
                if !self.termination.collecting {
                    continue;
                }
            }

            if let Some(envelope) = self.port.poll()? {
                self.dispatch(envelope)?;
                last_progress = Instant::now();
                continue;
            }

            let received = if coordinator { self.termination.reports_in() } else { 0 };
            self.check_timeout(last_progress, self.peer_count().saturating_sub(1), received)?;
            self.backoff();
        }
    }

    fn wait_for_acks(&mut self) -> KernelResult<usize> {
        let expected = self.peer_count().saturating_sub(1);
        let started = Instant::now();
        debug!(peer = %self.peer(), expected, "Waiting for acknowledgments");

        loop {
            let received = self.termination.acks;
            if received >= expected {
                return Ok(received);
            }

            if let Some(envelope) = self.port.poll()? {
                self.dispatch(envelope)?;
                continue;
            }

            self.check_timeout(started, expected, received)?;
            self.backoff();
        }
    }

    fn check_timeout(&self, since: Instant, expected: usize, received: usize) -> KernelResult<()> {
        let waited = since.elapsed();
        match self.config.sync.barrier_timeout {
            Some(timeout) if waited >= timeout => {
                warn!(peer = %self.peer(), received, expected, "Barrier timed out");
                Err(KernelError::PeerUnresponsive {
                    expected,
                    received,
                    waited_ms: waited.as_millis() as u64,
                })
            }
            _ => Ok(()),
        }
    }

    fn backoff(&self) {
        let backoff = self.config.sync.poll_backoff;
        if backoff.is_zero() {
            std::thread::yield_now();
        } else {
            std::thread::sleep(backoff);
        }
    }
}
