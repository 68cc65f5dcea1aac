//! Peer programs driven by the scenarios.
//!
//! The relay model: a token arrives at a peer, waits a random (exponential)
//! hop delay and is forwarded to a random other peer with its arrival stamp.
//! The receiver schedules the arrival at that stamp, which may already lie
//! behind its clock.

use pdes_core::wire::FIRST_APPLICATION_TAG;
use pdes_core::{Executive, KernelError, KernelResult, SimTime};
use pdes_env::{ChannelPort, Envelope, PeerId, Tag};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Exp};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;

use crate::world::{PeerRun, SimConfig};

/// Application tag of relay tokens.
pub const TOKEN: Tag = FIRST_APPLICATION_TAG;

/// A relay token on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// Globally unique token id
    pub id: u64,

    /// Simulated arrival time at the receiver
    pub stamp: f64,

    /// Hops taken so far
    pub hops: u32,
}

impl Token {
    /// Encodes the token as JSON bytes.
    pub fn encode(&self) -> KernelResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| KernelError::action(format!("token encode: {}", e)))
    }

    /// Decodes a token received in `envelope`.
    pub fn decode(envelope: &Envelope) -> KernelResult<Token> {
        serde_json::from_slice(&envelope.payload).map_err(|e| {
            KernelError::action(format!("bad token from {}: {}", envelope.source, e))
        })
    }
}

type Port = ChannelPort;

/// State shared by every relay action on one peer.
struct Relay {
    rng: RefCell<ChaCha8Rng>,
    delay: Exp<f64>,
    forwarded: RefCell<u64>,
}

impl Relay {
    fn new(rng: &mut ChaCha8Rng, mean_hop_delay: f64) -> KernelResult<Rc<Self>> {
        let delay = Exp::new(1.0 / mean_hop_delay.max(f64::EPSILON))
            .map_err(|e| KernelError::action(format!("invalid hop delay: {}", e)))?;
        Ok(Rc::new(Relay {
            rng: RefCell::new(rng.clone()),
            delay,
            forwarded: RefCell::new(0),
        }))
    }

    /// Executes a token arrival: forward it after a random hop delay.
    fn arrive(&self, exec: &mut Executive<Port>, token: Token) -> KernelResult<()> {
        let peers = exec.peer_count();
        let me = exec.peer().index();
        if peers < 2 {
            return Ok(());
        }

        let (dest, hop_delay) = {
            let mut rng = self.rng.borrow_mut();
            // Uniform over the other peers
            let mut dest = rng.gen_range(0..peers - 1);
            if dest >= me {
                dest += 1;
            }
            (PeerId(dest), self.delay.sample(&mut *rng))
        };

        let next = Token {
            id: token.id,
            stamp: exec.current_time().value() + hop_delay,
            hops: token.hops + 1,
        };
        debug!(peer = %exec.peer(), %dest, token = next.id, stamp = next.stamp, "Forwarding token");
        exec.send(dest, TOKEN, next.encode()?)?;
        *self.forwarded.borrow_mut() += 1;
        Ok(())
    }

    fn schedule_arrival(self: &Rc<Self>, exec: &mut Executive<Port>, token: Token) -> KernelResult<()> {
        let relay = Rc::clone(self);
        exec.schedule_fn_at(token.stamp, move |exec| relay.arrive(exec, token))?;
        Ok(())
    }

    /// Installs the message handler and injects this peer's initial tokens.
    fn install(self: &Rc<Self>, exec: &mut Executive<Port>, tokens: usize) -> KernelResult<()> {
        let relay = Rc::clone(self);
        exec.register_handler(move |exec, envelope| {
            if envelope.tag != TOKEN {
                return Ok(());
            }
            let token = Token::decode(&envelope)?;
            relay.schedule_arrival(exec, token)
        });

        let base = (exec.peer().index() as u64) << 32;
        for i in 0..tokens {
            let stamp = self.rng.borrow_mut().gen_range(0.0..1.0);
            let token = Token { id: base + i as u64, stamp, hops: 0 };
            self.schedule_arrival(exec, token)?;
        }
        Ok(())
    }
}

/// Relay tokens until the horizon.
pub fn relay(
    config: &SimConfig,
    exec: &mut Executive<Port>,
    rng: &mut ChaCha8Rng,
) -> KernelResult<PeerRun> {
    let relay = Relay::new(rng, config.mean_hop_delay)?;
    relay.install(exec, config.tokens_per_peer)?;

    let report = exec.run_until(config.end_time)?;
    debug!(peer = %exec.peer(), forwarded = *relay.forwarded.borrow(), "Relay finished");
    Ok(PeerRun { report: Some(report), ..Default::default() })
}

/// Simulated instants at which `gvt_sweep` takes a GVT round.
pub fn checkpoint_times(config: &SimConfig) -> Vec<f64> {
    if config.gvt_interval <= 0.0 {
        return Vec::new();
    }
    (1..)
        .map(|k| k as f64 * config.gvt_interval)
        .take_while(|at| *at <= config.end_time)
        .collect()
}

/// Relay tokens and take a GVT round every `gvt_interval`.
pub fn gvt_sweep(
    config: &SimConfig,
    exec: &mut Executive<Port>,
    rng: &mut ChaCha8Rng,
) -> KernelResult<PeerRun> {
    let relay = Relay::new(rng, config.mean_hop_delay)?;
    relay.install(exec, config.tokens_per_peer)?;

    let bounds: Rc<RefCell<Vec<(f64, f64)>>> = Rc::default();
    for at in checkpoint_times(config) {
        let bounds = Rc::clone(&bounds);
        exec.schedule_fn_at(at, move |exec| {
            let taken_at = exec.current_time().value();
            let bound = exec.compute_round()?;
            bounds.borrow_mut().push((taken_at, bound.value()));
            Ok(())
        })?;
    }

    let report = exec.run_until(config.end_time)?;
    let gvt_bounds = bounds.borrow().clone();
    Ok(PeerRun { report: Some(report), gvt_bounds, ..Default::default() })
}

/// Schedule stragglers behind the clock at random points of a local run.
pub fn straggler(
    config: &SimConfig,
    exec: &mut Executive<Port>,
    rng: &mut ChaCha8Rng,
) -> KernelResult<PeerRun> {
    let base_events = 50usize;
    let step = (config.end_time / base_events as f64).max(f64::EPSILON);
    let mut injected = 0u64;

    for i in 1..=base_events {
        let at = SimTime::new(i as f64 * step);
        if rng.gen_bool(0.3) {
            let lag = rng.gen_range(0.1..=1.0) * step * i as f64;
            exec.schedule_fn_at(at, move |exec| {
                exec.schedule_fn_in(-lag, |_| Ok(()))?;
                Ok(())
            })?;
            injected += 1;
        } else {
            exec.schedule_fn_at(at, |_| Ok(()))?;
        }
    }

    let report = exec.run()?;
    Ok(PeerRun { report: Some(report), expected_violations: Some(injected), ..Default::default() })
}

/// Events `horizon` scatters over twice the horizon.
pub const HORIZON_EVENTS: usize = 40;

/// Random events on both sides of the horizon; only the near side runs.
pub fn horizon(
    config: &SimConfig,
    exec: &mut Executive<Port>,
    rng: &mut ChaCha8Rng,
) -> KernelResult<PeerRun> {
    let end = config.end_time;
    let mut expected = 0u64;
    for _ in 0..HORIZON_EVENTS {
        let at = rng.gen::<f64>() * 2.0 * end;
        if at <= end {
            expected += 1;
        }
        exec.schedule_fn_at(at, move |exec| {
            if exec.current_time().value() > end {
                return Err(KernelError::action("event executed past the horizon"));
            }
            Ok(())
        })?;
    }

    let report = exec.run_until(end)?;
    Ok(PeerRun { report: Some(report), expected_events: Some(expected), ..Default::default() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdes_env::ChannelMesh;
    use proptest::prelude::*;
    use rand::SeedableRng;

    #[test]
    fn test_token_codec() {
        let token = Token { id: 7, stamp: 3.25, hops: 2 };
        let envelope = Envelope::new(PeerId(1), TOKEN, token.encode().unwrap());
        assert_eq!(Token::decode(&envelope).unwrap(), token);
    }

    #[test]
    fn test_bad_token_is_action_error() {
        let envelope = Envelope::new(PeerId(1), TOKEN, b"not json".to_vec());
        assert!(matches!(Token::decode(&envelope), Err(KernelError::Action(_))));
    }

    #[test]
    fn test_checkpoint_times() {
        let config = SimConfig { end_time: 100.0, gvt_interval: 25.0, ..Default::default() };
        assert_eq!(checkpoint_times(&config), vec![25.0, 50.0, 75.0, 100.0]);

        let config = SimConfig { gvt_interval: 0.0, ..Default::default() };
        assert!(checkpoint_times(&config).is_empty());
    }

    #[test]
    fn test_straggler_counts_match() {
        let port = ChannelMesh::build(1).remove(0);
        let mut exec = Executive::new(port, Default::default());
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let run = straggler(&SimConfig::default(), &mut exec, &mut rng).unwrap();
        let report = run.report.unwrap();
        assert_eq!(Some(report.causality_violations), run.expected_violations);
        assert!(report.events_executed >= 50);
    }

    #[test]
    fn test_single_peer_relay_does_not_forward() {
        let port = ChannelMesh::build(1).remove(0);
        let mut exec = Executive::new(port, Default::default());
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let config = SimConfig { tokens_per_peer: 3, ..Default::default() };
        let run = relay(&config, &mut exec, &mut rng).unwrap();
        assert_eq!(run.report.unwrap().events_executed, 3);
    }

    proptest! {
        #[test]
        fn prop_checkpoints_stay_within_horizon(end in 0.0f64..500.0, interval in 0.5f64..50.0) {
            let config = SimConfig { end_time: end, gvt_interval: interval, ..Default::default() };
            let times = checkpoint_times(&config);

            let next = (times.len() + 1) as f64 * interval;
            prop_assert!(next > end);
            prop_assert!(times.iter().all(|t| *t > 0.0 && *t <= end));
            prop_assert!(times.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
