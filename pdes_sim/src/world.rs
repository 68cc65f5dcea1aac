//! SimWorld - runs one executive per peer on its own thread.

use pdes_core::{Executive, ExecutiveConfig, KernelResult, RunReport};
use pdes_env::{ChannelMesh, ChannelPort, CommPort, PeerId};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::thread;
use tracing::{debug, error};

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for the workloads
    pub seed: u64,

    /// Number of peers
    pub peers: usize,

    /// Simulated horizon for bounded runs
    pub end_time: f64,

    /// Tokens each peer injects into the relay
    pub tokens_per_peer: usize,

    /// Mean hop delay of a relay token (simulated time)
    pub mean_hop_delay: f64,

    /// Simulated time between two GVT rounds
    pub gvt_interval: f64,

    /// Kernel configuration shared by every peer
    pub executive: ExecutiveConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            peers: 4,
            end_time: 100.0,
            tokens_per_peer: 8,
            mean_hop_delay: 2.0,
            gvt_interval: 25.0,
            executive: ExecutiveConfig::default(),
        }
    }
}

/// What one peer's program produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeerRun {
    /// Kernel counters at the end of the run
    pub report: Option<RunReport>,

    /// `(time taken at, bound)` for each completed GVT round
    pub gvt_bounds: Vec<(f64, f64)>,

    /// Causality violations the program deliberately provoked
    pub expected_violations: Option<u64>,

    /// Events the program expects to have executed
    pub expected_events: Option<u64>,
}

/// Result of one peer thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerOutcome {
    /// Peer index
    pub peer: PeerId,

    /// Program output when it succeeded
    pub run: Option<PeerRun>,

    /// Failure message otherwise
    pub error: Option<String>,
}

impl PeerOutcome {
    /// Returns `true` if the peer finished without error.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// The SimWorld - a mesh of peers running the same program.
pub struct SimWorld {
    /// Configuration
    pub config: SimConfig,
}

impl SimWorld {
    /// Creates a new SimWorld with the given configuration.
    pub fn new(config: SimConfig) -> Self {
        Self { config }
    }

    /// Seed of `peer`'s workload RNG, derived from the master seed.
    pub fn peer_seed(&self, peer: PeerId) -> u64 {
        self.config
            .seed
            .wrapping_mul(0x9e3779b97f4a7c15)
            .wrapping_add(peer.index() as u64)
    }

    /// Runs `program` on every peer and collects the outcomes in peer order.
    ///
    /// Each peer owns its executive; nothing is shared between threads except
    /// the channels inside the mesh.
    pub fn run<F>(&self, program: F) -> Vec<PeerOutcome>
    where
        F: Fn(&mut Executive<ChannelPort>, &mut ChaCha8Rng) -> KernelResult<PeerRun> + Sync,
    {
        let ports = ChannelMesh::build(self.config.peers);
        let program = &program;

        thread::scope(|scope| {
            let handles: Vec<_> = ports
                .into_iter()
                .map(|port| {
                    let peer = port.self_index();
                    let seed = self.peer_seed(peer);
                    let config = self.config.executive.clone();
                    let handle = scope.spawn(move || {
                        let mut exec = Executive::new(port, config);
                        let mut rng = ChaCha8Rng::seed_from_u64(seed);
                        program(&mut exec, &mut rng)
                    });
                    (peer, handle)
                })
                .collect();

            handles
                .into_iter()
                .map(|(peer, handle)| match handle.join() {
                    Ok(Ok(run)) => {
                        debug!(%peer, "Peer finished");
                        PeerOutcome { peer, run: Some(run), error: None }
                    }
                    Ok(Err(e)) => {
                        error!(%peer, "Peer failed: {}", e);
                        PeerOutcome { peer, run: None, error: Some(e.to_string()) }
                    }
                    Err(_) => {
                        error!(%peer, "Peer thread panicked");
                        PeerOutcome {
                            peer,
                            run: None,
                            error: Some("peer thread panicked".to_string()),
                        }
                    }
                })
                .collect()
        })
    }

    /// Returns the number of peers.
    pub fn peer_count(&self) -> usize {
        self.config.peers
    }
}
