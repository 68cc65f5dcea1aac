//! Scenario runner - drives a scenario across the peer mesh and judges it.

use crate::scenarios::ScenarioId;
use crate::workload;
use crate::world::{PeerOutcome, SimConfig, SimWorld};

use pdes_core::{ExecutiveConfig, TerminationPolicy};
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Number of peers
    pub peers: usize,

    /// Whether the scenario passed all assertions
    pub passed: bool,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics aggregated over all peers
    pub metrics: ScenarioMetrics,

    /// Per-peer outcomes
    pub outcomes: Vec<PeerOutcome>,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScenarioMetrics {
    /// Events executed
    pub events: u64,

    /// Causality violations counted
    pub violations: u64,

    /// Application messages delivered to handlers
    pub messages: u64,

    /// GVT rounds completed
    pub gvt_rounds: u64,

    /// Wall-clock duration in milliseconds
    pub wall_ms: u64,
}

/// Smallest mesh a distributed scenario is meaningful on.
pub const MIN_DISTRIBUTED_PEERS: usize = 2;

/// Runs named scenarios.
pub struct ScenarioRunner {
    /// Simulation configuration
    config: SimConfig,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64, peers: usize) -> Self {
        Self {
            config: SimConfig {
                seed,
                peers,
                ..Default::default()
            },
        }
    }

    /// Sets the simulated horizon.
    pub fn with_end_time(mut self, end_time: f64) -> Self {
        self.config.end_time = end_time;
        self
    }

    /// Sets the kernel configuration.
    pub fn with_config(mut self, executive: ExecutiveConfig) -> Self {
        self.config.executive = executive;
        self
    }

    /// Sets the simulated time between GVT rounds.
    pub fn with_gvt_interval(mut self, interval: f64) -> Self {
        self.config.gvt_interval = interval;
        self
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!(
            "Starting scenario: {} (seed={}, peers={})",
            scenario.name(),
            self.config.seed,
            self.config.peers
        );
        debug!("  {}", scenario.description());

        if let Some(reason) = check_peers(scenario, self.config.peers) {
            warn!("{} rejected: {}", scenario.name(), reason);
            return ScenarioResult {
                scenario,
                seed: self.config.seed,
                peers: self.config.peers,
                passed: false,
                failure_reason: Some(reason),
                metrics: ScenarioMetrics::default(),
                outcomes: Vec::new(),
            };
        }

        let mut config = self.config.clone();
        if scenario.is_distributed() {
            if config.executive.termination != TerminationPolicy::Coupled {
                debug!("Forcing coupled termination for {}", scenario.name());
            }
            config.executive.termination = TerminationPolicy::Coupled;
        } else {
            config.peers = 1;
        }

        let started = Instant::now();
        let world = SimWorld::new(config.clone());
        let outcomes = match scenario {
            ScenarioId::Relay => world.run(|exec, rng| workload::relay(&config, exec, rng)),
            ScenarioId::GvtSweep => world.run(|exec, rng| workload::gvt_sweep(&config, exec, rng)),
            ScenarioId::Straggler => world.run(|exec, rng| workload::straggler(&config, exec, rng)),
            ScenarioId::Horizon => world.run(|exec, rng| workload::horizon(&config, exec, rng)),
        };

        let mut metrics = collect_metrics(&outcomes);
        metrics.wall_ms = started.elapsed().as_millis() as u64;

        let failure_reason = judge(scenario, &config, &outcomes);
        if let Some(reason) = &failure_reason {
            warn!("{} failed: {}", scenario.name(), reason);
        }

        ScenarioResult {
            scenario,
            seed: config.seed,
            peers: config.peers,
            passed: failure_reason.is_none(),
            failure_reason,
            metrics,
            outcomes,
        }
    }
}

fn check_peers(scenario: ScenarioId, peers: usize) -> Option<String> {
    if peers == 0 {
        return Some("at least one peer is required".to_string());
    }
    if scenario.is_distributed() && peers < MIN_DISTRIBUTED_PEERS {
        return Some(format!(
            "{} needs at least {} peers, got {}",
            scenario.name(),
            MIN_DISTRIBUTED_PEERS,
            peers
        ));
    }
    None
}

fn collect_metrics(outcomes: &[PeerOutcome]) -> ScenarioMetrics {
    let mut metrics = ScenarioMetrics::default();
    for run in outcomes.iter().filter_map(|o| o.run.as_ref()) {
        if let Some(report) = &run.report {
            metrics.events += report.events_executed;
            metrics.violations += report.causality_violations;
            metrics.messages += report.messages_handled;
        }
        metrics.gvt_rounds += run.gvt_bounds.len() as u64;
    }
    metrics
}

/// Returns the first broken assertion, if any.
fn judge(scenario: ScenarioId, config: &SimConfig, outcomes: &[PeerOutcome]) -> Option<String> {
    if outcomes.len() != config.peers {
        return Some(format!("{} of {} peers reported", outcomes.len(), config.peers));
    }

    let checkpoints = workload::checkpoint_times(config);
    for outcome in outcomes {
        let peer = outcome.peer;
        if let Some(e) = &outcome.error {
            return Some(format!("{} failed: {}", peer, e));
        }
        let Some(run) = &outcome.run else {
            return Some(format!("{} produced no result", peer));
        };
        let Some(report) = &run.report else {
            return Some(format!("{} produced no report", peer));
        };

        if report.final_time.value() > config.end_time && scenario != ScenarioId::Straggler {
            return Some(format!(
                "{} clock {} passed the horizon {}",
                peer, report.final_time, config.end_time
            ));
        }

        match scenario {
            ScenarioId::Relay => {}
            ScenarioId::GvtSweep => {
                if run.gvt_bounds.len() != checkpoints.len() {
                    return Some(format!(
                        "{} completed {} of {} GVT rounds",
                        peer,
                        run.gvt_bounds.len(),
                        checkpoints.len()
                    ));
                }
                if let Some((at, bound)) = run.gvt_bounds.iter().find(|(at, bound)| bound > at) {
                    return Some(format!("{} bound {} exceeds time {}", peer, bound, at));
                }
            }
            ScenarioId::Straggler => {
                if Some(report.causality_violations) != run.expected_violations {
                    return Some(format!(
                        "{} counted {} violations, injected {:?}",
                        peer, report.causality_violations, run.expected_violations
                    ));
                }
            }
            ScenarioId::Horizon => {
                if Some(report.events_executed) != run.expected_events {
                    return Some(format!(
                        "{} executed {} events, expected {:?}",
                        peer, report.events_executed, run.expected_events
                    ));
                }
                let expected_pending =
                    workload::HORIZON_EVENTS - run.expected_events.unwrap_or(0) as usize;
                if report.pending_events != expected_pending {
                    return Some(format!(
                        "{} left {} events queued, expected {}",
                        peer, report.pending_events, expected_pending
                    ));
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_scenario() {
        let runner = ScenarioRunner::new(42, 3).with_end_time(20.0);
        let result = runner.run(ScenarioId::Relay);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.outcomes.len(), 3);
        assert!(result.metrics.events > 0);
        assert!(result.metrics.messages > 0);
    }

    #[test]
    fn test_gvt_sweep_scenario() {
        let runner = ScenarioRunner::new(7, 3)
            .with_end_time(40.0)
            .with_gvt_interval(10.0);
        let result = runner.run(ScenarioId::GvtSweep);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.gvt_rounds, 3 * 4);
    }

    #[test]
    fn test_straggler_scenario_is_single_peer() {
        let result = ScenarioRunner::new(42, 6).run(ScenarioId::Straggler);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.peers, 1);
        assert!(result.metrics.violations > 0);
    }

    #[test]
    fn test_horizon_scenario() {
        let result = ScenarioRunner::new(3, 1).with_end_time(10.0).run(ScenarioId::Horizon);
        assert!(result.passed, "{:?}", result.failure_reason);
    }

    #[test]
    fn test_distributed_scenarios_need_two_peers() {
        let result = ScenarioRunner::new(42, 1).run(ScenarioId::Relay);
        assert!(!result.passed);
        assert!(result.outcomes.is_empty());
        assert_eq!(result.metrics, ScenarioMetrics::default());

        let result = ScenarioRunner::new(42, 0).run(ScenarioId::GvtSweep);
        assert!(!result.passed);
        assert!(result.failure_reason.unwrap().contains("at least one peer"));

        let result = ScenarioRunner::new(42, 2).with_end_time(10.0).run(ScenarioId::Relay);
        assert!(result.passed, "{:?}", result.failure_reason);
    }

    #[test]
    fn test_zero_peers_rejected_for_local_scenarios() {
        let result = ScenarioRunner::new(42, 0).run(ScenarioId::Straggler);
        assert!(!result.passed);
        assert_eq!(result.peers, 0);
    }

    #[test]
    fn test_same_seed_same_counters() {
        let a = ScenarioRunner::new(99, 1).run(ScenarioId::Straggler);
        let b = ScenarioRunner::new(99, 1).run(ScenarioId::Straggler);
        assert_eq!(a.metrics.events, b.metrics.events);
        assert_eq!(a.metrics.violations, b.metrics.violations);
    }

    #[test]
    fn test_result_serializes() {
        let result = ScenarioRunner::new(1, 1).with_end_time(5.0).run(ScenarioId::Horizon);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["scenario"], "horizon");
        assert!(json["metrics"]["events"].is_u64());
    }
}
