//! Named simulation scenarios.

use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioId {
    /// Tokens hop between peers with random delays; late arrivals are
    /// counted causality violations.
    Relay,

    /// Relay workload plus `compute_round` at fixed simulated instants.
    GvtSweep,

    /// Events scheduled behind the clock on purpose.
    Straggler,

    /// `run_until` with work on both sides of the horizon.
    Horizon,
}

impl ScenarioId {
    /// Returns all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Relay,
            ScenarioId::GvtSweep,
            ScenarioId::Straggler,
            ScenarioId::Horizon,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Relay => "relay",
            ScenarioId::GvtSweep => "gvt_sweep",
            ScenarioId::Straggler => "straggler",
            ScenarioId::Horizon => "horizon",
        }
    }

    /// One-line description for logs.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Relay => "token relay across all peers",
            ScenarioId::GvtSweep => "periodic GVT rounds under relay load",
            ScenarioId::Straggler => "injected past events are counted exactly once",
            ScenarioId::Horizon => "bounded runs keep later events queued",
        }
    }

    /// Scenarios whose peers exchange messages.
    pub fn is_distributed(&self) -> bool {
        matches!(self, ScenarioId::Relay | ScenarioId::GvtSweep)
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "relay" => Ok(ScenarioId::Relay),
            "gvt_sweep" | "gvt" => Ok(ScenarioId::GvtSweep),
            "straggler" => Ok(ScenarioId::Straggler),
            "horizon" => Ok(ScenarioId::Horizon),
            _ => Err(SimError::UnknownScenario(s.to_string())),
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        for id in ScenarioId::all() {
            assert_eq!(id.name().parse::<ScenarioId>().unwrap(), id);
        }
        assert_eq!("GVT-SWEEP".parse::<ScenarioId>().unwrap(), ScenarioId::GvtSweep);
        assert!("nope".parse::<ScenarioId>().is_err());
    }

    #[test]
    fn test_serialize_as_name() {
        let json = serde_json::to_string(&ScenarioId::GvtSweep).unwrap();
        assert_eq!(json, "\"gvt_sweep\"");
    }
}
