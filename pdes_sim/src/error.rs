//! Harness error types.

use pdes_core::KernelError;
use thiserror::Error;

/// Errors raised while setting up or running a simulation.
#[derive(Debug, Error)]
pub enum SimError {
    /// Reading a configuration file failed
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration file is not valid JSON for `ExecutiveConfig`
    #[error("Config parse error: {0}")]
    Config(#[from] serde_json::Error),

    /// Unknown scenario name
    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),

    /// Kernel failure on a peer
    #[error("Kernel error: {0}")]
    Kernel(#[from] KernelError),
}
