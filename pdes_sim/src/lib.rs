//! Multi-peer harness for the PDES executive
//!
//! Runs one [`pdes_core::Executive`] per peer, each on its own OS thread,
//! connected by an in-process channel mesh. Every workload draws its
//! randomness from a per-peer ChaCha8 stream derived from one master seed, so
//! the counters of a single-peer run are reproducible and a multi-peer run
//! differs only in message interleaving.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       ScenarioRunner                        │
//! │   picks a workload, forces coupled shutdown, judges result  │
//! └──────────────────────────────┬──────────────────────────────┘
//!                                │
//! ┌──────────────────────────────▼──────────────────────────────┐
//! │                          SimWorld                           │
//! │  ┌───────────┐          ┌───────────┐                       │
//! │  │ Executive │◄────────►│ Executive │     ...               │
//! │  │    P0     │ Channel  │    P1     │                       │
//! │  └───────────┘   Mesh   └───────────┘                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use pdes_sim::ScenarioRunner;
//! use pdes_sim::scenarios::ScenarioId;
//!
//! let result = ScenarioRunner::new(42, 4)
//!     .with_end_time(50.0)
//!     .run(ScenarioId::GvtSweep);
//! assert!(result.passed);
//! ```

mod error;
mod runner;
pub mod scenarios;
pub mod workload;
mod world;

pub use error::SimError;
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use world::{PeerOutcome, PeerRun, SimConfig, SimWorld};
