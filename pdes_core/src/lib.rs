//! PDES Executive Kernel
//!
//! The scheduling and synchronization core of a parallel discrete-event
//! simulation. One [`Executive`] runs per peer process:
//!
//! 1. **Event ordering**: a min-heap keyed by `(time, insertion order)`, so
//!    equal-time events run first-in first-out
//! 2. **Loop**: pop, advance the clock, execute, then drain arrived messages.
//!    Events behind the clock still run and are counted as causality
//!    violations (no rollback)
//! 3. **GVT rounds**: broadcast of a candidate lower bound plus per-peer send
//!    counters, closed by an acknowledgment barrier
//! 4. **Termination detection**: the acknowledgment barrier and coupled
//!    end of run by quiescence waves, both with a bounded wait
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │               Executive<P>                 │
//! │  ┌────────────┐  ┌──────────┐  ┌────────┐  │
//! │  │ EventQueue │  │  Clock   │  │Handler │  │
//! │  └────────────┘  └──────────┘  └────────┘  │
//! │  ┌────────────────┐  ┌──────────────────┐  │
//! │  │ GVT coordinator│  │ Termination det. │  │
//! │  └────────────────┘  └──────────────────┘  │
//! └──────────────────────┬─────────────────────┘
//!                        │ CommPort (pdes_env)
//!                    other peers
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use pdes_core::{Executive, ExecutiveConfig};
//! use pdes_env::ChannelMesh;
//!
//! let port = ChannelMesh::build(1).remove(0);
//! let mut exec = Executive::new(port, ExecutiveConfig::default());
//!
//! exec.schedule_fn_at(5.0, |exec| {
//!     println!("arrived at {}", exec.current_time());
//!     Ok(())
//! })?;
//! let report = exec.run()?;
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod executive;
pub mod gvt;
pub mod queue;
pub mod termination;
pub mod time;
pub mod wire;

// Re-export key types for convenience
pub use config::{ExecutiveConfig, SyncConfig, TerminationPolicy};
pub use dispatch::MessageHandler;
pub use error::{KernelError, KernelResult};
pub use event::{ActionRef, Event, EventAction, EventSeq};
pub use executive::{Executive, RunReport};
pub use gvt::GvtState;
pub use queue::EventQueue;
pub use time::SimTime;
pub use wire::{GvtPayload, MessageColor};
