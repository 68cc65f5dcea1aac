//! Executive configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What happens when the local event loop runs out of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TerminationPolicy {
    /// Return as soon as the local loop ends. Peers may still be running.
    #[default]
    Decoupled,

    /// Return only once every peer is idle and no message is in flight.
    Coupled,
}

/// Polling and timeout behaviour of the blocking barriers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Sleep between two empty polls (zero yields instead)
    #[serde(with = "micros")]
    pub poll_backoff: Duration,

    /// Give up on a barrier after this long (`None` waits forever)
    #[serde(with = "opt_millis")]
    pub barrier_timeout: Option<Duration>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_backoff: Duration::from_micros(50),
            barrier_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Configuration for an [`Executive`](crate::Executive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ExecutiveConfig {
    /// End-of-run behaviour (default: decoupled)
    pub termination: TerminationPolicy,

    /// Fail `drain_pending` when a message arrives with no handler installed
    pub strict_handlers: bool,

    /// Barrier polling
    pub sync: SyncConfig,
}

impl ExecutiveConfig {
    /// Sets the termination policy.
    pub fn with_termination(mut self, policy: TerminationPolicy) -> Self {
        self.termination = policy;
        self
    }

    /// Sets strict handler checking.
    pub fn with_strict_handlers(mut self, strict: bool) -> Self {
        self.strict_handlers = strict;
        self
    }

    /// Sets the barrier timeout.
    pub fn with_barrier_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.sync.barrier_timeout = timeout;
        self
    }

    /// Sets the backoff between empty polls.
    pub fn with_poll_backoff(mut self, backoff: Duration) -> Self {
        self.sync.poll_backoff = backoff;
        self
    }
}

mod micros {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_micros() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_micros)
    }
}

mod opt_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}
