//! Wire contract for kernel control messages.
//!
//! Tag values are fixed so that peers built from different binaries agree
//! on them. GVT control payloads use a fixed layout:
//!
//! ```text
//! offset 0            8                 8 + 4*peer_count
//!        +------------+-----------------+
//!        | bound: f64 | counters: [u32] |
//!        +------------+-----------------+
//! ```
//!
//! Every field is little-endian. The counter vector has exactly one entry per
//! peer index.

use pdes_env::Tag;
use serde::{Deserialize, Serialize};

use crate::error::{KernelError, KernelResult};
use crate::time::SimTime;

/// Acknowledgment counted by the termination detector.
pub const TERMINATION: Tag = Tag(0);

/// Coupled termination: the coordinator releases every peer.
pub const SHUTDOWN: Tag = Tag(1);

/// GVT round start broadcast.
pub const START_GVT: Tag = Tag(4);

/// GVT round compute broadcast; answered with [`TERMINATION`].
pub const COMPUTE_GVT: Tag = Tag(5);

/// Coupled termination: coordinator asks for a [`QuiescenceReport`].
pub const QUIESCENCE_QUERY: Tag = Tag(6);

/// Coupled termination: an idle peer's answer to a query.
pub const QUIESCENCE_REPORT: Tag = Tag(7);

/// Lowest tag available to application messages.
pub const FIRST_APPLICATION_TAG: Tag = Tag(16);

/// Returns `true` for tags the kernel consumes itself.
pub fn is_control_tag(tag: Tag) -> bool {
    tag.0 >= 0 && tag.0 < FIRST_APPLICATION_TAG.0
}

/// Mattern message colour. Values match the legacy wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum MessageColor {
    Red = 2,
    Green = 3,
}

impl MessageColor {
    /// Wire code of the colour.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Parses a wire code.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            2 => Some(MessageColor::Red),
            3 => Some(MessageColor::Green),
            _ => None,
        }
    }
}

const BOUND_LEN: usize = 8;
const COUNTER_LEN: usize = 4;

/// Body of a `START_GVT` / `COMPUTE_GVT` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GvtPayload {
    /// Sender's candidate lower bound on global time
    pub bound: SimTime,

    /// Sender's per-peer sent-message counters
    pub counters: Vec<u32>,
}

impl GvtPayload {
    /// Encoded size for a mesh of `peer_count` peers.
    pub fn encoded_len(peer_count: usize) -> usize {
        BOUND_LEN + COUNTER_LEN * peer_count
    }

    /// Serializes to the fixed layout.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::encoded_len(self.counters.len()));
        buf.extend_from_slice(&self.bound.value().to_le_bytes());
        for counter in &self.counters {
            buf.extend_from_slice(&counter.to_le_bytes());
        }
        buf
    }

    /// Parses the fixed layout for a mesh of `peer_count` peers.
    pub fn decode(bytes: &[u8], peer_count: usize) -> KernelResult<Self> {
        let expected = Self::encoded_len(peer_count);
        if bytes.len() != expected {
            return Err(KernelError::MalformedPayload {
                expected,
                actual: bytes.len(),
            });
        }

        let (bound, rest) = bytes.split_at(BOUND_LEN);
        let mut raw = [0u8; BOUND_LEN];
        raw.copy_from_slice(bound);
        let bound = SimTime::new(f64::from_le_bytes(raw));

        let counters = rest
            .chunks_exact(COUNTER_LEN)
            .map(|chunk| {
                let mut raw = [0u8; COUNTER_LEN];
                raw.copy_from_slice(chunk);
                u32::from_le_bytes(raw)
            })
            .collect();

        Ok(GvtPayload { bound, counters })
    }
}

const WAVE_LEN: usize = 8;

/// Encodes the body of a `QUIESCENCE_QUERY`: the wave number.
pub fn encode_query(wave: u64) -> Vec<u8> {
    wave.to_le_bytes().to_vec()
}

/// Decodes the body of a `QUIESCENCE_QUERY`.
pub fn decode_query(bytes: &[u8]) -> KernelResult<u64> {
    read_u64s::<1>(bytes).map(|[wave]| wave)
}

/// Body of a `QUIESCENCE_REPORT`: application traffic counted by an idle peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuiescenceReport {
    /// Query wave being answered
    pub wave: u64,

    /// Application messages sent since initialization
    pub sent: u64,

    /// Application messages received since initialization
    pub received: u64,
}

impl QuiescenceReport {
    /// Encoded size: three little-endian `u64`.
    pub const ENCODED_LEN: usize = 3 * WAVE_LEN;

    /// Serializes as `wave, sent, received`.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::ENCODED_LEN);
        for value in [self.wave, self.sent, self.received] {
            buf.extend_from_slice(&value.to_le_bytes());
        }
        buf
    }

    /// Parses `wave, sent, received`.
    pub fn decode(bytes: &[u8]) -> KernelResult<Self> {
        let [wave, sent, received] = read_u64s::<3>(bytes)?;
        Ok(QuiescenceReport { wave, sent, received })
    }
}

fn read_u64s<const N: usize>(bytes: &[u8]) -> KernelResult<[u64; N]> {
    if bytes.len() != N * WAVE_LEN {
        return Err(KernelError::MalformedPayload {
            expected: N * WAVE_LEN,
            actual: bytes.len(),
        });
    }
    let mut out = [0u64; N];
    for (slot, chunk) in out.iter_mut().zip(bytes.chunks_exact(WAVE_LEN)) {
        let mut raw = [0u8; WAVE_LEN];
        raw.copy_from_slice(chunk);
        *slot = u64::from_le_bytes(raw);
    }
    Ok(out)
}
