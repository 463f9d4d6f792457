//! Audio format descriptors and the chunk value object that flows through the hub.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Sample encoding the wire audio arrives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleEncoding {
    PcmS8,
    PcmS16Le,
    PcmS24Le,
    PcmS32Le,
    Float32Le,
}

impl SampleEncoding {
    /// Bytes occupied by a single sample in this encoding.
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleEncoding::PcmS8 => 1,
            SampleEncoding::PcmS16Le => 2,
            SampleEncoding::PcmS24Le => 3,
            SampleEncoding::PcmS32Le | SampleEncoding::Float32Le => 4,
        }
    }
}

/// A declared or derived audio format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u8,
    pub encoding: SampleEncoding,
}

impl AudioFormat {
    pub const CANONICAL: AudioFormat = AudioFormat {
        sample_rate: 16_000,
        channels: 1,
        encoding: SampleEncoding::PcmS16Le,
    };

    pub fn is_canonical(&self) -> bool {
        *self == Self::CANONICAL
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.encoding.bytes_per_sample() * self.channels as usize
    }
}

/// Immutable value object: raw bytes plus format, sequence number and arrival time.
///
/// Owned by the per-session audio queue; dropped on session termination or
/// `clear_audio_buffer`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    /// Monotonic per-session sequence number, assigned by the producer.
    pub seq: u64,
    /// Wall-clock monotonic timestamp (ms) when the chunk arrived at the hub.
    pub arrival_ts_ms: i64,
    pub format: AudioFormat,
    pub bytes: Arc<[u8]>,
}

impl AudioChunk {
    pub fn new(seq: u64, arrival_ts_ms: i64, format: AudioFormat, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            seq,
            arrival_ts_ms,
            format,
            bytes: bytes.into(),
        }
    }

    pub fn len_bytes(&self) -> usize {
        self.bytes.len()
    }

    /// Duration of this chunk in milliseconds, derived from its own format.
    pub fn duration_ms(&self) -> u64 {
        let frame_bytes = self.format.bytes_per_frame().max(1);
        let frames = self.bytes.len() / frame_bytes;
        if self.format.sample_rate == 0 {
            return 0;
        }
        (frames as u64 * 1000) / self.format.sample_rate as u64
    }
}
