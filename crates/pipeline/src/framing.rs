//! Slices canonical-format PCM16 mono bytes into the fixed-size frames the
//! VAD and wake-word operators expect, carrying leftover samples across
//! chunk boundaries.

use asrhub_vad::FRAME_SAMPLES;

/// Accumulates little-endian i16 mono samples and yields complete
/// `FRAME_SAMPLES`-sample frames as they become available.
#[derive(Debug, Default)]
pub struct FrameAccumulator {
    leftover: Vec<f32>,
}

impl FrameAccumulator {
    pub fn new() -> Self {
        Self { leftover: Vec::with_capacity(FRAME_SAMPLES) }
    }

    /// Feed canonical PCM16LE mono bytes, returning every full frame that
    /// can be formed. Odd trailing bytes (a split sample) are dropped; this
    /// can only happen if a caller pushes a non-frame-aligned chunk size.
    pub fn push(&mut self, pcm16le_mono: &[u8]) -> Vec<Vec<f32>> {
        for pair in pcm16le_mono.chunks_exact(2) {
            let sample = i16::from_le_bytes([pair[0], pair[1]]);
            self.leftover.push(sample as f32 / i16::MAX as f32);
        }

        let mut frames = Vec::new();
        while self.leftover.len() >= FRAME_SAMPLES {
            let frame: Vec<f32> = self.leftover.drain(..FRAME_SAMPLES).collect();
            frames.push(frame);
        }
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silence_bytes(samples: usize) -> Vec<u8> {
        vec![0u8; samples * 2]
    }

    #[test]
    fn emits_no_frame_until_full() {
        let mut acc = FrameAccumulator::new();
        let frames = acc.push(&silence_bytes(FRAME_SAMPLES - 1));
        assert!(frames.is_empty());
    }

    #[test]
    fn emits_one_frame_exactly_at_boundary() {
        let mut acc = FrameAccumulator::new();
        let frames = acc.push(&silence_bytes(FRAME_SAMPLES));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), FRAME_SAMPLES);
    }

    #[test]
    fn carries_leftover_across_calls() {
        let mut acc = FrameAccumulator::new();
        assert!(acc.push(&silence_bytes(FRAME_SAMPLES / 2)).is_empty());
        let frames = acc.push(&silence_bytes(FRAME_SAMPLES / 2));
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn multiple_frames_from_one_large_push() {
        let mut acc = FrameAccumulator::new();
        let frames = acc.push(&silence_bytes(FRAME_SAMPLES * 3 + 10));
        assert_eq!(frames.len(), 3);
        assert_eq!(acc.leftover.len(), 10);
    }
}
