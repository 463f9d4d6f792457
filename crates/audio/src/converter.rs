//! Audio format conversion: sample rate, channel count and bit depth.
//!
//! `FormatConverter` is a pure function of `(chunk, target_format)` with a
//! stateful cache of resampler coefficients keyed by `(source_rate, target_rate)`
//! so repeated chunks on the same session don't rebuild a `rubato` resampler
//! per call.

use crate::format::{AudioChunk, AudioFormat, SampleEncoding};
use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("unsupported format combination: {0:?} -> {1:?}")]
    UnsupportedFormat(AudioFormat, AudioFormat),
    #[error("resampler construction failed: {0}")]
    ResamplerInit(String),
    #[error("resampler processing failed: {0}")]
    ResamplerProcess(String),
    #[error("truncated sample buffer: expected a multiple of the frame size")]
    TruncatedBuffer,
}

pub type Result<T> = std::result::Result<T, ConversionError>;

/// CPU/fidelity trade-off for the resampling stage. Never changes the public
/// contract of `convert` — only how the ratio is computed internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResampleQuality {
    Low,
    #[default]
    Medium,
    High,
}

impl ResampleQuality {
    fn sinc_len(self) -> usize {
        match self {
            ResampleQuality::Low => 32,
            ResampleQuality::Medium => 128,
            ResampleQuality::High => 256,
        }
    }

    fn oversampling_factor(self) -> usize {
        match self {
            ResampleQuality::Low => 128,
            ResampleQuality::Medium => 256,
            ResampleQuality::High => 512,
        }
    }
}

#[derive(Hash, Eq, PartialEq, Clone, Copy)]
struct ResamplerKey {
    source_rate: u32,
    target_rate: u32,
}

/// Pure `(chunk, target) -> chunk'` conversion with a cached resampler pool.
pub struct FormatConverter {
    quality: ResampleQuality,
    resamplers: Mutex<HashMap<ResamplerKey, SincFixedIn<f32>>>,
}

impl FormatConverter {
    pub fn new(quality: ResampleQuality) -> Self {
        Self {
            quality,
            resamplers: Mutex::new(HashMap::new()),
        }
    }

    /// Convert a chunk into `target`. Short-circuits (clones, no work) when
    /// `chunk.format == target`.
    pub fn convert(&self, chunk: &AudioChunk, target: AudioFormat) -> Result<AudioChunk> {
        if chunk.format == target {
            return Ok(chunk.clone());
        }

        let samples = decode_to_f32(&chunk.bytes, chunk.format)?;
        let mono = downmix(&samples, chunk.format.channels, target.channels);
        let resampled = if chunk.format.sample_rate != target.sample_rate {
            self.resample(&mono, chunk.format.sample_rate, target.sample_rate)?
        } else {
            mono
        };
        let bytes = encode_from_f32(&resampled, target.encoding);

        Ok(AudioChunk::new(chunk.seq, chunk.arrival_ts_ms, target, bytes))
    }

    fn resample(&self, samples: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>> {
        if samples.is_empty() {
            return Ok(Vec::new());
        }
        let key = ResamplerKey { source_rate, target_rate };
        let mut cache = self.resamplers.lock().unwrap();
        let ratio = target_rate as f64 / source_rate as f64;

        if !cache.contains_key(&key) {
            let params = SincInterpolationParameters {
                sinc_len: self.quality.sinc_len(),
                f_cutoff: 0.95,
                interpolation: SincInterpolationType::Linear,
                oversampling_factor: self.quality.oversampling_factor(),
                window: WindowFunction::BlackmanHarris2,
            };
            let resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, samples.len(), 1)
                .map_err(|e| ConversionError::ResamplerInit(e.to_string()))?;
            cache.insert(key, resampler);
        }

        let resampler = cache.get_mut(&key).unwrap();
        let waves_in = vec![samples.to_vec()];
        let waves_out = resampler
            .process(&waves_in, None)
            .map_err(|e| ConversionError::ResamplerProcess(e.to_string()))?;
        Ok(waves_out.into_iter().next().unwrap_or_default())
    }
}

/// Decode raw bytes in `format` to interleaved `f32` samples in `[-1, 1]`.
fn decode_to_f32(bytes: &[u8], format: AudioFormat) -> Result<Vec<f32>> {
    let bps = format.encoding.bytes_per_sample();
    if bytes.len() % bps != 0 {
        return Err(ConversionError::TruncatedBuffer);
    }
    let samples = match format.encoding {
        SampleEncoding::PcmS8 => bytes
            .iter()
            .map(|&b| (b as i8) as f32 / i8::MAX as f32)
            .collect(),
        SampleEncoding::PcmS16Le => bytes
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]) as f32 / i16::MAX as f32)
            .collect(),
        SampleEncoding::PcmS24Le => bytes
            .chunks_exact(3)
            .map(|c| {
                let v = i32::from_le_bytes([c[0], c[1], c[2], 0]) << 8 >> 8;
                v as f32 / 8_388_607.0
            })
            .collect(),
        SampleEncoding::PcmS32Le => bytes
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f32 / i32::MAX as f32)
            .collect(),
        SampleEncoding::Float32Le => bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    };
    Ok(samples)
}

/// Encode interleaved `f32` samples in `[-1, 1]` to `encoding`.
fn encode_from_f32(samples: &[f32], encoding: SampleEncoding) -> Vec<u8> {
    match encoding {
        SampleEncoding::PcmS8 => samples
            .iter()
            .map(|&s| (s.clamp(-1.0, 1.0) * i8::MAX as f32) as i8 as u8)
            .collect(),
        SampleEncoding::PcmS16Le => samples
            .iter()
            .flat_map(|&s| ((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16).to_le_bytes())
            .collect(),
        SampleEncoding::PcmS24Le => samples
            .iter()
            .flat_map(|&s| {
                let v = (s.clamp(-1.0, 1.0) * 8_388_607.0) as i32;
                let b = v.to_le_bytes();
                [b[0], b[1], b[2]]
            })
            .collect(),
        SampleEncoding::PcmS32Le => samples
            .iter()
            .flat_map(|&s| ((s.clamp(-1.0, 1.0) * i32::MAX as f32) as i32).to_le_bytes())
            .collect(),
        SampleEncoding::Float32Le => samples.iter().flat_map(|&s| s.to_le_bytes()).collect(),
    }
}

/// Down-mix interleaved samples by arithmetic mean (stereo -> mono). Up-mixing
/// (mono -> stereo) duplicates the single channel.
fn downmix(samples: &[f32], source_channels: u8, target_channels: u8) -> Vec<f32> {
    if source_channels == target_channels {
        return samples.to_vec();
    }
    if target_channels == 1 {
        let sc = source_channels as usize;
        samples
            .chunks_exact(sc)
            .map(|frame| frame.iter().sum::<f32>() / sc as f32)
            .collect()
    } else {
        // Mono -> N channels: duplicate.
        samples
            .iter()
            .flat_map(|&s| std::iter::repeat(s).take(target_channels as usize))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s16_chunk(samples: &[i16], channels: u8, rate: u32) -> AudioChunk {
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let format = AudioFormat {
            sample_rate: rate,
            channels,
            encoding: SampleEncoding::PcmS16Le,
        };
        AudioChunk::new(0, 0, format, bytes)
    }

    #[test]
    fn identity_conversion_short_circuits() {
        let converter = FormatConverter::new(ResampleQuality::Medium);
        let chunk = s16_chunk(&[100, -100, 200], 1, 16_000);
        let converted = converter.convert(&chunk, AudioFormat::CANONICAL).unwrap();
        assert_eq!(converted.bytes.as_ref(), chunk.bytes.as_ref());
    }

    #[test]
    fn stereo_downmix_averages_channels() {
        let converter = FormatConverter::new(ResampleQuality::Medium);
        // One stereo frame: left=MAX, right=0 -> mono ~= MAX/2
        let chunk = s16_chunk(&[i16::MAX, 0], 2, 16_000);
        let converted = converter.convert(&chunk, AudioFormat::CANONICAL).unwrap();
        assert_eq!(converted.format.channels, 1);
        let out = decode_to_f32(&converted.bytes, converted.format).unwrap();
        assert_eq!(out.len(), 1);
        assert!((out[0] - 0.5).abs() < 0.01);
    }

    #[test]
    fn resample_changes_sample_count_proportionally() {
        let converter = FormatConverter::new(ResampleQuality::Low);
        let samples: Vec<i16> = (0..800).map(|i| ((i % 100) * 100) as i16).collect();
        let chunk = s16_chunk(&samples, 1, 8_000);
        let converted = converter.convert(&chunk, AudioFormat::CANONICAL).unwrap();
        let out = decode_to_f32(&converted.bytes, converted.format).unwrap();
        // 8kHz -> 16kHz should roughly double the sample count.
        assert!(out.len() > samples.len());
    }

    #[test]
    fn truncated_buffer_is_an_error() {
        let format = AudioFormat::CANONICAL;
        let chunk = AudioChunk::new(0, 0, format, vec![0u8; 3]); // not a multiple of 2
        let converter = FormatConverter::new(ResampleQuality::Medium);
        let target = AudioFormat {
            sample_rate: 8000,
            ..AudioFormat::CANONICAL
        };
        let err = converter.convert(&chunk, target).unwrap_err();
        assert!(matches!(err, ConversionError::TruncatedBuffer));
    }
}
