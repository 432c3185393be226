//! Decoded PCM asset handed from the loader to the engine

use crate::types::{StereoBuffer, StereoSample};

/// A fully decoded track
///
/// Frames are interleaved stereo at the asset's native sample rate; mono
/// sources are duplicated into both channels by the decoder.
#[derive(Debug, Clone)]
pub struct DecodedAsset {
    frames: StereoBuffer,
    sample_rate: u32,
    /// Duration claimed by the container, if any
    reported_duration: Option<f64>,
    /// Raw size metadata in samples, as reported by the decoder
    size_in_samples: u64,
}

impl DecodedAsset {
    /// Create an asset whose size metadata is its frame count
    pub fn new(frames: StereoBuffer, sample_rate: u32) -> Self {
        let size_in_samples = frames.len() as u64;
        Self {
            frames,
            sample_rate,
            reported_duration: None,
            size_in_samples,
        }
    }

    pub fn with_reported_duration(mut self, seconds: Option<f64>) -> Self {
        self.reported_duration = seconds;
        self
    }

    pub fn with_size_in_samples(mut self, size_in_samples: u64) -> Self {
        self.size_in_samples = size_in_samples;
        self
    }

    #[inline]
    pub fn frames(&self) -> &[StereoSample] {
        self.frames.as_slice()
    }

    #[inline]
    pub fn len_frames(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn reported_duration(&self) -> Option<f64> {
        self.reported_duration
    }

    pub fn size_in_samples(&self) -> u64 {
        self.size_in_samples
    }

    /// Length of the decoded audio in seconds
    pub fn frames_duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames.len() as f64 / self.sample_rate as f64
    }

    /// Constant-level stereo asset, used by tests across the crate
    #[cfg(test)]
    pub(crate) fn constant(seconds: f64, sample_rate: u32, level: f32) -> Self {
        let len = (seconds * sample_rate as f64).round() as usize;
        Self::new(
            StereoBuffer::from_vec(vec![StereoSample::mono(level); len]),
            sample_rate,
        )
    }

    /// Asset whose left channel encodes the frame index, for position checks
    #[cfg(test)]
    pub(crate) fn ramp(len: usize, sample_rate: u32) -> Self {
        let frames = (0..len)
            .map(|i| StereoSample::new(i as f32, 1.0))
            .collect::<Vec<_>>();
        Self::new(StereoBuffer::from_vec(frames), sample_rate)
    }
}
