//! Time-stretching via signalsmith-stretch
//!
//! Used by the player's pitch-preserving varispeed mode: the player reads
//! `rate * n` source frames and the stretcher squeezes or expands them into
//! `n` output frames without changing pitch.

use signalsmith_stretch::Stretch;

use crate::types::{StereoSample, SAMPLE_RATE};

/// Number of channels (stereo)
const CHANNELS: u32 = 2;

/// Pitch-preserving time stretcher
pub struct TimeStretcher {
    stretcher: Stretch,
    /// Pitch shift in semitones (positive = up, negative = down)
    pitch_semitones: f64,
}

impl TimeStretcher {
    pub fn new_with_sample_rate(sample_rate: u32) -> Self {
        Self {
            stretcher: Stretch::preset_default(CHANNELS, sample_rate),
            pitch_semitones: 0.0,
        }
    }

    pub fn new() -> Self {
        Self::new_with_sample_rate(SAMPLE_RATE)
    }

    /// Set pitch shift in semitones, clamped to one octave either way
    pub fn set_pitch_semitones(&mut self, semitones: f64) {
        self.pitch_semitones = semitones.clamp(-12.0, 12.0);
        self.stretcher
            .set_transpose_factor_semitones(self.pitch_semitones as f32, None);
    }

    pub fn pitch_semitones(&self) -> f64 {
        self.pitch_semitones
    }

    /// Total latency in frames
    pub fn total_latency(&self) -> usize {
        self.stretcher.input_latency() + self.stretcher.output_latency()
    }

    pub fn reset(&mut self) {
        self.stretcher.reset();
    }

    /// Stretch `input` into `output`
    ///
    /// The stretch ratio is implied by the length difference:
    /// more input than output speeds up, less input slows down.
    pub fn process(&mut self, input: &[StereoSample], output: &mut [StereoSample]) {
        let output_interleaved: &mut [f32] = bytemuck::cast_slice_mut(output);
        output_interleaved.fill(0.0);

        if input.is_empty() {
            return;
        }

        let input_interleaved: &[f32] = bytemuck::cast_slice(input);
        self.stretcher.process(input_interleaved, output_interleaved);
    }
}

impl Default for TimeStretcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_stretcher_creation() {
        let stretcher = TimeStretcher::new();
        assert_eq!(stretcher.pitch_semitones(), 0.0);
        assert!(stretcher.total_latency() > 0);
    }

    #[test]
    fn test_pitch_clamped_to_octave() {
        let mut stretcher = TimeStretcher::new();
        stretcher.set_pitch_semitones(30.0);
        assert_eq!(stretcher.pitch_semitones(), 12.0);
        stretcher.set_pitch_semitones(0.0);
        assert_eq!(stretcher.pitch_semitones(), 0.0);
    }

    #[test]
    fn test_process_fills_requested_output() {
        let mut stretcher = TimeStretcher::new();
        let input = vec![StereoSample::mono(0.25); 768];
        let mut output = vec![StereoSample::mono(9.0); 512];

        stretcher.process(&input, &mut output);

        assert_eq!(output.len(), 512);
        assert!(output.iter().all(|s| s.left.is_finite() && s.right.is_finite()));
    }

    #[test]
    fn test_empty_input_yields_silence() {
        let mut stretcher = TimeStretcher::new();
        let mut output = vec![StereoSample::mono(1.0); 64];
        stretcher.process(&[], &mut output);
        assert!(output.iter().all(|s| s.is_silent()));
    }
}
