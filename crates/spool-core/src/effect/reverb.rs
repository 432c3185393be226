//! Stereo Reverb primitive
//!
//! A Freeverb-style algorithmic reverb:
//! - One-pole low-cut and predelay on the (mono) reverb input
//! - Parallel comb filters for the decay
//! - Series all-pass filters for diffusion
//!
//! All delay memory is allocated in [`ReverbEffect::new`]; parameter
//! setters and [`ReverbEffect::process`] never allocate.

use thiserror::Error;

use crate::types::StereoSample;

/// Comb filter delay line lengths (in samples at 44.1kHz)
const COMB_LENGTHS: [usize; 8] = [1557, 1617, 1491, 1422, 1277, 1356, 1188, 1116];

/// Allpass filter delay line lengths (in samples at 44.1kHz)
const ALLPASS_LENGTHS: [usize; 4] = [225, 556, 441, 341];

/// Stereo spread offset for the right channel (in samples at 44.1kHz)
const STEREO_SPREAD: usize = 23;

/// Longest predelay the preallocated line can hold
pub const MAX_PREDELAY_MS: f32 = 500.0;

const ALLPASS_FEEDBACK: f32 = 0.5;

/// Gain compensation for comb filter summing
const COMB_GAIN: f32 = 0.2;

/// Errors reported by [`ReverbEffect::process`]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReverbError {
    /// No usable sample rate has been configured
    #[error("reverb is not ready (sample rate is zero)")]
    NotReady,

    /// Input and output buffers differ in length
    #[error("reverb buffer length mismatch: input={input}, output={output}")]
    LengthMismatch { input: usize, output: usize },
}

fn scaled_len(length: usize, sample_rate: u32) -> usize {
    ((length as f32 * sample_rate as f32 / 44100.0) as usize).max(1)
}

struct CombFilter {
    buffer: Vec<f32>,
    pos: usize,
    filter_state: f32,
}

impl CombFilter {
    fn new(length: usize) -> Self {
        Self {
            buffer: vec![0.0; length],
            pos: 0,
            filter_state: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32, feedback: f32, damp: f32) -> f32 {
        let output = self.buffer[self.pos];

        // One-pole lowpass in the feedback path damps the highs
        self.filter_state = output * (1.0 - damp) + self.filter_state * damp;

        self.buffer[self.pos] = input + self.filter_state * feedback;
        self.pos = (self.pos + 1) % self.buffer.len();

        output
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.filter_state = 0.0;
    }
}

struct AllpassFilter {
    buffer: Vec<f32>,
    pos: usize,
}

impl AllpassFilter {
    fn new(length: usize) -> Self {
        Self {
            buffer: vec![0.0; length],
            pos: 0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32, feedback: f32) -> f32 {
        let buffered = self.buffer[self.pos];
        let output = -input + buffered;
        self.buffer[self.pos] = input + buffered * feedback;
        self.pos = (self.pos + 1) % self.buffer.len();
        output
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
    }
}

/// Mono delay line in front of the tank
struct PredelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
    delay_samples: usize,
}

impl PredelayLine {
    fn new(max_samples: usize) -> Self {
        Self {
            buffer: vec![0.0; max_samples.max(1)],
            write_pos: 0,
            delay_samples: 0,
        }
    }

    fn set_delay_samples(&mut self, samples: usize) {
        self.delay_samples = samples.min(self.buffer.len() - 1);
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        if self.delay_samples == 0 {
            return input;
        }
        let len = self.buffer.len();
        let read_pos = (self.write_pos + len - self.delay_samples) % len;
        let out = self.buffer[read_pos];
        self.buffer[self.write_pos] = input;
        self.write_pos = (self.write_pos + 1) % len;
        out
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

/// One-pole high-pass keeping low rumble out of the tank
struct LowCut {
    coeff: f32,
    prev_in: f32,
    prev_out: f32,
    enabled: bool,
}

impl LowCut {
    fn new() -> Self {
        Self {
            coeff: 0.0,
            prev_in: 0.0,
            prev_out: 0.0,
            enabled: false,
        }
    }

    fn set_cutoff(&mut self, cutoff_hz: f32, sample_rate: u32) {
        self.enabled = cutoff_hz > 0.0 && sample_rate > 0;
        if self.enabled {
            let nyquist = sample_rate as f32 * 0.5;
            let fc = cutoff_hz.min(nyquist * 0.99);
            self.coeff = (-2.0 * std::f32::consts::PI * fc / sample_rate as f32).exp();
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        if !self.enabled {
            return input;
        }
        let out = self.coeff * (self.prev_out + input - self.prev_in);
        self.prev_in = input;
        self.prev_out = out;
        out
    }

    fn reset(&mut self) {
        self.prev_in = 0.0;
        self.prev_out = 0.0;
    }
}

/// Freeverb-style stereo reverb
///
/// Parameters (all clamped on set):
/// - Room size: decay time (0.0-1.0)
/// - Damp: high frequency damping (0.0 = bright, 1.0 = dark)
/// - Width: stereo width (0.0 = mono, 1.0 = full stereo)
/// - Mix: internal dry/wet balance (1.0 = fully wet)
/// - Predelay: 0..=[`MAX_PREDELAY_MS`] ms
/// - Low cut: high-pass corner on the reverb input in Hz (0 = off)
pub struct ReverbEffect {
    sample_rate: u32,
    combs_l: Vec<CombFilter>,
    combs_r: Vec<CombFilter>,
    allpass_l: Vec<AllpassFilter>,
    allpass_r: Vec<AllpassFilter>,
    predelay: PredelayLine,
    low_cut: LowCut,
    room_size: f32,
    damp: f32,
    width: f32,
    mix: f32,
    predelay_ms: f32,
    low_cut_hz: f32,
}

impl ReverbEffect {
    pub fn new(sample_rate: u32) -> Self {
        let combs_l = COMB_LENGTHS
            .iter()
            .map(|&len| CombFilter::new(scaled_len(len, sample_rate)))
            .collect();
        let combs_r = COMB_LENGTHS
            .iter()
            .map(|&len| CombFilter::new(scaled_len(len + STEREO_SPREAD, sample_rate)))
            .collect();
        let allpass_l = ALLPASS_LENGTHS
            .iter()
            .map(|&len| AllpassFilter::new(scaled_len(len, sample_rate)))
            .collect();
        let allpass_r = ALLPASS_LENGTHS
            .iter()
            .map(|&len| AllpassFilter::new(scaled_len(len + STEREO_SPREAD, sample_rate)))
            .collect();

        let max_predelay = (MAX_PREDELAY_MS / 1000.0 * sample_rate as f32) as usize + 1;

        Self {
            sample_rate,
            combs_l,
            combs_r,
            allpass_l,
            allpass_r,
            predelay: PredelayLine::new(max_predelay),
            low_cut: LowCut::new(),
            room_size: 0.5,
            damp: 0.5,
            width: 1.0,
            mix: 1.0,
            predelay_ms: 0.0,
            low_cut_hz: 0.0,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn set_room_size(&mut self, room_size: f32) {
        self.room_size = room_size.clamp(0.0, 1.0);
    }

    pub fn room_size(&self) -> f32 {
        self.room_size
    }

    pub fn set_damp(&mut self, damp: f32) {
        self.damp = damp.clamp(0.0, 1.0);
    }

    pub fn damp(&self) -> f32 {
        self.damp
    }

    pub fn set_width(&mut self, width: f32) {
        self.width = width.clamp(0.0, 1.0);
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn set_mix(&mut self, mix: f32) {
        self.mix = mix.clamp(0.0, 1.0);
    }

    pub fn mix(&self) -> f32 {
        self.mix
    }

    pub fn set_predelay_ms(&mut self, predelay_ms: f32) {
        self.predelay_ms = predelay_ms.clamp(0.0, MAX_PREDELAY_MS);
        let samples = (self.predelay_ms / 1000.0 * self.sample_rate as f32) as usize;
        self.predelay.set_delay_samples(samples);
    }

    pub fn predelay_ms(&self) -> f32 {
        self.predelay_ms
    }

    pub fn set_low_cut_hz(&mut self, low_cut_hz: f32) {
        self.low_cut_hz = low_cut_hz.max(0.0);
        self.low_cut.set_cutoff(self.low_cut_hz, self.sample_rate);
    }

    pub fn low_cut_hz(&self) -> f32 {
        self.low_cut_hz
    }

    /// Comb feedback derived from room size (0.7-0.98)
    fn feedback(&self) -> f32 {
        0.7 + self.room_size * 0.28
    }

    /// Process `input` into `output`
    ///
    /// Output is `wet * mix + input * (1 - mix)`, so at mix 1.0 it holds
    /// only the processed signal.
    pub fn process(
        &mut self,
        input: &[StereoSample],
        output: &mut [StereoSample],
    ) -> Result<(), ReverbError> {
        if self.sample_rate == 0 {
            return Err(ReverbError::NotReady);
        }
        if input.len() != output.len() {
            return Err(ReverbError::LengthMismatch {
                input: input.len(),
                output: output.len(),
            });
        }

        let feedback = self.feedback();
        let damp = self.damp;
        let wet = self.mix;
        let dry = 1.0 - wet;

        let wet1 = wet * (self.width / 2.0 + 0.5);
        let wet2 = wet * ((1.0 - self.width) / 2.0);

        for (src, dst) in input.iter().zip(output.iter_mut()) {
            let mono = (src.left + src.right) * 0.5;
            let tank_in = self.predelay.process(self.low_cut.process(mono));

            let mut out_l = 0.0f32;
            let mut out_r = 0.0f32;
            for comb in &mut self.combs_l {
                out_l += comb.process(tank_in, feedback, damp);
            }
            for comb in &mut self.combs_r {
                out_r += comb.process(tank_in, feedback, damp);
            }
            out_l *= COMB_GAIN;
            out_r *= COMB_GAIN;

            for ap in &mut self.allpass_l {
                out_l = ap.process(out_l, ALLPASS_FEEDBACK);
            }
            for ap in &mut self.allpass_r {
                out_r = ap.process(out_r, ALLPASS_FEEDBACK);
            }

            dst.left = out_l * wet1 + out_r * wet2 + src.left * dry;
            dst.right = out_r * wet1 + out_l * wet2 + src.right * dry;
        }

        Ok(())
    }

    /// Clear all delay memory
    pub fn reset(&mut self) {
        self.combs_l.iter_mut().for_each(CombFilter::reset);
        self.combs_r.iter_mut().for_each(CombFilter::reset);
        self.allpass_l.iter_mut().for_each(AllpassFilter::reset);
        self.allpass_r.iter_mut().for_each(AllpassFilter::reset);
        self.predelay.reset();
        self.low_cut.reset();
    }
}
