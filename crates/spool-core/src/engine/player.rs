//! Single-track player
//!
//! Reads a decoded asset at a variable rate into the callback's working
//! buffer. Two varispeed modes are supported:
//!
//! - **Natural**: a linear-interpolated read at `rate` times the asset's
//!   speed. Pitch follows rate, like a turntable.
//! - **Time-stretch**: `round(n * rate)` source frames are read at unity
//!   speed and the stretcher fits them into `n` output frames, keeping
//!   pitch unchanged.
//!
//! Position wraps at the end of an installed loop window, and at the end
//! of the asset regardless of looping. A wrap at end-of-asset raises a
//! latch that the end-of-track check consumes, so a non-looping track is
//! still detected as ended after it has silently wrapped.

use basedrop::Shared;
use thiserror::Error;

use crate::loader::DecodedAsset;
use crate::timestretch::TimeStretcher;
use crate::types::{StereoBuffer, StereoSample, MAX_QUANTUM_FRAMES};

/// Slowest supported playback rate
pub const MIN_RATE: f64 = 0.25;
/// Fastest supported playback rate
pub const MAX_RATE: f64 = 4.0;

/// Errors installing a loop window
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum LoopError {
    #[error("no asset is loaded")]
    NoAsset,

    #[error("loop window is empty: start={start_ms}ms, end={end_ms}ms")]
    EmptyWindow { start_ms: f64, end_ms: f64 },

    #[error("loop end {end_ms}ms is past the end of the asset ({asset_ms}ms)")]
    PastEnd { end_ms: f64, asset_ms: f64 },
}

/// Loop window in asset frames
#[derive(Debug, Clone, Copy, PartialEq)]
struct LoopWindow {
    start: f64,
    end: f64,
}

/// Read position plus the state that moves with it
#[derive(Debug, Default)]
struct Cursor {
    /// Fractional position in asset frames
    position: f64,
    loop_window: Option<LoopWindow>,
    wrapped_at_eof: bool,
}

impl Cursor {
    #[inline]
    fn advance(&mut self, step: f64, asset_len: f64) {
        self.position += step;

        if let Some(window) = self.loop_window {
            if self.position >= window.end {
                let span = window.end - window.start;
                self.position = window.start + (self.position - window.end) % span;
            }
        }

        if self.position >= asset_len {
            self.position %= asset_len;
            self.wrapped_at_eof = true;
        }
    }

    /// Linear-interpolated read of `out.len()` frames at `step` frames per output frame
    fn read(&mut self, frames: &[StereoSample], step: f64, out: &mut [StereoSample]) {
        let len = frames.len();
        let asset_len = len as f64;
        for dst in out.iter_mut() {
            let index = (self.position as usize).min(len - 1);
            let frac = (self.position - index as f64) as f32;
            let a = frames[index];
            let b = if index + 1 < len { frames[index + 1] } else { a };
            *dst = a.lerp(&b, frac);
            self.advance(step, asset_len);
        }
    }
}

/// Effective duration of an asset in seconds
///
/// Trusts the container's reported duration when positive. Otherwise the
/// raw size metadata is ambiguous (it may count frames or interleaved
/// samples), so both `size / rate` and `size / 2 / rate` are considered;
/// candidates of one second or less are discarded and the larger survivor
/// wins. Returns 0.0 when nothing plausible remains.
pub fn resolve_duration(asset: &DecodedAsset) -> f64 {
    if let Some(reported) = asset.reported_duration() {
        if reported > 0.0 {
            return reported;
        }
    }

    let rate = asset.sample_rate() as f64;
    if rate <= 0.0 {
        return 0.0;
    }

    let size = asset.size_in_samples() as f64;
    [size / rate, size / 2.0 / rate]
        .into_iter()
        .filter(|candidate| *candidate > 1.0)
        .fold(0.0, f64::max)
}

/// Variable-rate player for one decoded asset
pub struct Player {
    asset: Option<Shared<DecodedAsset>>,
    output_rate: u32,
    cursor: Cursor,
    playing: bool,
    rate: f64,
    time_stretch: bool,
    stretcher: TimeStretcher,
    /// Source frames gathered for the stretcher (preallocated)
    stretch_input: StereoBuffer,
}

impl Player {
    pub fn new(output_rate: u32) -> Self {
        Self {
            asset: None,
            output_rate,
            cursor: Cursor::default(),
            playing: false,
            rate: 1.0,
            time_stretch: false,
            stretcher: TimeStretcher::new_with_sample_rate(output_rate),
            stretch_input: StereoBuffer::silence(MAX_QUANTUM_FRAMES * MAX_RATE as usize),
        }
    }

    /// Replace the current asset; the old one is released through the collector
    pub fn open(&mut self, asset: Shared<DecodedAsset>) {
        self.asset = Some(asset);
        self.cursor = Cursor::default();
        self.playing = false;
        self.stretcher.reset();
    }

    pub fn unload(&mut self) {
        self.asset = None;
        self.cursor = Cursor::default();
        self.playing = false;
    }

    pub fn play(&mut self) {
        self.playing = self.asset.is_some();
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Move to `position_ms`, clamped to the asset
    pub fn seek_ms(&mut self, position_ms: f64) {
        let Some(asset) = self.asset.as_ref() else {
            return;
        };
        let frame = position_ms.max(0.0) * asset.sample_rate() as f64 / 1000.0;
        self.cursor.position = frame.min(asset.len_frames() as f64);
        self.cursor.wrapped_at_eof = false;
        self.stretcher.reset();
    }

    /// Current position in seconds
    pub fn position_seconds(&self) -> f64 {
        match self.asset.as_ref() {
            Some(asset) if asset.sample_rate() > 0 => {
                self.cursor.position / asset.sample_rate() as f64
            }
            _ => 0.0,
        }
    }

    /// Length of the decoded audio in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.asset.as_ref().map_or(0.0, |a| a.frames_duration())
    }

    /// Set the playback rate, clamped to `[MIN_RATE, MAX_RATE]`
    ///
    /// Non-finite rates are ignored and the previous rate is kept.
    pub fn set_rate(&mut self, rate: f64) {
        if rate.is_finite() {
            self.rate = rate.clamp(MIN_RATE, MAX_RATE);
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn set_time_stretch(&mut self, enabled: bool) {
        if self.time_stretch != enabled {
            self.time_stretch = enabled;
            self.stretcher.reset();
        }
    }

    pub fn time_stretch_enabled(&self) -> bool {
        self.time_stretch
    }

    pub fn set_pitch_shift(&mut self, semitones: f64) {
        self.stretcher.set_pitch_semitones(semitones);
    }

    pub fn pitch_shift_semitones(&self) -> f64 {
        self.stretcher.pitch_semitones()
    }

    /// Install a loop window in milliseconds
    pub fn install_loop(&mut self, start_ms: f64, end_ms: f64) -> Result<(), LoopError> {
        let asset = self.asset.as_ref().ok_or(LoopError::NoAsset)?;

        if start_ms < 0.0 || end_ms <= start_ms {
            return Err(LoopError::EmptyWindow { start_ms, end_ms });
        }

        let rate = asset.sample_rate() as f64;
        let len = asset.len_frames() as f64;
        let end = end_ms * rate / 1000.0;
        if end > len {
            return Err(LoopError::PastEnd {
                end_ms,
                asset_ms: len / rate * 1000.0,
            });
        }

        let start = start_ms * rate / 1000.0;
        if end - start < 1.0 {
            return Err(LoopError::EmptyWindow { start_ms, end_ms });
        }

        self.cursor.loop_window = Some(LoopWindow { start, end });
        Ok(())
    }

    pub fn clear_loop(&mut self) {
        self.cursor.loop_window = None;
    }

    pub fn has_loop(&self) -> bool {
        self.cursor.loop_window.is_some()
    }

    /// Whether position wrapped at end-of-asset since the last call
    pub fn take_wrapped_at_eof(&mut self) -> bool {
        std::mem::take(&mut self.cursor.wrapped_at_eof)
    }

    /// Render into `out`, scaled by `gain`
    ///
    /// Returns false (leaving `out` untouched) when nothing is playing.
    pub fn render(&mut self, out: &mut [StereoSample], gain: f32) -> bool {
        if !self.playing || out.is_empty() || self.output_rate == 0 {
            return false;
        }
        let Some(asset) = self.asset.as_ref() else {
            return false;
        };
        let frames = asset.frames();
        if frames.is_empty() {
            return false;
        }

        let base_step = asset.sample_rate() as f64 / self.output_rate as f64;

        if self.time_stretch {
            let wanted = ((out.len() as f64 * self.rate).round() as usize)
                .clamp(1, self.stretch_input.capacity());
            self.stretch_input.set_len_from_capacity(wanted);
            self.cursor
                .read(frames, base_step, self.stretch_input.as_mut_slice());
            self.stretcher.process(self.stretch_input.as_slice(), out);
        } else {
            self.cursor.read(frames, base_step * self.rate, out);
        }

        for sample in out.iter_mut() {
            *sample = *sample * gain;
        }
        true
    }
}
