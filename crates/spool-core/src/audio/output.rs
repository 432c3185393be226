//! cpal output stream driving the playback engine
//!
//! ```text
//! ┌──────────────────┐   commands (rtrb)   ┌─────────────────────┐
//! │ Control thread   │────────────────────►│  cpal audio thread  │
//! │ (Controller)     │◄────────────────────│  (owns the engine)  │
//! └──────────────────┘    events (rtrb)    └─────────────────────┘
//! ```
//!
//! The engine is moved into the stream callback; nothing is shared with
//! the control thread except the two queues and the atomics.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, Stream, StreamConfig};

use super::device::{default_output_device, find_output_device};
use super::error::{AudioError, AudioResult};
use crate::config::EngineConfig;
use crate::control::{create_engine, Controller};
use crate::engine::PlaybackEngine;
use crate::loader::AssetDecoder;
use crate::types::MAX_QUANTUM_FRAMES;

/// Smallest and largest callback sizes we ask the device for
const MIN_BUFFER_FRAMES: u32 = 32;
const MAX_BUFFER_FRAMES: u32 = MAX_QUANTUM_FRAMES as u32;

/// Keeps the output stream alive; drop it to stop audio
pub struct OutputHandle {
    _stream: Stream,
    sample_rate: u32,
    buffer_size: u32,
    channels: u16,
}

impl OutputHandle {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// One-way output latency in milliseconds
    pub fn latency_ms(&self) -> f32 {
        (self.buffer_size as f32 / self.sample_rate as f32) * 1000.0
    }
}

/// Open the configured output device and start playing through a new engine
///
/// The engine is built at the sample rate the device actually accepted.
/// Returns the controller for the new engine alongside the stream handle.
pub fn start_output<D: AssetDecoder>(
    config: &EngineConfig,
    decoder: D,
) -> AudioResult<(Controller, OutputHandle)> {
    let device = match &config.output_device {
        Some(name) => find_output_device(name)?,
        None => default_output_device()?,
    };
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using audio device: {}", device_name);

    let supported = get_output_config(&device, config.sample_rate)?;
    let sample_rate = supported.sample_rate().0;
    let buffer_size = config.buffer_size.clamp(MIN_BUFFER_FRAMES, MAX_BUFFER_FRAMES);

    let stream_config = StreamConfig {
        channels: supported.channels(),
        sample_rate: supported.sample_rate(),
        buffer_size: BufferSize::Fixed(buffer_size),
    };

    log::info!(
        "Audio config: {} channels, {}Hz, {} frames (~{:.1}ms latency)",
        stream_config.channels,
        sample_rate,
        buffer_size,
        buffer_size as f32 / sample_rate as f32 * 1000.0
    );

    let (controller, engine) = create_engine(config, sample_rate, decoder);
    let stream = build_output_stream(&device, &stream_config, engine)?;
    stream
        .play()
        .map_err(|e| AudioError::StreamPlay(e.to_string()))?;

    log::info!("Audio stream started");

    let handle = OutputHandle {
        _stream: stream,
        sample_rate,
        buffer_size,
        channels: stream_config.channels,
    };
    Ok((controller, handle))
}

/// Pick an f32 config, preferring stereo and the requested sample rate
fn get_output_config(
    device: &cpal::Device,
    target_sample_rate: u32,
) -> AudioResult<cpal::SupportedStreamConfig> {
    let supported_configs: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigQuery(e.to_string()))?
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .collect();

    let in_range = |c: &&cpal::SupportedStreamConfigRange| {
        target_sample_rate >= c.min_sample_rate().0 && target_sample_rate <= c.max_sample_rate().0
    };

    let best = supported_configs
        .iter()
        .filter(|c| c.channels() >= 2)
        .find(in_range)
        .or_else(|| supported_configs.iter().find(in_range))
        .or_else(|| supported_configs.iter().find(|c| c.channels() >= 2))
        .or_else(|| supported_configs.first())
        .ok_or(AudioError::NoFloatConfig)?;

    let sample_rate = if in_range(&best) {
        cpal::SampleRate(target_sample_rate)
    } else {
        let fallback = best.max_sample_rate();
        log::warn!(
            "Audio device doesn't support {}Hz, using {}Hz",
            target_sample_rate,
            fallback.0
        );
        fallback
    };

    Ok(best.clone().with_sample_rate(sample_rate))
}

/// Audio-thread state moved into the stream callback
struct CallbackState {
    engine: PlaybackEngine,
    /// Interleaved stereo scratch, preallocated for the largest callback
    stereo: Vec<f32>,
    channels: usize,
}

impl CallbackState {
    fn new(engine: PlaybackEngine, channels: usize) -> Self {
        Self {
            engine,
            stereo: vec![0.0; MAX_QUANTUM_FRAMES * 2],
            channels,
        }
    }

    fn process(&mut self, data: &mut [f32]) {
        if self.channels == 2 {
            self.engine.process(data);
            return;
        }

        let n_frames = data.len() / self.channels.max(1);
        let mut written = 0;
        // Larger callbacks than the scratch buffer are rendered in slices
        while written < n_frames {
            let frames = (n_frames - written).min(MAX_QUANTUM_FRAMES);
            let stereo = &mut self.stereo[..frames * 2];
            self.engine.process(stereo);

            let start = written * self.channels;
            let device = &mut data[start..start + frames * self.channels];
            fold_to_channels(stereo, device, self.channels);
            written += frames;
        }
        data[n_frames * self.channels..].fill(0.0);
    }
}

/// Copy interleaved stereo into a `channels`-wide device buffer
///
/// Mono devices get the average of both sides; channels past the second
/// are silent.
fn fold_to_channels(stereo: &[f32], device: &mut [f32], channels: usize) {
    for (src, dst) in stereo.chunks_exact(2).zip(device.chunks_exact_mut(channels)) {
        if channels == 1 {
            dst[0] = (src[0] + src[1]) * 0.5;
            continue;
        }
        dst[0] = src[0];
        dst[1] = src[1];
        dst[2..].fill(0.0);
    }
}

fn build_output_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    engine: PlaybackEngine,
) -> AudioResult<Stream> {
    let mut state = CallbackState::new(engine, config.channels as usize);

    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                state.process(data);
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuild(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{command_channel, event_channel};

    #[test]
    fn test_fold_to_mono_averages() {
        let stereo = [1.0, 0.0, 0.5, 0.5];
        let mut device = [9.0; 2];
        fold_to_channels(&stereo, &mut device, 1);
        assert_eq!(device, [0.5, 0.5]);
    }

    #[test]
    fn test_fold_to_surround_silences_extra_channels() {
        let stereo = [0.1, 0.2, 0.3, 0.4];
        let mut device = [9.0; 8];
        fold_to_channels(&stereo, &mut device, 4);
        assert_eq!(device, [0.1, 0.2, 0.0, 0.0, 0.3, 0.4, 0.0, 0.0]);
    }

    #[test]
    fn test_callback_zeroes_non_stereo_device_when_idle() {
        let (_cmd_tx, cmd_rx) = command_channel();
        let (evt_tx, _evt_rx) = event_channel();
        let engine = PlaybackEngine::new(&EngineConfig::default(), 48000, cmd_rx, evt_tx);
        let mut state = CallbackState::new(engine, 6);

        let mut data = vec![1.0f32; 6 * 100 + 3];
        state.process(&mut data);
        assert!(data.iter().all(|s| *s == 0.0));
    }
}
