//! Engine configuration

use serde::{Deserialize, Serialize};

use crate::engine::ReverbConfig;
use crate::types::{QUANTUM_FRAMES, SAMPLE_RATE};

/// Progress reports every 32 callbacks: about 85ms at 128 frames / 48kHz
pub const DEFAULT_PROGRESS_INTERVAL: u32 = 32;

/// Settings for the playback engine and its output stream
///
/// Every field has a default, so a partial YAML file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Requested output sample rate (the device may choose another)
    pub sample_rate: u32,
    /// Requested frames per callback
    pub buffer_size: u32,
    /// Audible callbacks between two progress events
    pub progress_interval_callbacks: u32,
    /// Loop tracks by default
    pub looping: bool,
    /// Initial reverb settings
    pub reverb: ReverbConfig,
    /// Output device name; the host default when absent
    pub output_device: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            buffer_size: QUANTUM_FRAMES as u32,
            progress_interval_callbacks: DEFAULT_PROGRESS_INTERVAL,
            looping: true,
            reverb: ReverbConfig::default(),
            output_device: None,
        }
    }
}
