//! Reverb send on the dry bus
//!
//! Wraps [`ReverbEffect`] with the engine's wet/dry law. The primitive is
//! always run fully wet; the unit then subtracts whatever dry bleed the
//! primitive would have contributed at the configured mix and adds the
//! scaled remainder on top of the already-mixed dry signal:
//!
//! ```text
//! dest += (out - (1 - mix) * in) * mix
//! ```

use serde::{Deserialize, Serialize};

use crate::effect::{ReverbEffect, ReverbError};
use crate::types::StereoSample;

/// Reverb settings
///
/// Serialised with camelCase keys, both in the YAML config and in
/// `setReverbConfig` control messages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReverbConfig {
    pub enabled: bool,
    /// Wet amount (0.0-1.0)
    pub mix: f32,
    pub room_size: f32,
    pub damp: f32,
    pub width: f32,
    pub predelay_ms: f32,
    /// High-pass on the reverb input, 0 disables it
    pub low_cut_hz: f32,
}

impl Default for ReverbConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mix: 0.0,
            room_size: 0.8,
            damp: 0.5,
            width: 1.0,
            predelay_ms: 0.0,
            low_cut_hz: 0.0,
        }
    }
}

/// Partial update merged into a [`ReverbConfig`]; absent fields keep their value
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReverbConfigPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mix: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_size: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub damp: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predelay_ms: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_cut_hz: Option<f32>,
}

impl ReverbConfig {
    /// Merge `patch` into this config
    pub fn merge(&mut self, patch: &ReverbConfigPatch) {
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        if let Some(mix) = patch.mix {
            self.mix = mix.clamp(0.0, 1.0);
        }
        if let Some(room_size) = patch.room_size {
            self.room_size = room_size;
        }
        if let Some(damp) = patch.damp {
            self.damp = damp;
        }
        if let Some(width) = patch.width {
            self.width = width;
        }
        if let Some(predelay_ms) = patch.predelay_ms {
            self.predelay_ms = predelay_ms;
        }
        if let Some(low_cut_hz) = patch.low_cut_hz {
            self.low_cut_hz = low_cut_hz;
        }
    }
}

/// Reverb send applied after the dry mix
pub struct ReverbUnit {
    effect: ReverbEffect,
    config: ReverbConfig,
}

impl ReverbUnit {
    pub fn new(sample_rate: u32, config: ReverbConfig) -> Self {
        let mut unit = Self {
            effect: ReverbEffect::new(sample_rate),
            config: ReverbConfig::default(),
        };
        unit.apply_config(config);
        unit
    }

    pub fn config(&self) -> &ReverbConfig {
        &self.config
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
    }

    /// Set wet amount; enables the unit exactly when `mix > 0`
    ///
    /// Non-finite values are ignored.
    pub fn set_mix(&mut self, mix: f32) {
        if !mix.is_finite() {
            return;
        }
        self.config.mix = mix.clamp(0.0, 1.0);
        self.config.enabled = self.config.mix > 0.0;
        self.effect.set_mix(self.config.mix);
    }

    pub fn apply_patch(&mut self, patch: &ReverbConfigPatch) {
        let mut config = self.config;
        config.merge(patch);
        self.apply_config(config);
    }

    fn apply_config(&mut self, config: ReverbConfig) {
        self.effect.set_room_size(config.room_size);
        self.effect.set_damp(config.damp);
        self.effect.set_width(config.width);
        self.effect.set_predelay_ms(config.predelay_ms);
        self.effect.set_low_cut_hz(config.low_cut_hz);

        // Keep the stored values in the ranges the primitive accepted
        self.config = ReverbConfig {
            enabled: config.enabled,
            mix: config.mix.clamp(0.0, 1.0),
            room_size: self.effect.room_size(),
            damp: self.effect.damp(),
            width: self.effect.width(),
            predelay_ms: self.effect.predelay_ms(),
            low_cut_hz: self.effect.low_cut_hz(),
        };
        self.effect.set_mix(self.config.mix);
    }

    /// Whether the send contributes anything this callback
    #[inline]
    pub fn is_active(&self) -> bool {
        self.config.enabled && self.config.mix > 0.0
    }

    /// Add the wet signal for `dry` into `dest`
    ///
    /// `wet_in` and `wet_out` are scratch buffers of the same length as
    /// `dry`. On error nothing is added and `dest` keeps the dry mix.
    pub fn process(
        &mut self,
        dry: &[StereoSample],
        wet_in: &mut [StereoSample],
        wet_out: &mut [StereoSample],
        dest: &mut [StereoSample],
    ) -> Result<(), ReverbError> {
        if !self.is_active() {
            return Ok(());
        }

        let mix = self.config.mix;
        let n = dry
            .len()
            .min(wet_in.len())
            .min(wet_out.len())
            .min(dest.len());
        let wet_in = &mut wet_in[..n];
        let wet_out = &mut wet_out[..n];
        wet_in.copy_from_slice(&dry[..n]);

        self.effect.set_mix(1.0);
        let result = self.effect.process(wet_in, wet_out);
        self.effect.set_mix(mix);
        result?;

        let bleed = 1.0 - mix;
        for ((d, out), input) in dest[..n].iter_mut().zip(wet_out.iter()).zip(wet_in.iter()) {
            *d += (*out - *input * bleed) * mix;
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        self.effect.reset();
    }
}
