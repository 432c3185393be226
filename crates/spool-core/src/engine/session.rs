//! Playback session - the engine's lifecycle state
//!
//! Three booleans (`loaded`, `ended`, `playing`) carry the whole state
//! machine:
//!
//! ```text
//! Idle ──load──► Loading ──decoded──► Playing ◄──play──► Paused
//!                                        │                  ▲
//!                                  end (no loop)          seek
//!                                        ▼                  │
//!                                      Ended ──play──► Playing
//! ```
//!
//! Every mutator keeps `playing => loaded && !ended`.

use serde::{Deserialize, Serialize};

/// Controller-issued token identifying one load request
///
/// Tokens increase monotonically, so two loads of the same URL still
/// compare unequal and a late completion for the older one is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackId(pub u64);

/// Explicit view of the lifecycle derived from the session booleans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Nothing requested yet
    #[default]
    Idle,
    /// Waiting for the decoder
    Loading,
    Playing,
    Paused,
    /// Reached the end of a non-looping track
    Ended,
}

/// Mutable engine state, owned by the audio thread
#[derive(Debug, Clone)]
pub struct PlaybackSession {
    track_id: Option<TrackId>,
    loaded: bool,
    ended: bool,
    playing: bool,
    duration_seconds: f64,
    playback_rate: f64,
    varispeed_natural: bool,
    looping: bool,
}

impl PlaybackSession {
    pub fn new() -> Self {
        Self {
            track_id: None,
            loaded: false,
            ended: false,
            playing: false,
            duration_seconds: 0.0,
            playback_rate: 1.0,
            varispeed_natural: true,
            looping: true,
        }
    }

    /// Start a new load; any previous asset is forgotten
    pub fn begin_load(&mut self, track: TrackId) {
        self.track_id = Some(track);
        self.loaded = false;
        self.ended = false;
        self.playing = false;
        self.duration_seconds = 0.0;
    }

    /// Whether a decode completion belongs to the current load
    pub fn is_current(&self, track: TrackId) -> bool {
        self.track_id == Some(track)
    }

    /// Decode finished: loaded and playing straight away
    pub fn complete_load(&mut self, duration_seconds: f64) {
        self.loaded = true;
        self.ended = false;
        self.playing = true;
        self.duration_seconds = duration_seconds;
    }

    /// Enter the playing state; no-op (returns false) when nothing is loaded
    pub fn start(&mut self) -> bool {
        if !self.loaded {
            return false;
        }
        self.ended = false;
        self.playing = true;
        true
    }

    pub fn stop(&mut self) {
        self.playing = false;
    }

    pub fn clear_ended(&mut self) {
        self.ended = false;
    }

    pub fn mark_ended(&mut self) {
        self.ended = true;
        self.playing = false;
    }

    pub fn set_varispeed(&mut self, rate: f64, natural: bool) {
        self.playback_rate = rate;
        self.varispeed_natural = natural;
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// True when the callback must emit silence
    #[inline]
    pub fn is_silent(&self) -> bool {
        !self.loaded || self.ended || !self.playing
    }

    pub fn state(&self) -> PlaybackState {
        match (self.track_id, self.loaded, self.ended, self.playing) {
            (None, _, _, _) => PlaybackState::Idle,
            (Some(_), false, _, _) => PlaybackState::Loading,
            (Some(_), true, true, _) => PlaybackState::Ended,
            (Some(_), true, false, true) => PlaybackState::Playing,
            (Some(_), true, false, false) => PlaybackState::Paused,
        }
    }

    pub fn track_id(&self) -> Option<TrackId> {
        self.track_id
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    pub fn playback_rate(&self) -> f64 {
        self.playback_rate
    }

    pub fn is_varispeed_natural(&self) -> bool {
        self.varispeed_natural
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self::new()
    }
}
