//! Textual control protocol
//!
//! Hosts drive the engine with JSON objects tagged by `"type"`:
//!
//! ```json
//! {"type": "loadTrack", "url": "file:///music/a.flac"}
//! {"type": "seek", "positionMs": 1500}
//! {"type": "setVarispeed", "speed": 1.5, "isNatural": false}
//! {"type": "setReverbConfig", "roomSize": 0.8, "damp": 0.3}
//! ```

use serde::{Deserialize, Serialize};

use crate::engine::ReverbConfigPatch;

/// One control message from the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ControlMessage {
    LoadTrack { url: String },
    Play,
    Stop,
    Seek { position_ms: f64 },
    SetVarispeed { speed: f64, is_natural: bool },
    SetReverbEnabled { enabled: bool },
    SetReverbMix { mix: f32 },
    SetReverbConfig(ReverbConfigPatch),
    SetLooping { enabled: bool },
}

impl ControlMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
