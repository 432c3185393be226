//! Lock-free command queue from the control thread to the audio thread
//!
//! The control side pushes [`EngineCommand`]s into an `rtrb` ring buffer
//! and the engine drains the whole queue at the start of every callback,
//! so each command is applied strictly between two renders. Pushing and
//! popping are wait-free and never allocate.
//!
//! ```ignore
//! let (tx, rx) = command_channel();
//! let mut sender = CommandSender::new(tx);
//! sender.send(EngineCommand::Play)?;
//! ```

use basedrop::Shared;

use super::reverb_unit::ReverbConfigPatch;
use super::session::TrackId;
use crate::loader::DecodedAsset;

/// Commands applied by the engine at the start of a callback
pub enum EngineCommand {
    /// A new track was requested; forget the current one and wait for its decode
    LoadTrack { track: TrackId },
    /// Decode finished for `track`; ignored unless it is still the current load
    AssetDecoded {
        track: TrackId,
        asset: Shared<DecodedAsset>,
    },
    /// Start or resume (restarts from zero after the track ended)
    Play,
    /// Pause, keeping the position
    Stop,
    Seek { position_ms: f64 },
    /// `natural` keeps pitch tied to rate; otherwise time-stretch preserves it
    SetVarispeed { speed: f64, natural: bool },
    SetReverbEnabled(bool),
    SetReverbMix(f32),
    SetReverbConfig(ReverbConfigPatch),
    SetLooping(bool),
}

impl EngineCommand {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            EngineCommand::LoadTrack { .. } => "loadTrack",
            EngineCommand::AssetDecoded { .. } => "assetDecoded",
            EngineCommand::Play => "play",
            EngineCommand::Stop => "stop",
            EngineCommand::Seek { .. } => "seek",
            EngineCommand::SetVarispeed { .. } => "setVarispeed",
            EngineCommand::SetReverbEnabled(_) => "setReverbEnabled",
            EngineCommand::SetReverbMix(_) => "setReverbMix",
            EngineCommand::SetReverbConfig(_) => "setReverbConfig",
            EngineCommand::SetLooping(_) => "setLooping",
        }
    }
}

/// Capacity of the command queue
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

/// Create a new command channel (producer for the control side, consumer for the engine)
pub fn command_channel() -> (rtrb::Producer<EngineCommand>, rtrb::Consumer<EngineCommand>) {
    rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}

/// Non-blocking sending side of the command queue
pub struct CommandSender {
    producer: rtrb::Producer<EngineCommand>,
}

impl CommandSender {
    pub fn new(producer: rtrb::Producer<EngineCommand>) -> Self {
        Self { producer }
    }

    /// Queue a command; a full queue hands the command back
    pub fn send(&mut self, cmd: EngineCommand) -> Result<(), EngineCommand> {
        self.producer.push(cmd).map_err(|e| match e {
            rtrb::PushError::Full(value) => value,
        })
    }

    pub fn has_space(&self) -> bool {
        self.producer.slots() > 0
    }
}
