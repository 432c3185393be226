//! Non-real-time side of the engine
//!
//! The controller owns the producing end of the command queue (shared
//! with the loader thread), the consuming end of the event queue and the
//! [`TrackId`] counter. Nothing here runs on the audio thread.

use std::sync::{Arc, Mutex};

use crate::config::EngineConfig;
use crate::engine::{
    command_channel, event_channel, CommandSender, EngineAtomics, EngineCommand, EngineEvent,
    PlaybackEngine, ReverbConfigPatch, TrackId,
};
use crate::loader::{lock_sender, AssetDecoder, AssetLoader};

use super::error::{ControlError, ControlResult};
use super::message::ControlMessage;

/// Drives a [`PlaybackEngine`] from the control thread
pub struct Controller {
    commands: Arc<Mutex<CommandSender>>,
    events: rtrb::Consumer<EngineEvent>,
    loader: AssetLoader,
    atomics: Arc<EngineAtomics>,
    next_track: u64,
    /// Loop install failures already reported
    loop_failures_logged: u64,
}

/// Build a connected controller/engine pair
///
/// The engine renders at `sample_rate` and is meant to be moved into the
/// audio callback; the controller stays on the control thread.
pub fn create_engine<D: AssetDecoder>(
    config: &EngineConfig,
    sample_rate: u32,
    decoder: D,
) -> (Controller, PlaybackEngine) {
    let (cmd_tx, cmd_rx) = command_channel();
    let (evt_tx, evt_rx) = event_channel();

    let engine = PlaybackEngine::new(config, sample_rate, cmd_rx, evt_tx);
    let commands = Arc::new(Mutex::new(CommandSender::new(cmd_tx)));
    let loader = AssetLoader::spawn(decoder, commands.clone());

    let controller = Controller {
        commands,
        events: evt_rx,
        loader,
        atomics: engine.atomics(),
        next_track: 0,
        loop_failures_logged: 0,
    };
    (controller, engine)
}

impl Controller {
    fn send(&self, cmd: EngineCommand) -> ControlResult<()> {
        let name = cmd.name();
        lock_sender(&self.commands).send(cmd).map_err(|_| {
            log::warn!("Command queue full, dropping {}", name);
            ControlError::QueueFull(name)
        })
    }

    /// Request a new track; playback starts on its own once decoded
    pub fn load_track(&mut self, url: &str) -> ControlResult<TrackId> {
        self.next_track += 1;
        let track = TrackId(self.next_track);

        // LoadTrack must be queued before the decode can complete
        self.send(EngineCommand::LoadTrack { track })?;
        self.loader.load(track, url)?;

        log::info!("Requested track {:?}: {}", track, url);
        Ok(track)
    }

    pub fn play(&self) -> ControlResult<()> {
        self.send(EngineCommand::Play)
    }

    pub fn stop(&self) -> ControlResult<()> {
        self.send(EngineCommand::Stop)
    }

    pub fn seek(&self, position_ms: f64) -> ControlResult<()> {
        self.send(EngineCommand::Seek { position_ms })
    }

    pub fn set_varispeed(&self, speed: f64, natural: bool) -> ControlResult<()> {
        self.send(EngineCommand::SetVarispeed { speed, natural })
    }

    pub fn set_reverb_enabled(&self, enabled: bool) -> ControlResult<()> {
        self.send(EngineCommand::SetReverbEnabled(enabled))
    }

    pub fn set_reverb_mix(&self, mix: f32) -> ControlResult<()> {
        self.send(EngineCommand::SetReverbMix(mix))
    }

    pub fn set_reverb_config(&self, patch: ReverbConfigPatch) -> ControlResult<()> {
        self.send(EngineCommand::SetReverbConfig(patch))
    }

    pub fn set_looping(&self, enabled: bool) -> ControlResult<()> {
        self.send(EngineCommand::SetLooping(enabled))
    }

    /// Dispatch a parsed control message
    pub fn dispatch(&mut self, message: ControlMessage) -> ControlResult<()> {
        match message {
            ControlMessage::LoadTrack { url } => self.load_track(&url).map(|_| ()),
            ControlMessage::Play => self.play(),
            ControlMessage::Stop => self.stop(),
            ControlMessage::Seek { position_ms } => self.seek(position_ms),
            ControlMessage::SetVarispeed { speed, is_natural } => {
                self.set_varispeed(speed, is_natural)
            }
            ControlMessage::SetReverbEnabled { enabled } => self.set_reverb_enabled(enabled),
            ControlMessage::SetReverbMix { mix } => self.set_reverb_mix(mix),
            ControlMessage::SetReverbConfig(patch) => self.set_reverb_config(patch),
            ControlMessage::SetLooping { enabled } => self.set_looping(enabled),
        }
    }

    /// Parse and dispatch a JSON control message
    ///
    /// Unknown or malformed messages are logged and leave the engine untouched.
    pub fn handle_message(&mut self, text: &str) -> ControlResult<()> {
        let message = ControlMessage::parse(text).map_err(|e| {
            log::warn!("Ignoring control message {:?}: {}", text, e);
            ControlError::from(e)
        })?;
        self.dispatch(message)
    }

    /// Drain every pending engine event
    ///
    /// Also logs loop windows the engine had to reject since the last poll.
    pub fn poll_events(&mut self) -> Vec<EngineEvent> {
        let failures = self.atomics.loop_install_failures();
        if failures > self.loop_failures_logged {
            log::warn!(
                "Loop window past the decoded audio ({} total), relying on end-of-asset wrap",
                failures
            );
            self.loop_failures_logged = failures;
        }

        let mut events = Vec::with_capacity(self.events.slots());
        while let Ok(event) = self.events.pop() {
            events.push(event);
        }
        events
    }

    /// Counters shared with the engine
    pub fn atomics(&self) -> &EngineAtomics {
        &self.atomics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{DecodeError, DecodedAsset};
    use crate::types::QUANTUM_FRAMES;
    use std::time::{Duration, Instant};

    /// Decodes every URL into two seconds of constant 0.5
    struct ConstantDecoder;

    impl AssetDecoder for ConstantDecoder {
        fn decode(&self, _url: &str) -> Result<DecodedAsset, DecodeError> {
            Ok(DecodedAsset::constant(2.0, 48000, 0.5))
        }
    }

    fn pair() -> (Controller, PlaybackEngine) {
        create_engine(&EngineConfig::default(), 48000, ConstantDecoder)
    }

    /// Run callbacks until the engine reports a loaded track
    fn run_until_loaded(controller: &mut Controller, engine: &mut PlaybackEngine) -> Vec<EngineEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut events = Vec::new();
        let mut out = vec![0.0f32; QUANTUM_FRAMES * 2];
        while Instant::now() < deadline {
            engine.process(&mut out);
            events.extend(controller.poll_events());
            if events.iter().any(|e| matches!(e, EngineEvent::Loaded { .. })) {
                return events;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        panic!("track never loaded");
    }

    #[test]
    fn test_load_track_issues_increasing_ids() {
        let (mut controller, _engine) = pair();
        let a = controller.load_track("a.wav").unwrap();
        let b = controller.load_track("a.wav").unwrap();
        assert!(b > a);
    }

    #[test]
    fn test_load_and_play_end_to_end() {
        let (mut controller, mut engine) = pair();
        controller.handle_message(r#"{"type":"loadTrack","url":"a.wav"}"#).unwrap();

        let events = run_until_loaded(&mut controller, &mut engine);
        assert_eq!(events[0], EngineEvent::Ready);
        assert!(events.contains(&EngineEvent::Loaded { duration: 2.0 }));
        assert!(engine.session().is_playing());

        let mut out = vec![0.0f32; QUANTUM_FRAMES * 2];
        engine.process(&mut out);
        assert!(out.iter().all(|s| *s == 0.25));
    }

    #[test]
    fn test_messages_reach_engine() {
        let (mut controller, mut engine) = pair();
        controller.handle_message(r#"{"type":"setReverbMix","mix":0.5}"#).unwrap();
        controller.handle_message(r#"{"type":"setLooping","enabled":false}"#).unwrap();
        controller
            .handle_message(r#"{"type":"setVarispeed","speed":0.75,"isNatural":true}"#)
            .unwrap();

        let mut out = vec![0.0f32; QUANTUM_FRAMES * 2];
        engine.process(&mut out);
        assert_eq!(engine.reverb().config().mix, 0.5);
        assert!(!engine.session().is_looping());
        assert_eq!(engine.session().playback_rate(), 0.75);
    }

    #[test]
    fn test_unknown_message_is_rejected() {
        let (mut controller, mut engine) = pair();
        let result = controller.handle_message(r#"{"type":"eject"}"#);
        assert!(matches!(result, Err(ControlError::Parse(_))));

        let mut out = vec![0.0f32; QUANTUM_FRAMES * 2];
        engine.process(&mut out);
        assert!(out.iter().all(|s| *s == 0.0));
        assert_eq!(controller.poll_events(), vec![EngineEvent::Ready]);
    }

    #[test]
    fn test_full_queue_reports_error() {
        let (controller, _engine) = pair();
        let mut result = Ok(());
        for _ in 0..=crate::engine::COMMAND_QUEUE_CAPACITY {
            result = controller.play();
        }
        assert!(matches!(result, Err(ControlError::QueueFull("play"))));
    }
}
