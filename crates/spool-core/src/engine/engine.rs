//! Playback engine - ties together session, player, reverb and the queues
//!
//! Everything in this struct is owned by the audio thread. The only ways
//! in are the command queue (drained at the top of [`PlaybackEngine::process`])
//! and the read-only [`EngineAtomics`].

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::types::{StereoSample, MAX_QUANTUM_FRAMES};

use super::command::EngineCommand;
use super::event::{EngineEvent, EventSender};
use super::mixer::render_quantum;
use super::player::{resolve_duration, Player};
use super::pool::BufferPool;
use super::progress::{is_track_end, ProgressReporter};
use super::reverb_unit::ReverbUnit;
use super::session::PlaybackSession;

/// Counters readable from any thread
#[derive(Debug, Default)]
pub struct EngineAtomics {
    /// Render chunks that panicked and were replaced by silence
    pub faulted_callbacks: AtomicU64,
    /// Events lost because the controller was not draining the queue
    pub dropped_events: AtomicU64,
    /// Decode completions discarded because a newer load was requested
    pub stale_loads: AtomicU64,
    /// Loop windows rejected by the player (end past the decoded audio)
    pub loop_install_failures: AtomicU64,
}

impl EngineAtomics {
    pub fn faulted_callbacks(&self) -> u64 {
        self.faulted_callbacks.load(Ordering::Relaxed)
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    pub fn stale_loads(&self) -> u64 {
        self.stale_loads.load(Ordering::Relaxed)
    }

    pub fn loop_install_failures(&self) -> u64 {
        self.loop_install_failures.load(Ordering::Relaxed)
    }
}

/// The real-time playback engine
pub struct PlaybackEngine {
    session: PlaybackSession,
    player: Player,
    reverb: ReverbUnit,
    pool: BufferPool,
    progress: ProgressReporter,
    commands: rtrb::Consumer<EngineCommand>,
    events: EventSender,
    atomics: Arc<EngineAtomics>,
}

impl PlaybackEngine {
    /// Build an engine rendering at `sample_rate`; emits `Ready`
    pub fn new(
        config: &EngineConfig,
        sample_rate: u32,
        commands: rtrb::Consumer<EngineCommand>,
        events: rtrb::Producer<EngineEvent>,
    ) -> Self {
        let atomics = Arc::new(EngineAtomics::default());
        let mut session = PlaybackSession::new();
        session.set_looping(config.looping);

        let mut engine = Self {
            session,
            player: Player::new(sample_rate),
            reverb: ReverbUnit::new(sample_rate, config.reverb),
            pool: BufferPool::new(MAX_QUANTUM_FRAMES),
            progress: ProgressReporter::new(config.progress_interval_callbacks),
            commands,
            events: EventSender::new(events, atomics.clone()),
            atomics,
        };
        engine.events.emit(EngineEvent::Ready);
        engine
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn reverb(&self) -> &ReverbUnit {
        &self.reverb
    }

    /// Shared counters, for observation outside the audio thread
    pub fn atomics(&self) -> Arc<EngineAtomics> {
        self.atomics.clone()
    }

    /// Apply every queued command
    pub fn process_commands(&mut self) {
        while let Ok(cmd) = self.commands.pop() {
            self.handle_command(cmd);
        }
    }

    /// Apply one command
    pub fn handle_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::LoadTrack { track } => {
                self.session.begin_load(track);
                self.player.unload();
                self.progress.reset();
            }
            EngineCommand::AssetDecoded { track, asset } => {
                if !self.session.is_current(track) {
                    self.atomics.stale_loads.fetch_add(1, Ordering::Relaxed);
                    return;
                }

                let duration = resolve_duration(&asset);
                self.player.open(asset);
                self.reverb.reset();

                if self.session.is_looping() {
                    self.install_full_loop(duration);
                }

                self.player.seek_ms(0.0);
                self.player.play();
                self.session.complete_load(duration);
                self.progress.reset();
                self.events.emit(EngineEvent::Loaded { duration });
            }
            EngineCommand::Play => {
                if !self.session.is_loaded() {
                    return;
                }
                if self.session.is_ended() {
                    self.player.seek_ms(0.0);
                    self.session.clear_ended();
                }
                self.player.play();
                self.session.start();
            }
            EngineCommand::Stop => {
                self.session.stop();
                self.player.pause();
            }
            EngineCommand::Seek { position_ms } => {
                if self.session.is_loaded() {
                    self.player.seek_ms(position_ms);
                }
                self.session.clear_ended();
            }
            EngineCommand::SetVarispeed { speed, natural } => {
                self.player.set_rate(speed);
                if natural {
                    self.player.set_time_stretch(false);
                } else {
                    self.player.set_time_stretch(true);
                }
                self.player.set_pitch_shift(0.0);
                self.session.set_varispeed(self.player.rate(), natural);
            }
            EngineCommand::SetReverbEnabled(enabled) => self.reverb.set_enabled(enabled),
            EngineCommand::SetReverbMix(mix) => self.reverb.set_mix(mix),
            EngineCommand::SetReverbConfig(patch) => self.reverb.apply_patch(&patch),
            EngineCommand::SetLooping(enabled) => {
                self.session.set_looping(enabled);
                if enabled {
                    self.install_full_loop(self.session.duration_seconds());
                } else {
                    self.player.clear_loop();
                }
            }
        }
    }

    /// Loop the whole track; without a known duration the end-of-asset wrap covers it
    ///
    /// Runs on the audio thread, so a rejected window is only counted.
    fn install_full_loop(&mut self, duration: f64) {
        if duration <= 0.0 {
            return;
        }
        let end_ms = (duration * 1000.0).floor();
        if self.player.install_loop(0.0, end_ms).is_err() {
            self.atomics
                .loop_install_failures
                .fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Render one callback of interleaved stereo into `output`
    ///
    /// Commands are applied first. The buffer is always fully written; an
    /// odd trailing sample is zeroed.
    pub fn process(&mut self, output: &mut [f32]) {
        self.process_commands();

        let frame_samples = output.len() & !1;
        let (frames, tail) = output.split_at_mut(frame_samples);
        tail.fill(0.0);

        let frames: &mut [StereoSample] = bytemuck::cast_slice_mut(frames);
        for chunk in frames.chunks_mut(self.pool.max_frames()) {
            self.render_chunk(chunk);
        }
    }

    fn render_chunk(&mut self, chunk: &mut [StereoSample]) {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            render_quantum(
                &self.session,
                &mut self.player,
                &mut self.reverb,
                &mut self.pool,
                chunk,
            )
        }));

        match result {
            Ok(true) => self.report_progress(),
            Ok(false) => {}
            Err(_) => {
                chunk.fill(StereoSample::silence());
                self.atomics.faulted_callbacks.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn report_progress(&mut self) {
        if !self.progress.tick() {
            return;
        }

        let duration = self.session.duration_seconds();
        let looping = self.session.is_looping();
        let wrapped = self.player.take_wrapped_at_eof();
        let position = self.player.position_seconds();

        let current_time = if wrapped && !looping { duration } else { position };
        self.events.emit(EngineEvent::Progress {
            current_time,
            duration,
        });

        if is_track_end(looping, duration, position, wrapped) {
            self.session.mark_ended();
            self.player.pause();
            self.events.emit(EngineEvent::Ended);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::command::command_channel;
    use crate::engine::event::event_channel;
    use crate::engine::gc_handle;
    use crate::engine::reverb_unit::ReverbConfigPatch;
    use crate::engine::session::{PlaybackState, TrackId};
    use crate::loader::DecodedAsset;
    use crate::types::QUANTUM_FRAMES;
    use basedrop::Shared;

    struct Harness {
        engine: PlaybackEngine,
        commands: rtrb::Producer<EngineCommand>,
        events: rtrb::Consumer<EngineEvent>,
    }

    impl Harness {
        fn new(config: EngineConfig) -> Self {
            let (cmd_tx, cmd_rx) = command_channel();
            let (evt_tx, evt_rx) = event_channel();
            let engine = PlaybackEngine::new(&config, 48000, cmd_rx, evt_tx);
            Self {
                engine,
                commands: cmd_tx,
                events: evt_rx,
            }
        }

        fn looping(looping: bool) -> Self {
            Self::new(EngineConfig {
                looping,
                progress_interval_callbacks: 4,
                ..Default::default()
            })
        }

        fn send(&mut self, cmd: EngineCommand) {
            assert!(self.commands.push(cmd).is_ok());
        }

        fn load(&mut self, track: u64, asset: DecodedAsset) {
            self.send(EngineCommand::LoadTrack {
                track: TrackId(track),
            });
            self.decoded(track, asset);
        }

        fn decoded(&mut self, track: u64, asset: DecodedAsset) {
            self.send(EngineCommand::AssetDecoded {
                track: TrackId(track),
                asset: Shared::new(&gc_handle(), asset),
            });
        }

        fn callback(&mut self) -> Vec<f32> {
            let mut out = vec![1.0f32; QUANTUM_FRAMES * 2];
            self.engine.process(&mut out);
            out
        }

        fn drain(&mut self) -> Vec<EngineEvent> {
            let mut events = Vec::new();
            while let Ok(event) = self.events.pop() {
                events.push(event);
            }
            events
        }
    }

    fn is_silent(out: &[f32]) -> bool {
        out.iter().all(|s| *s == 0.0)
    }

    #[test]
    fn test_ready_on_construction() {
        let mut h = Harness::looping(true);
        assert_eq!(h.drain(), vec![EngineEvent::Ready]);
    }

    #[test]
    fn test_silence_before_load() {
        let mut h = Harness::looping(true);
        assert!(is_silent(&h.callback()));

        h.send(EngineCommand::Play);
        assert!(is_silent(&h.callback()));
        assert_eq!(h.engine.session().state(), PlaybackState::Idle);
    }

    #[test]
    fn test_load_then_play() {
        let mut h = Harness::looping(true);
        h.load(1, DecodedAsset::constant(2.0, 48000, 0.5));

        let out = h.callback();
        let session = h.engine.session();
        assert!(session.is_loaded() && session.is_playing() && !session.is_ended());
        assert!(out.iter().all(|s| *s == 0.25));

        let events = h.drain();
        assert_eq!(events[1], EngineEvent::Loaded { duration: 2.0 });
    }

    #[test]
    fn test_loading_is_silent() {
        let mut h = Harness::looping(true);
        h.send(EngineCommand::LoadTrack { track: TrackId(1) });
        assert!(is_silent(&h.callback()));
        assert_eq!(h.engine.session().state(), PlaybackState::Loading);
    }

    #[test]
    fn test_stale_load_is_discarded() {
        let mut h = Harness::looping(true);
        h.send(EngineCommand::LoadTrack { track: TrackId(1) });
        h.send(EngineCommand::LoadTrack { track: TrackId(2) });
        h.decoded(1, DecodedAsset::constant(1.0, 48000, 0.5));

        assert!(is_silent(&h.callback()));
        assert!(!h.engine.session().is_loaded());
        assert_eq!(h.engine.atomics().stale_loads(), 1);

        h.decoded(2, DecodedAsset::constant(3.0, 48000, 0.5));
        assert!(!is_silent(&h.callback()));
        assert!(h.engine.session().is_loaded());
        assert_eq!(h.engine.session().duration_seconds(), 3.0);
    }

    #[test]
    fn test_stop_is_idempotent_and_resume_keeps_position() {
        let mut h = Harness::looping(true);
        h.load(1, DecodedAsset::constant(2.0, 48000, 0.5));
        for _ in 0..10 {
            h.callback();
        }

        h.send(EngineCommand::Stop);
        h.send(EngineCommand::Stop);
        assert!(is_silent(&h.callback()));
        let paused_at = h.engine.player().position_seconds();
        assert!(!h.engine.session().is_playing());
        assert!(is_silent(&h.callback()));
        assert_eq!(h.engine.player().position_seconds(), paused_at);

        h.send(EngineCommand::Play);
        h.callback();
        let expected = paused_at + QUANTUM_FRAMES as f64 / 48000.0;
        assert!((h.engine.player().position_seconds() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_ten_second_track_ends_once() {
        let mut h = Harness::looping(false);
        h.load(1, DecodedAsset::constant(10.0, 48000, 0.5));
        h.send(EngineCommand::Play);

        let mut events = Vec::new();
        let mut max_reported: f64 = 0.0;
        let mut callbacks = 0;
        while max_reported < 9.9 {
            h.callback();
            for event in h.drain() {
                if let EngineEvent::Progress { current_time, .. } = event {
                    max_reported = max_reported.max(current_time);
                }
                events.push(event);
            }
            callbacks += 1;
            assert!(callbacks < 10_000, "track never reached its end");
        }

        assert_eq!(h.engine.session().state(), PlaybackState::Ended);
        for _ in 0..50 {
            assert!(is_silent(&h.callback()));
        }
        events.extend(h.drain());
        let ended = events.iter().filter(|e| **e == EngineEvent::Ended).count();
        assert_eq!(ended, 1);
    }

    #[test]
    fn test_end_of_track_emits_single_ended_event() {
        let mut h = Harness::looping(false);
        h.load(1, DecodedAsset::constant(2.0, 48000, 0.5));

        let mut events = Vec::new();
        for _ in 0..2000 {
            h.callback();
            events.extend(h.drain());
        }
        let ended = events.iter().filter(|e| **e == EngineEvent::Ended).count();
        assert_eq!(ended, 1);
    }

    #[test]
    fn test_play_after_end_restarts_from_zero() {
        let mut h = Harness::looping(false);
        h.load(1, DecodedAsset::constant(1.5, 48000, 0.5));
        for _ in 0..1000 {
            h.callback();
        }
        assert!(h.engine.session().is_ended());

        h.send(EngineCommand::Play);
        let out = h.callback();
        assert!(!is_silent(&out));
        let expected = QUANTUM_FRAMES as f64 / 48000.0;
        assert!((h.engine.player().position_seconds() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_seek_clears_ended_but_stays_silent() {
        let mut h = Harness::looping(false);
        h.load(1, DecodedAsset::constant(1.5, 48000, 0.5));
        for _ in 0..1000 {
            h.callback();
        }

        h.send(EngineCommand::Seek { position_ms: 500.0 });
        assert!(is_silent(&h.callback()));
        assert_eq!(h.engine.session().state(), PlaybackState::Paused);
        assert!((h.engine.player().position_seconds() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_looping_track_never_ends() {
        let mut h = Harness::looping(true);
        h.load(1, DecodedAsset::constant(1.5, 48000, 0.5));
        h.callback();
        assert!(h.engine.player().has_loop());

        let mut events = Vec::new();
        for _ in 0..2000 {
            assert!(!is_silent(&h.callback()));
            events.extend(h.drain());
        }
        assert!(!events.contains(&EngineEvent::Ended));
        assert!(h.engine.session().is_playing());
    }

    #[test]
    fn test_disabling_loop_clears_window() {
        let mut h = Harness::looping(true);
        h.load(1, DecodedAsset::constant(1.5, 48000, 0.5));
        h.send(EngineCommand::SetLooping(false));
        h.callback();
        assert!(!h.engine.player().has_loop());
        assert!(!h.engine.session().is_looping());

        h.send(EngineCommand::SetLooping(true));
        h.callback();
        assert!(h.engine.player().has_loop());
    }

    #[test]
    fn test_unknown_duration_skips_loop_window() {
        let mut h = Harness::looping(true);
        // Half a second with no reported duration resolves to 0
        h.load(1, DecodedAsset::constant(0.5, 48000, 0.5));
        h.callback();
        assert_eq!(h.engine.session().duration_seconds(), 0.0);
        assert!(!h.engine.player().has_loop());

        // Still plays through the end-of-asset wrap
        for _ in 0..400 {
            assert!(!is_silent(&h.callback()));
        }
    }

    #[test]
    fn test_progress_is_throttled() {
        let mut h = Harness::looping(true);
        h.load(1, DecodedAsset::constant(5.0, 48000, 0.5));
        h.drain();

        for _ in 0..40 {
            h.callback();
        }
        let progress = h
            .drain()
            .into_iter()
            .filter(|e| matches!(e, EngineEvent::Progress { .. }))
            .count();
        assert_eq!(progress, 10);
    }

    #[test]
    fn test_no_progress_while_paused() {
        let mut h = Harness::looping(true);
        h.load(1, DecodedAsset::constant(5.0, 48000, 0.5));
        h.send(EngineCommand::Stop);
        for _ in 0..40 {
            h.callback();
        }
        assert!(!h
            .drain()
            .iter()
            .any(|e| matches!(e, EngineEvent::Progress { .. })));
    }

    #[test]
    fn test_varispeed_modes() {
        let mut h = Harness::looping(true);
        h.send(EngineCommand::SetVarispeed {
            speed: 1.5,
            natural: true,
        });
        h.callback();
        assert!(!h.engine.player().time_stretch_enabled());
        assert_eq!(h.engine.player().pitch_shift_semitones(), 0.0);
        assert_eq!(h.engine.player().rate(), 1.5);

        h.send(EngineCommand::SetVarispeed {
            speed: 1.5,
            natural: false,
        });
        h.callback();
        assert!(h.engine.player().time_stretch_enabled());
        assert_eq!(h.engine.player().pitch_shift_semitones(), 0.0);
        assert!(!h.engine.session().is_varispeed_natural());
        assert_eq!(h.engine.session().playback_rate(), 1.5);
    }

    #[test]
    fn test_reverb_commands() {
        let mut h = Harness::looping(true);
        h.send(EngineCommand::SetReverbMix(0.4));
        h.send(EngineCommand::SetReverbConfig(ReverbConfigPatch {
            damp: Some(0.2),
            ..Default::default()
        }));
        h.callback();
        let config = h.engine.reverb().config();
        assert!(config.enabled);
        assert_eq!(config.mix, 0.4);
        assert_eq!(config.damp, 0.2);

        h.send(EngineCommand::SetReverbEnabled(false));
        h.callback();
        assert!(!h.engine.reverb().config().enabled);
    }

    #[test]
    fn test_loop_past_decoded_audio_is_counted() {
        let mut h = Harness::looping(true);
        let asset = DecodedAsset::constant(2.0, 48000, 0.5).with_reported_duration(Some(2.2));
        h.load(1, asset);
        h.callback();

        assert!(!h.engine.player().has_loop());
        assert_eq!(h.engine.atomics().loop_install_failures(), 1);
        for _ in 0..1000 {
            assert!(!is_silent(&h.callback()));
        }
    }

    #[test]
    fn test_new_track_starts_without_previous_reverb_tail() {
        let mut h = Harness::looping(true);
        h.send(EngineCommand::SetReverbMix(1.0));
        h.load(1, DecodedAsset::constant(2.0, 48000, 0.5));
        for _ in 0..200 {
            h.callback();
        }

        h.load(2, DecodedAsset::constant(2.0, 48000, 0.0));
        for _ in 0..10 {
            assert!(is_silent(&h.callback()));
        }
    }

    #[test]
    fn test_non_finite_varispeed_is_ignored() {
        let mut h = Harness::looping(true);
        h.load(1, DecodedAsset::constant(2.0, 48000, 0.5));
        h.send(EngineCommand::SetVarispeed {
            speed: f64::NAN,
            natural: true,
        });
        let out = h.callback();
        assert!(out.iter().all(|s| s.is_finite()));
        assert_eq!(h.engine.session().playback_rate(), 1.0);
    }

    #[test]
    fn test_large_callback_is_chunked() {
        let mut h = Harness::looping(true);
        h.load(1, DecodedAsset::constant(2.0, 48000, 0.5));
        let mut out = vec![1.0f32; (MAX_QUANTUM_FRAMES + 100) * 2 + 1];
        h.engine.process(&mut out);

        let (frames, tail) = out.split_at(out.len() - 1);
        assert!(frames.iter().all(|s| *s == 0.25));
        assert_eq!(tail[0], 0.0);
    }
}
