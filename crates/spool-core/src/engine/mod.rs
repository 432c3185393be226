//! Playback engine - session, player, reverb send, mixer and queues
//!
//! This module contains everything that runs on the audio thread:
//! - PlaybackSession: lifecycle flags and track identity
//! - Player: variable-rate reader over one decoded asset
//! - ReverbUnit: wet send on top of the dry mix
//! - PlaybackEngine: drains commands, renders, reports progress

mod command;
mod engine;
mod event;
mod gc;
mod mixer;
mod player;
mod pool;
mod progress;
mod reverb_unit;
mod session;

pub use command::*;
pub use engine::*;
pub use event::*;
pub use gc::*;
pub use mixer::*;
pub use player::*;
pub use pool::*;
pub use progress::*;
pub use reverb_unit::*;
pub use session::*;
