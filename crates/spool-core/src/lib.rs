//! Spool Core - real-time single-track playback engine
//!
//! The engine runs inside an audio callback and is steered by a
//! non-real-time [`control::Controller`] through lock-free queues.

pub mod audio;
pub mod config;
pub mod control;
pub mod effect;
pub mod engine;
pub mod loader;
pub mod timestretch;
pub mod types;

pub use types::*;
