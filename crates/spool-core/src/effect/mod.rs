//! Audio effects
//!
//! Only the reverb primitive lives here; the engine-facing wet/dry
//! wrapper is [`crate::engine::ReverbUnit`].

pub mod reverb;

pub use reverb::{ReverbEffect, ReverbError, MAX_PREDELAY_MS};
