//! Audio output via cpal
//!
//! Opens an output device, negotiates an f32 stream and drives a
//! [`PlaybackEngine`](crate::engine::PlaybackEngine) from its callback.

mod device;
mod error;
mod output;

pub use device::*;
pub use error::*;
pub use output::*;
