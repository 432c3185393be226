//! Control thread interface
//!
//! - [`Controller`]: typed methods that enqueue engine commands
//! - [`ControlMessage`]: the JSON protocol hosts speak
//! - [`create_engine`]: builds a connected controller/engine pair

mod controller;
mod error;
mod message;

pub use controller::*;
pub use error::*;
pub use message::*;
