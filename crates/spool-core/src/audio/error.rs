//! Output stream errors

use thiserror::Error;

/// Errors opening or starting the output stream
#[derive(Error, Debug)]
pub enum AudioError {
    /// The host lists no output devices at all
    #[error("no audio output devices found")]
    NoDevices,

    #[error("no default output device: {0}")]
    NoDefaultDevice(String),

    /// `output_device` in the config names a device the host does not have
    #[error("output device not found: {0}")]
    DeviceNotFound(String),

    #[error("cannot query output configs: {0}")]
    ConfigQuery(String),

    /// The device offers no 32-bit float output config
    #[error("device has no f32 output configuration")]
    NoFloatConfig,

    #[error("failed to build output stream: {0}")]
    StreamBuild(String),

    #[error("failed to start output stream: {0}")]
    StreamPlay(String),
}

/// Result type for output operations
pub type AudioResult<T> = Result<T, AudioError>;
