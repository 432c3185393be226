//! Control-side error types

use thiserror::Error;

use crate::loader::LoaderError;

/// Errors returned by [`Controller`](super::Controller) operations
#[derive(Error, Debug)]
pub enum ControlError {
    /// The engine is not draining its command queue fast enough
    #[error("command queue is full, dropped {0}")]
    QueueFull(&'static str),

    /// A textual control message was not valid JSON or not a known command
    #[error("invalid control message: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Loader(#[from] LoaderError),
}

pub type ControlResult<T> = Result<T, ControlError>;
