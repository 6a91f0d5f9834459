use thiserror::Error;

use crate::frame::FrameError;

/// Common error type for WearLink components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using WearLink's Error.
pub type Result<T> = std::result::Result<T, Error>;
