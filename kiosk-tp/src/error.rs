//! Error types for kiosk-tp
//!
//! Each component defines its own error; this module collects them for the
//! binary and for callers that drive the whole pipeline.

use thiserror::Error;

pub use crate::mapping::MappingError;
pub use crate::playback::PlaybackError;
pub use crate::serial::SerialError;

/// Main error type for kiosk-tp
#[derive(Error, Debug)]
pub enum Error {
    /// Tag mapping could not be loaded
    #[error(transparent)]
    Mapping(#[from] MappingError),

    /// Serial link failure
    #[error(transparent)]
    Serial(#[from] SerialError),

    /// Player process failure
    #[error(transparent)]
    Playback(#[from] PlaybackError),

    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(#[from] kiosk_common::Error),
}

/// Convenience Result type using kiosk-tp Error
pub type Result<T> = std::result::Result<T, Error>;
