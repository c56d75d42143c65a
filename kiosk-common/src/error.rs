//! Shared error type for the kiosk crates

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file unreadable, unparsable or out of range
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller-supplied value the operation cannot work with
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
