//! Error types for the sysex layer.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] patchwire_core::Error),

    #[error("Block sequence error at block {block}: {reason}")]
    BlockSequence { block: usize, reason: String },

    #[error("Invalid device id {id}: expected {min}..={max}")]
    InvalidDeviceId { id: u8, min: u8, max: u8 },

    #[error("Invalid patch location: {0}")]
    InvalidLocation(String),

    #[error("Unrecognized message: {0}")]
    UnrecognizedMessage(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl From<patchwire_core::ChecksumError> for Error {
    fn from(e: patchwire_core::ChecksumError) -> Self {
        Error::Core(e.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
