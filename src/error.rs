//! Centralized error type for the patchwire umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] patchwire_core::Error),

    #[error("Sysex: {0}")]
    Sysex(#[from] patchwire_sysex::Error),

    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    #[error("Device registered twice: {0}")]
    DuplicateDevice(String),
}

pub type Result<T> = std::result::Result<T, Error>;
