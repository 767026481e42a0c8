//! Error and warning types for patchwire-core.

use crate::checksum::ChecksumError;
use thiserror::Error;

/// Error type for patchwire-core operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Schema mismatch: expected {expected} payload bytes, got {actual}")]
    SchemaMismatch { expected: usize, actual: usize },

    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("Unknown lookup table: {0}")]
    UnknownTable(String),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Invalid parameter range for '{name}': min={min}, max={max}")]
    InvalidRange { name: String, min: i32, max: i32 },

    #[error(transparent)]
    Checksum(#[from] ChecksumError),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Recoverable conditions reported alongside a successful decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// Checksum did not match but the device policy tolerates it.
    Checksum(ChecksumError),

    /// A device code had no entry in the lookup table; the value fell back to index 0.
    UnknownTableCode { parameter: String, code: i32 },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::Checksum(e) => write!(f, "{e}"),
            Warning::UnknownTableCode { parameter, code } => {
                write!(f, "Unknown table code {code} for '{parameter}', using index 0")
            }
        }
    }
}
