//! Error types for the core model and classification layer.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid controller schema: {0}")]
    InvalidSchema(String),

    #[error("Invalid binds set: {0}")]
    InvalidBinds(String),

    #[error("Binds '{binds}' are intended for controller '{expected}', not '{found}'")]
    ControllerMismatch {
        binds: String,
        expected: String,
        found: String,
    },

    #[error("Malformed MIDI message: {0}")]
    MalformedMessage(String),
}

pub type Result<T> = std::result::Result<T, Error>;
