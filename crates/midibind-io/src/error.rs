//! Error types for ports, dispatch and engine lifecycle.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("MIDI port unavailable: {0}")]
    PortUnavailable(String),

    #[error("Another lifecycle transition is in progress or a session is already active")]
    ConcurrentLifecycleRequest,

    #[error("MIDI device error: {0}")]
    MidiDevice(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Core(#[from] midibind_core::Error),
}

#[cfg(feature = "midi-io")]
impl From<midir::InitError> for Error {
    fn from(e: midir::InitError) -> Self {
        Error::MidiDevice(e.to_string())
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::ConnectError<midir::MidiInput>> for Error {
    fn from(e: midir::ConnectError<midir::MidiInput>) -> Self {
        Error::PortUnavailable(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
