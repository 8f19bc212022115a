//! Centralized error type for the midibind umbrella crate.
//!
//! Wraps both subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] midibind_core::Error),

    #[error("MIDI: {0}")]
    Midi(#[from] midibind_io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
