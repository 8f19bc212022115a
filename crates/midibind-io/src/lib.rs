//! MIDI input, dispatch loop and engine lifecycle for midibind.
//!
//! [`MidiBindEngine`] opens one input port on a background thread and runs
//! every message through classify → resolve → invoke until it is stopped.
//! Ports come from a [`PortProvider`]: [`MidirPortProvider`] for hardware
//! (`midi-io` feature) or [`VirtualPortProvider`] for in-process ports.

pub mod error;

mod dispatch;
pub mod engine;
pub mod port;

#[cfg(feature = "midi-io")]
mod io;

pub use engine::{
    DispatchStats, EngineBuilder, EngineConfig, EngineReport, EngineStatus, MidiBindEngine,
};
pub use error::{Error, Result};
#[cfg(feature = "midi-io")]
pub use io::MidirPortProvider;
pub use port::{
    find_port, InputConnection, InputSink, MidiInputDevice, PortProvider, VirtualPort,
    VirtualPortProvider,
};

pub use crossbeam_channel::Receiver;
