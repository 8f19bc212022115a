//! MIDI input ports.
//!
//! A [`PortProvider`] enumerates and opens named input endpoints. Opening hands
//! the provider an [`InputSink`]; every message the port receives is pushed
//! into it, and the returned [`InputConnection`] closes the port again.

mod provider;
mod virtual_port;

pub use provider::{find_port, InputConnection, InputSink, MidiInputDevice, PortProvider};
pub use virtual_port::{VirtualPort, VirtualPortProvider};
