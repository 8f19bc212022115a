//! Port provider interface shared by hardware and virtual ports.

use crate::error::Result;
use crossbeam_channel::Sender;
use midibind_core::MidiBytes;

/// Information about an available MIDI input endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiInputDevice {
    /// Position in the provider's listing at the time it was taken.
    pub index: usize,
    pub name: String,
}

/// Write end of a session's input queue.
///
/// Cloned into port callbacks. Once every clone is dropped, the dispatch loop
/// sees the port as closed.
#[derive(Debug, Clone)]
pub struct InputSink {
    sender: Sender<MidiBytes>,
}

impl InputSink {
    pub(crate) fn new(sender: Sender<MidiBytes>) -> Self {
        Self { sender }
    }

    /// Queue one raw message. Returns `false` once the session is gone.
    #[inline]
    pub fn push(&self, bytes: &[u8]) -> bool {
        self.sender.send(MidiBytes::from_slice(bytes)).is_ok()
    }
}

/// An open input port. Dropping or closing it stops delivery.
pub trait InputConnection {
    /// Resolved name of the port that was opened.
    fn port_name(&self) -> &str;

    /// Whether the endpoint is still present. Checked periodically by the
    /// dispatch thread for backends whose callbacks never see a disconnect.
    fn is_alive(&self) -> bool {
        true
    }

    fn close(self: Box<Self>);
}

/// Enumerates and opens named MIDI input endpoints.
///
/// `open_input` runs on the dispatch thread, so connections never cross
/// threads. It must fail fast for ports that do not exist or are already
/// claimed.
pub trait PortProvider: Send + Sync {
    fn list_inputs(&self) -> Vec<MidiInputDevice>;

    fn open_input(&self, port_name: &str, sink: InputSink) -> Result<Box<dyn InputConnection>>;
}

/// Pick the device best matching `name`.
///
/// Exact match first, then a match on the client part of `client:port` style
/// names, then a case-insensitive substring match.
pub fn find_port<'a>(devices: &'a [MidiInputDevice], name: &str) -> Option<&'a MidiInputDevice> {
    if name.is_empty() {
        return None;
    }

    devices
        .iter()
        .find(|d| d.name == name)
        .or_else(|| {
            devices
                .iter()
                .find(|d| d.name.split(':').next() == Some(name))
        })
        .or_else(|| {
            let needle = name.to_lowercase();
            devices
                .iter()
                .find(|d| d.name.to_lowercase().contains(&needle))
        })
}
