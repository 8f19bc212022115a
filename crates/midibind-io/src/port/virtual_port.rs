//! In-process MIDI input ports.
//!
//! Used for tests, demos and software controllers: the application creates
//! named ports and feeds bytes into them as if a device had sent them.

use super::provider::{find_port, InputConnection, InputSink, MidiInputDevice, PortProvider};
use crate::error::{Error, Result};
use midibind_core::RawMidiMessage;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

struct VirtualPortInner {
    name: String,
    /// Set while a session holds the port.
    sink: Mutex<Option<InputSink>>,
    open_delay: Mutex<Option<Duration>>,
}

/// Feeding handle for one virtual port.
#[derive(Clone)]
pub struct VirtualPort {
    inner: Arc<VirtualPortInner>,
}

impl VirtualPort {
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn is_open(&self) -> bool {
        self.inner.sink.lock().is_some()
    }

    /// Deliver raw bytes. Returns `false` when no session has the port open.
    pub fn send(&self, bytes: &[u8]) -> bool {
        match self.inner.sink.lock().as_ref() {
            Some(sink) => sink.push(bytes),
            None => {
                debug!(port = %self.inner.name, "virtual port not open, dropping message");
                false
            }
        }
    }

    pub fn send_message(&self, message: RawMidiMessage) -> bool {
        self.send(&message.to_bytes())
    }

    /// Simulate the device going away while a session is listening.
    pub fn disconnect(&self) {
        self.inner.sink.lock().take();
    }

    /// Make the next opens take this long, as a slow driver would.
    pub fn set_open_delay(&self, delay: Option<Duration>) {
        *self.inner.open_delay.lock() = delay;
    }
}

impl std::fmt::Debug for VirtualPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualPort")
            .field("name", &self.inner.name)
            .field("open", &self.is_open())
            .finish()
    }
}

struct VirtualConnection {
    inner: Arc<VirtualPortInner>,
}

impl InputConnection for VirtualConnection {
    fn port_name(&self) -> &str {
        &self.inner.name
    }

    fn close(self: Box<Self>) {
        self.inner.sink.lock().take();
        debug!(port = %self.inner.name, "virtual port closed");
    }
}

/// Provider for [`VirtualPort`]s. Clone is cheap (Arc internally).
#[derive(Clone, Default)]
pub struct VirtualPortProvider {
    ports: Arc<RwLock<Vec<VirtualPort>>>,
}

impl VirtualPortProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a port, or return the existing one with that name.
    pub fn create_port(&self, name: impl Into<String>) -> VirtualPort {
        let name = name.into();
        let mut ports = self.ports.write();
        if let Some(existing) = ports.iter().find(|p| p.inner.name == name) {
            return existing.clone();
        }

        let port = VirtualPort {
            inner: Arc::new(VirtualPortInner {
                name: name.clone(),
                sink: Mutex::new(None),
                open_delay: Mutex::new(None),
            }),
        };
        ports.push(port.clone());
        debug!("Created virtual MIDI input port {}: {}", ports.len() - 1, name);
        port
    }

    /// Remove a port from the listing. An open session keeps receiving until
    /// it is stopped.
    pub fn remove_port(&self, name: &str) -> bool {
        let mut ports = self.ports.write();
        let before = ports.len();
        ports.retain(|p| p.inner.name != name);
        ports.len() != before
    }

    pub fn port(&self, name: &str) -> Option<VirtualPort> {
        self.ports.read().iter().find(|p| p.inner.name == name).cloned()
    }
}

impl PortProvider for VirtualPortProvider {
    fn list_inputs(&self) -> Vec<MidiInputDevice> {
        self.ports
            .read()
            .iter()
            .enumerate()
            .map(|(index, port)| MidiInputDevice {
                index,
                name: port.inner.name.clone(),
            })
            .collect()
    }

    fn open_input(&self, port_name: &str, sink: InputSink) -> Result<Box<dyn InputConnection>> {
        let port = {
            let devices = self.list_inputs();
            let device = find_port(&devices, port_name).ok_or_else(|| {
                Error::PortUnavailable(format!("no MIDI input matching '{port_name}'"))
            })?;
            self.ports.read().get(device.index).cloned().ok_or_else(|| {
                Error::PortUnavailable(format!("MIDI input '{}' was removed", device.name))
            })?
        };

        let delay = *port.inner.open_delay.lock();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        let mut slot = port.inner.sink.lock();
        if slot.is_some() {
            return Err(Error::PortUnavailable(format!(
                "MIDI input '{}' is already claimed",
                port.inner.name
            )));
        }
        *slot = Some(sink);
        drop(slot);

        Ok(Box::new(VirtualConnection {
            inner: Arc::clone(&port.inner),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_list() {
        let provider = VirtualPortProvider::new();
        provider.create_port("Pad A");
        provider.create_port("Pad B");
        provider.create_port("Pad A");

        let names: Vec<_> = provider.list_inputs().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["Pad A", "Pad B"]);
    }

    #[test]
    fn test_open_delivers_until_closed() {
        let provider = VirtualPortProvider::new();
        let port = provider.create_port("Pad");
        let (tx, rx) = crossbeam_channel::unbounded();

        assert!(!port.send(&[0x90, 1, 127]));
        let connection = provider.open_input("Pad", InputSink::new(tx)).unwrap();
        assert_eq!(connection.port_name(), "Pad");
        assert!(port.is_open());
        assert!(port.send_message(RawMidiMessage::note_on(0, 1, 127)));
        assert_eq!(rx.try_recv().unwrap().as_slice(), &[0x90, 1, 127]);

        connection.close();
        assert!(!port.is_open());
        assert!(!port.send(&[0x90, 1, 127]));
    }

    #[test]
    fn test_open_missing_port_fails() {
        let provider = VirtualPortProvider::new();
        let (tx, _rx) = crossbeam_channel::unbounded();
        let result = provider.open_input("Nothing", InputSink::new(tx));
        assert!(matches!(result, Err(Error::PortUnavailable(_))));
    }

    #[test]
    fn test_open_claimed_port_fails() {
        let provider = VirtualPortProvider::new();
        provider.create_port("Pad");
        let (tx, _rx) = crossbeam_channel::unbounded();

        let _first = provider.open_input("Pad", InputSink::new(tx.clone())).unwrap();
        let second = provider.open_input("Pad", InputSink::new(tx));
        match second {
            Err(Error::PortUnavailable(reason)) => assert!(reason.contains("already claimed")),
            _ => panic!("expected PortUnavailable"),
        }
    }

    #[test]
    fn test_disconnect_drops_sink() {
        let provider = VirtualPortProvider::new();
        let port = provider.create_port("Pad");
        let (tx, rx) = crossbeam_channel::unbounded();

        let _connection = provider.open_input("Pad", InputSink::new(tx)).unwrap();
        port.disconnect();
        assert!(rx.recv().is_err(), "receiver should see the port as closed");
    }

    #[test]
    fn test_remove_port() {
        let provider = VirtualPortProvider::new();
        provider.create_port("Pad");
        assert!(provider.remove_port("Pad"));
        assert!(!provider.remove_port("Pad"));
        assert!(provider.port("Pad").is_none());
    }
}
