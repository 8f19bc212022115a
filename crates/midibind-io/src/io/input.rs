//! midir-backed port provider.
//!
//! Connections are created on the dispatch thread that consumes them, which
//! keeps platform MIDI handles on a single thread.

use crate::error::{Error, Result};
use crate::port::{find_port, InputConnection, InputSink, MidiInputDevice, PortProvider};
use midir::{MidiInput, MidiInputConnection, MidiInputPort};
use tracing::{debug, info};

/// Opens hardware (and OS-level virtual) MIDI inputs.
///
/// midir keeps the input callback registered after a device is unplugged, so
/// the message stream never ends on its own. An open connection instead
/// reports itself dead once its port drops out of the OS port list, which the
/// dispatch thread checks every `port_check_interval`.
#[derive(Debug, Clone)]
pub struct MidirPortProvider {
    client_name: String,
}

impl MidirPortProvider {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
        }
    }

    pub fn list_devices(client_name: &str) -> Vec<MidiInputDevice> {
        MidiInput::new(client_name)
            .map(|midi_input| devices_of(&midi_input, &midi_input.ports()))
            .unwrap_or_default()
    }
}

fn devices_of(midi_input: &MidiInput, ports: &[MidiInputPort]) -> Vec<MidiInputDevice> {
    ports
        .iter()
        .enumerate()
        .map(|(index, port)| MidiInputDevice {
            index,
            name: midi_input
                .port_name(port)
                .unwrap_or_else(|_| format!("Unknown Device {}", index)),
        })
        .collect()
}

fn port_listed(devices: &[MidiInputDevice], port_name: &str) -> bool {
    devices.iter().any(|device| device.name == port_name)
}

impl Default for MidirPortProvider {
    fn default() -> Self {
        Self::new("midibind")
    }
}

struct MidirInputConnection {
    connection: MidiInputConnection<()>,
    port_name: String,
    client_name: String,
}

impl InputConnection for MidirInputConnection {
    fn port_name(&self) -> &str {
        &self.port_name
    }

    fn is_alive(&self) -> bool {
        let Ok(midi_input) = MidiInput::new(&self.client_name) else {
            // Without a client the port list is unknown; keep the session.
            return true;
        };
        port_listed(&devices_of(&midi_input, &midi_input.ports()), &self.port_name)
    }

    fn close(self: Box<Self>) {
        let this = *self;
        this.connection.close();
        info!(port = %this.port_name, "Closed MIDI input");
    }
}

impl PortProvider for MidirPortProvider {
    fn list_inputs(&self) -> Vec<MidiInputDevice> {
        Self::list_devices(&self.client_name)
    }

    fn open_input(&self, port_name: &str, sink: InputSink) -> Result<Box<dyn InputConnection>> {
        let midi_input = MidiInput::new(&self.client_name)?;

        let ports = midi_input.ports();
        let devices = devices_of(&midi_input, &ports);

        let device = find_port(&devices, port_name).ok_or_else(|| {
            Error::PortUnavailable(format!("no MIDI input matching '{port_name}'"))
        })?;
        let port = ports.get(device.index).ok_or_else(|| {
            Error::PortUnavailable(format!("MIDI input {} disappeared", device.index))
        })?;

        let connection = midi_input.connect(
            port,
            "midibind-input",
            move |_timestamp, message, _| {
                if !sink.push(message) {
                    debug!("dispatch session gone, dropping MIDI message");
                }
            },
            (),
        )?;

        info!(port = %device.name, "Opened MIDI input");
        Ok(Box::new(MidirInputConnection {
            connection,
            port_name: device.name.clone(),
            client_name: self.client_name.clone(),
        }))
    }
}
