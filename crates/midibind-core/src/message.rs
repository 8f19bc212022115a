//! Raw MIDI 1.0 messages as delivered by an input port.
//!
//! Parsing goes through `midi-msg`; only channel voice messages become a
//! [`RawMidiMessage`]. Messages with fewer data bytes (program change,
//! channel pressure) leave the unused bytes at zero.

use crate::error::{Error, Result};
use midi_msg::{Channel, ChannelVoiceMsg, ControlChange, MidiMsg};
use smallvec::{smallvec, SmallVec};

/// Bytes of one incoming message, inline for everything but SysEx.
pub type MidiBytes = SmallVec<[u8; 3]>;

/// Channel voice message kind, from the high nibble of the status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    NoteOff,
    NoteOn,
    PolyPressure,
    ControlChange,
    ProgramChange,
    ChannelPressure,
    PitchBend,
    /// `0xF0..=0xFF`: SysEx, system common and real-time messages.
    System,
}

impl MessageKind {
    #[inline]
    pub fn from_status(status: u8) -> Self {
        match status & 0xF0 {
            0x80 => MessageKind::NoteOff,
            0x90 => MessageKind::NoteOn,
            0xA0 => MessageKind::PolyPressure,
            0xB0 => MessageKind::ControlChange,
            0xC0 => MessageKind::ProgramChange,
            0xD0 => MessageKind::ChannelPressure,
            0xE0 => MessageKind::PitchBend,
            _ => MessageKind::System,
        }
    }
}

/// One raw MIDI message triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawMidiMessage {
    pub status: u8,
    pub data1: u8,
    pub data2: u8,
}

impl RawMidiMessage {
    #[inline]
    pub fn new(status: u8, data1: u8, data2: u8) -> Self {
        Self {
            status,
            data1,
            data2,
        }
    }

    /// `channel` is 0-based (0-15).
    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(0x90 | channel.min(15), note & 0x7F, velocity & 0x7F)
    }

    /// `channel` is 0-based (0-15).
    pub fn note_off(channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(0x80 | channel.min(15), note & 0x7F, velocity & 0x7F)
    }

    /// `channel` is 0-based (0-15).
    pub fn control_change(channel: u8, control: u8, value: u8) -> Self {
        Self::new(0xB0 | channel.min(15), control & 0x7F, value & 0x7F)
    }

    /// Parse a message received from a port.
    ///
    /// Returns `Ok(None)` for well-formed messages no controller element can
    /// send: system messages, channel mode messages (CC 120-127) and the
    /// 14-bit forms.
    pub fn from_bytes(bytes: &[u8]) -> Result<Option<Self>> {
        if bytes.is_empty() {
            return Err(Error::MalformedMessage("empty message".to_string()));
        }

        let (msg, _len) = MidiMsg::from_midi(bytes)
            .map_err(|e| Error::MalformedMessage(format!("{e:?} in {bytes:02x?}")))?;
        let MidiMsg::ChannelVoice { channel, msg } = msg else {
            return Ok(None);
        };

        let channel = channel as u8;
        let message = match msg {
            ChannelVoiceMsg::NoteOn { note, velocity } => Self::note_on(channel, note, velocity),
            ChannelVoiceMsg::NoteOff { note, velocity } => {
                Self::note_off(channel, note, velocity)
            }
            ChannelVoiceMsg::PolyPressure { note, pressure } => {
                Self::new(0xA0 | channel, note, pressure)
            }
            ChannelVoiceMsg::ControlChange {
                control: ControlChange::CC { control, value },
            } => Self::control_change(channel, control, value),
            ChannelVoiceMsg::ProgramChange { program } => Self::new(0xC0 | channel, program, 0),
            ChannelVoiceMsg::ChannelPressure { pressure } => {
                Self::new(0xD0 | channel, pressure, 0)
            }
            ChannelVoiceMsg::PitchBend { bend } => {
                Self::new(0xE0 | channel, (bend & 0x7F) as u8, (bend >> 7) as u8)
            }
            ChannelVoiceMsg::HighResNoteOn { .. }
            | ChannelVoiceMsg::HighResNoteOff { .. }
            | ChannelVoiceMsg::ControlChange { .. } => return Ok(None),
        };
        Ok(Some(message))
    }

    #[inline]
    pub fn kind(&self) -> MessageKind {
        MessageKind::from_status(self.status)
    }

    /// 0-based channel, `None` for system messages.
    #[inline]
    pub fn channel(&self) -> Option<u8> {
        match self.kind() {
            MessageKind::System => None,
            _ => Some(self.status & 0x0F),
        }
    }

    /// The equivalent `midi-msg` message, `None` for system messages.
    pub fn to_midi_msg(&self) -> Option<MidiMsg> {
        let (data1, data2) = (self.data1 & 0x7F, self.data2 & 0x7F);
        let msg = match self.kind() {
            MessageKind::NoteOff => ChannelVoiceMsg::NoteOff {
                note: data1,
                velocity: data2,
            },
            MessageKind::NoteOn => ChannelVoiceMsg::NoteOn {
                note: data1,
                velocity: data2,
            },
            MessageKind::PolyPressure => ChannelVoiceMsg::PolyPressure {
                note: data1,
                pressure: data2,
            },
            MessageKind::ControlChange => ChannelVoiceMsg::ControlChange {
                control: ControlChange::CC {
                    control: data1,
                    value: data2,
                },
            },
            MessageKind::ProgramChange => ChannelVoiceMsg::ProgramChange { program: data1 },
            MessageKind::ChannelPressure => ChannelVoiceMsg::ChannelPressure { pressure: data1 },
            MessageKind::PitchBend => ChannelVoiceMsg::PitchBend {
                bend: (u16::from(data2) << 7) | u16::from(data1),
            },
            MessageKind::System => return None,
        };
        Some(MidiMsg::ChannelVoice {
            channel: Channel::from_u8(self.status & 0x0F),
            msg,
        })
    }

    /// Wire bytes. System messages yield their status byte only.
    pub fn to_bytes(&self) -> MidiBytes {
        match self.to_midi_msg() {
            Some(msg) => MidiBytes::from_vec(msg.to_midi()),
            None => smallvec![self.status],
        }
    }
}
