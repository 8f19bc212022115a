//! Turns raw MIDI messages into semantic controller events.
//!
//! Classification is total: anything that is not a Note or Control Change on
//! the schema's channel, for an element the schema defines, becomes
//! [`SemanticEvent::Ignored`].

use crate::index::SchemaIndex;
use crate::message::{MessageKind, RawMidiMessage};
use crate::schema::ElementKind;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnobDirection {
    Increase,
    Decrease,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemanticEvent {
    ButtonPressed(u8),
    ButtonReleased(u8),
    KnobIncreased(u8),
    KnobDecreased(u8),
    Ignored,
}

impl SemanticEvent {
    #[inline]
    pub fn is_ignored(&self) -> bool {
        matches!(self, SemanticEvent::Ignored)
    }

    /// Id of the element the event concerns.
    pub fn element_id(&self) -> Option<u8> {
        match *self {
            SemanticEvent::ButtonPressed(id)
            | SemanticEvent::ButtonReleased(id)
            | SemanticEvent::KnobIncreased(id)
            | SemanticEvent::KnobDecreased(id) => Some(id),
            SemanticEvent::Ignored => None,
        }
    }

    fn knob(id: u8, direction: KnobDirection) -> Self {
        match direction {
            KnobDirection::Increase => SemanticEvent::KnobIncreased(id),
            KnobDirection::Decrease => SemanticEvent::KnobDecreased(id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct KnobReading {
    value: u8,
    /// Direction of the last event this knob emitted.
    direction: Option<KnobDirection>,
}

/// Last raw value seen per knob. Owned by one dispatch session.
#[derive(Debug, Clone, Default)]
pub struct KnobState {
    readings: HashMap<u8, KnobReading>,
}

impl KnobState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_value(&self, knob_id: u8) -> Option<u8> {
        self.readings.get(&knob_id).map(|r| r.value)
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn clear(&mut self) {
        self.readings.clear();
    }
}

/// Classify one message against `index`, updating `knobs`.
///
/// `knobs` is only touched for Control Change messages addressed to a knob
/// the schema defines.
pub fn classify(
    message: &RawMidiMessage,
    index: &SchemaIndex,
    knobs: &mut KnobState,
) -> SemanticEvent {
    let schema = index.schema();
    if message.channel() != Some(schema.channel_index()) {
        return SemanticEvent::Ignored;
    }

    let id = message.data1;
    let value = message.data2;

    match message.kind() {
        MessageKind::NoteOn | MessageKind::NoteOff => {
            if index.lookup(id, ElementKind::Button).is_none() {
                return SemanticEvent::Ignored;
            }
            let pressed = classify_button(
                message.kind(),
                value,
                schema.button_value_on,
                schema.button_value_off,
            );
            if pressed {
                SemanticEvent::ButtonPressed(id)
            } else {
                SemanticEvent::ButtonReleased(id)
            }
        }
        MessageKind::ControlChange => {
            if index.lookup(id, ElementKind::Knob).is_none() {
                return SemanticEvent::Ignored;
            }
            classify_knob(id, value, schema.knob_value_min, schema.knob_value_max, knobs)
        }
        _ => SemanticEvent::Ignored,
    }
}

/// Returns `true` for a press.
fn classify_button(kind: MessageKind, value: u8, on: u8, off: u8) -> bool {
    if kind == MessageKind::NoteOff {
        return false;
    }
    if value == on {
        return true;
    }
    if value == off || value == 0 {
        return false;
    }
    // Hardware drift: pick whichever convention the value is closest to.
    value.abs_diff(on) <= value.abs_diff(off)
}

fn classify_knob(
    id: u8,
    value: u8,
    min: u8,
    max: u8,
    knobs: &mut KnobState,
) -> SemanticEvent {
    let previous = knobs.readings.get(&id).copied();
    let reading = knobs.readings.entry(id).or_insert(KnobReading {
        value,
        direction: None,
    });
    reading.value = value;

    let Some(previous) = previous else {
        // First observation only establishes the baseline.
        return SemanticEvent::Ignored;
    };
    if value == previous.value {
        return SemanticEvent::Ignored;
    }

    let up_wrap = previous.value == max && value == min;
    let down_wrap = previous.value == min && value == max;

    // A knob only sits on min after rising (or on max after falling) by
    // wrapping, so crossing back over the wrap point is a reversal.
    let direction = match previous.direction {
        Some(KnobDirection::Increase) if up_wrap => KnobDirection::Increase,
        Some(KnobDirection::Increase) if down_wrap => KnobDirection::Decrease,
        Some(KnobDirection::Decrease) if down_wrap => KnobDirection::Decrease,
        Some(KnobDirection::Decrease) if up_wrap => KnobDirection::Increase,
        _ if value > previous.value => KnobDirection::Increase,
        _ => KnobDirection::Decrease,
    };
    reading.direction = Some(direction);

    SemanticEvent::knob(id, direction)
}
