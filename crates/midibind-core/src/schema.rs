//! Controller schemas: the physical elements a device exposes and how it
//! encodes their state.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Highest id or value a 7-bit MIDI data byte can carry.
pub const MAX_DATA_VALUE: u8 = 127;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Button,
    Knob,
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElementKind::Button => f.write_str("button"),
            ElementKind::Knob => f.write_str("knob"),
        }
    }
}

/// A button or knob on the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerElement {
    /// Note number (buttons) or controller number (knobs) sent by the device.
    pub id: u8,
    pub name: String,
    pub kind: ElementKind,
}

impl ControllerElement {
    pub fn button(id: u8, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: ElementKind::Button,
        }
    }

    pub fn knob(id: u8, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: ElementKind::Knob,
        }
    }
}

/// Static description of a MIDI controller.
///
/// Immutable once loaded. Switching devices replaces the whole schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerSchema {
    pub name: String,
    /// Value sent when a button is released.
    pub button_value_off: u8,
    /// Value sent when a button is pressed.
    pub button_value_on: u8,
    pub knob_value_min: u8,
    pub knob_value_max: u8,
    /// 1-based channel (1-16) the device sends on.
    pub default_channel: u8,
    #[serde(default)]
    pub preferred_midi_in: Option<String>,
    #[serde(default)]
    pub preferred_midi_out: Option<String>,
    pub elements: Vec<ControllerElement>,
}

impl ControllerSchema {
    pub fn buttons(&self) -> impl Iterator<Item = &ControllerElement> {
        self.elements
            .iter()
            .filter(|e| e.kind == ElementKind::Button)
    }

    pub fn knobs(&self) -> impl Iterator<Item = &ControllerElement> {
        self.elements.iter().filter(|e| e.kind == ElementKind::Knob)
    }

    pub fn has_element(&self, id: u8, kind: ElementKind) -> bool {
        self.elements.iter().any(|e| e.id == id && e.kind == kind)
    }

    /// 0-based channel as it appears in the low nibble of a status byte.
    #[inline]
    pub fn channel_index(&self) -> u8 {
        self.default_channel.saturating_sub(1)
    }

    /// Check every structural rule a loaded schema must satisfy.
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::InvalidSchema("name cannot be empty".to_string()));
        }

        for (field, value) in [
            ("button_value_off", self.button_value_off),
            ("button_value_on", self.button_value_on),
            ("knob_value_min", self.knob_value_min),
            ("knob_value_max", self.knob_value_max),
        ] {
            if value > MAX_DATA_VALUE {
                return Err(Error::InvalidSchema(format!(
                    "{field}={value} is outside [0, {MAX_DATA_VALUE}]"
                )));
            }
        }

        if !(1..=16).contains(&self.default_channel) {
            return Err(Error::InvalidSchema(format!(
                "default_channel={} is outside [1, 16]",
                self.default_channel
            )));
        }

        if self.button_value_off == self.button_value_on {
            return Err(Error::InvalidSchema(
                "button_value_off and button_value_on are equal".to_string(),
            ));
        }

        if self.knob_value_min >= self.knob_value_max {
            return Err(Error::InvalidSchema(
                "knob_value_min must be smaller than knob_value_max".to_string(),
            ));
        }

        for kind in [ElementKind::Button, ElementKind::Knob] {
            let mut ids = HashSet::new();
            let mut names = HashSet::new();
            for element in self.elements.iter().filter(|e| e.kind == kind) {
                if element.id > MAX_DATA_VALUE {
                    return Err(Error::InvalidSchema(format!(
                        "{kind} '{}' has id={} outside [0, {MAX_DATA_VALUE}]",
                        element.name, element.id
                    )));
                }
                if element.name.is_empty() {
                    return Err(Error::InvalidSchema(format!(
                        "{kind} with id={} has an empty name",
                        element.id
                    )));
                }
                if !ids.insert(element.id) {
                    return Err(Error::InvalidSchema(format!(
                        "id={} was used for multiple {kind}s",
                        element.id
                    )));
                }
                if !names.insert(element.name.as_str()) {
                    return Err(Error::InvalidSchema(format!(
                        "name={} was used for multiple {kind}s",
                        element.name
                    )));
                }
            }
        }

        // Notes dispatch to buttons and CCs to knobs, but a shared id makes
        // the schema ambiguous to anyone editing binds for it.
        if let Some(shared) = self
            .buttons()
            .find(|b| self.has_element(b.id, ElementKind::Knob))
        {
            return Err(Error::InvalidSchema(format!(
                "id={} is used by both a button and a knob",
                shared.id
            )));
        }

        Ok(())
    }
}
