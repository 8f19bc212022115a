//! Bind resolution: semantic event to bound action id.

use crate::binds::{ActionId, BindsSet};
use crate::classify::SemanticEvent;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct KnobActions {
    increase: Option<ActionId>,
    decrease: Option<ActionId>,
}

/// Lookup tables built from a [`BindsSet`] for one dispatch session.
#[derive(Debug, Clone, Default)]
pub struct BindResolver {
    buttons: HashMap<u8, ActionId>,
    knobs: HashMap<u8, KnobActions>,
}

impl BindResolver {
    /// Later duplicates of an id are ignored; validated binds have none.
    pub fn new(binds: &BindsSet) -> Self {
        let mut buttons = HashMap::with_capacity(binds.button_binds.len());
        for bind in &binds.button_binds {
            buttons
                .entry(bind.button_id)
                .or_insert_with(|| bind.action_id.clone());
        }

        let mut knobs = HashMap::with_capacity(binds.knob_binds.len());
        for bind in &binds.knob_binds {
            knobs.entry(bind.knob_id).or_insert_with(|| KnobActions {
                increase: bind.action_id_increase.clone(),
                decrease: bind.action_id_decrease.clone(),
            });
        }

        Self { buttons, knobs }
    }

    /// Action to run for `event`, if any.
    ///
    /// Button releases never resolve: binds only describe press actions.
    pub fn resolve(&self, event: &SemanticEvent) -> Option<&str> {
        match *event {
            SemanticEvent::ButtonPressed(id) => self.buttons.get(&id).map(String::as_str),
            SemanticEvent::ButtonReleased(_) => None,
            SemanticEvent::KnobIncreased(id) => {
                self.knobs.get(&id).and_then(|k| k.increase.as_deref())
            }
            SemanticEvent::KnobDecreased(id) => {
                self.knobs.get(&id).and_then(|k| k.decrease.as_deref())
            }
            SemanticEvent::Ignored => None,
        }
    }

    pub fn bound_buttons(&self) -> usize {
        self.buttons.len()
    }

    pub fn bound_knobs(&self) -> usize {
        self.knobs.len()
    }
}
