//! Constant-time lookup from raw element id to schema element.

use crate::schema::{ControllerElement, ControllerSchema, ElementKind};

const ID_SLOTS: usize = 128;

/// Read-only view of a [`ControllerSchema`] built once per dispatch session.
///
/// Indexed by the 7-bit id carried in `data1`, one table per element kind.
#[derive(Debug, Clone)]
pub struct SchemaIndex {
    schema: ControllerSchema,
    buttons: [Option<usize>; ID_SLOTS],
    knobs: [Option<usize>; ID_SLOTS],
}

impl SchemaIndex {
    pub fn new(schema: &ControllerSchema) -> Self {
        let mut buttons = [None; ID_SLOTS];
        let mut knobs = [None; ID_SLOTS];

        for (position, element) in schema.elements.iter().enumerate() {
            let table = match element.kind {
                ElementKind::Button => &mut buttons,
                ElementKind::Knob => &mut knobs,
            };
            // Out-of-range ids can never arrive in a data byte; duplicates keep
            // the first definition.
            if let Some(slot) = table.get_mut(element.id as usize) {
                slot.get_or_insert(position);
            }
        }

        Self {
            schema: schema.clone(),
            buttons,
            knobs,
        }
    }

    #[inline]
    pub fn lookup(&self, raw_id: u8, kind: ElementKind) -> Option<&ControllerElement> {
        let table = match kind {
            ElementKind::Button => &self.buttons,
            ElementKind::Knob => &self.knobs,
        };
        table
            .get(raw_id as usize)
            .copied()
            .flatten()
            .and_then(|position| self.schema.elements.get(position))
    }

    pub fn schema(&self) -> &ControllerSchema {
        &self.schema
    }
}
