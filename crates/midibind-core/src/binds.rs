//! Binds sets: which application action each controller element triggers.

use crate::error::{Error, Result};
use crate::schema::{ControllerSchema, ElementKind, MAX_DATA_VALUE};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

/// Identifier of an application command, as understood by the action invoker.
pub type ActionId = String;

/// Action run when a button is pressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonBind {
    pub button_id: u8,
    pub action_id: ActionId,
}

/// Actions run when a knob turns. Either direction may be left unbound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnobBind {
    pub knob_id: u8,
    #[serde(default)]
    pub action_id_increase: Option<ActionId>,
    #[serde(default)]
    pub action_id_decrease: Option<ActionId>,
}

/// A user's binds for one application and one controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindsSet {
    pub name: String,
    pub app_name: String,
    /// Name of the [`ControllerSchema`] these binds are meant for.
    pub controller_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub button_binds: Vec<ButtonBind>,
    #[serde(default)]
    pub knob_binds: Vec<KnobBind>,
}

impl BindsSet {
    pub fn new(
        name: impl Into<String>,
        app_name: impl Into<String>,
        controller_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            app_name: app_name.into(),
            controller_name: controller_name.into(),
            description: None,
            button_binds: Vec::new(),
            knob_binds: Vec::new(),
        }
    }

    pub fn with_button(mut self, button_id: u8, action_id: impl Into<ActionId>) -> Self {
        self.button_binds.push(ButtonBind {
            button_id,
            action_id: action_id.into(),
        });
        self
    }

    pub fn with_knob(
        mut self,
        knob_id: u8,
        increase: Option<&str>,
        decrease: Option<&str>,
    ) -> Self {
        self.knob_binds.push(KnobBind {
            knob_id,
            action_id_increase: increase.map(str::to_string),
            action_id_decrease: decrease.map(str::to_string),
        });
        self
    }

    /// Check the binds on their own, without a schema.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("name", &self.name),
            ("app_name", &self.app_name),
            ("controller_name", &self.controller_name),
        ] {
            if value.is_empty() {
                return Err(Error::InvalidBinds(format!("{field} cannot be empty")));
            }
        }

        let mut seen = HashSet::new();
        for bind in &self.button_binds {
            if bind.button_id > MAX_DATA_VALUE {
                return Err(Error::InvalidBinds(format!(
                    "button id={} is outside [0, {MAX_DATA_VALUE}]",
                    bind.button_id
                )));
            }
            if !seen.insert(bind.button_id) {
                return Err(Error::InvalidBinds(format!(
                    "button id={} was bound to multiple actions",
                    bind.button_id
                )));
            }
        }

        seen.clear();
        for bind in &self.knob_binds {
            if bind.knob_id > MAX_DATA_VALUE {
                return Err(Error::InvalidBinds(format!(
                    "knob id={} is outside [0, {MAX_DATA_VALUE}]",
                    bind.knob_id
                )));
            }
            if !seen.insert(bind.knob_id) {
                return Err(Error::InvalidBinds(format!(
                    "knob id={} was bound to multiple actions",
                    bind.knob_id
                )));
            }
        }

        Ok(())
    }

    /// Check that the binds fit `schema`: same controller, and every bound
    /// element exists on it with the right kind.
    pub fn validate_against(&self, schema: &ControllerSchema) -> Result<()> {
        if self.controller_name != schema.name {
            return Err(Error::ControllerMismatch {
                binds: self.name.clone(),
                expected: self.controller_name.clone(),
                found: schema.name.clone(),
            });
        }

        if let Some(bind) = self
            .button_binds
            .iter()
            .find(|b| !schema.has_element(b.button_id, ElementKind::Button))
        {
            return Err(Error::InvalidBinds(format!(
                "bound button id={} is not on controller '{}'",
                bind.button_id, schema.name
            )));
        }

        if let Some(bind) = self
            .knob_binds
            .iter()
            .find(|b| !schema.has_element(b.knob_id, ElementKind::Knob))
        {
            return Err(Error::InvalidBinds(format!(
                "bound knob id={} is not on controller '{}'",
                bind.knob_id, schema.name
            )));
        }

        Ok(())
    }

    /// Drop every bind whose action is missing from the application's catalog.
    ///
    /// Unknown actions are not fatal: they are logged and unbound. Returns the
    /// ids that were dropped, in bind order.
    pub fn retain_known_actions<S: AsRef<str>>(&mut self, catalog: &[S]) -> Vec<ActionId> {
        let known: HashSet<&str> = catalog.iter().map(AsRef::as_ref).collect();
        let mut dropped = Vec::new();

        self.button_binds.retain(|bind| {
            let keep = known.contains(bind.action_id.as_str());
            if !keep {
                warn!("bound action '{}' cannot be found", bind.action_id);
                dropped.push(bind.action_id.clone());
            }
            keep
        });

        for bind in &mut self.knob_binds {
            for slot in [&mut bind.action_id_increase, &mut bind.action_id_decrease] {
                if slot.as_deref().is_some_and(|id| !known.contains(id)) {
                    if let Some(action_id) = slot.take() {
                        warn!("bound action '{}' cannot be found", action_id);
                        dropped.push(action_id);
                    }
                }
            }
        }
        self.knob_binds
            .retain(|bind| bind.action_id_increase.is_some() || bind.action_id_decrease.is_some());

        dropped
    }
}
