//! Core types for midibind.
//!
//! Controller schemas and binds sets, raw MIDI parsing, and the pure half of
//! the dispatch pipeline: classify a message against a [`SchemaIndex`], then
//! resolve the resulting [`SemanticEvent`] through a [`BindResolver`].
//!
//! Threads, ports and lifecycle live in `midibind-io`.

pub mod error;
pub use error::{Error, Result};

pub mod action;
pub use action::{ActionError, ActionInvoker};

pub mod binds;
pub use binds::{ActionId, BindsSet, ButtonBind, KnobBind};

pub mod classify;
pub use classify::{classify, KnobDirection, KnobState, SemanticEvent};

pub mod index;
pub use index::SchemaIndex;

pub mod message;
pub use message::{MessageKind, MidiBytes, RawMidiMessage};

pub mod resolve;
pub use resolve::BindResolver;

pub mod schema;
pub use schema::{ControllerElement, ControllerSchema, ElementKind};
