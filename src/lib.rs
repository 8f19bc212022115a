//! # midibind - MIDI controller bindings
//!
//! Turns buttons and knobs on a MIDI controller into application actions.
//!
//! ## Architecture
//!
//! midibind is an umbrella crate over:
//! - **midibind-core** - Controller schemas, binds sets, message parsing,
//!   classification and bind resolution (no threads, no I/O)
//! - **midibind-io** - Input ports, the dispatch loop and the engine lifecycle
//!
//! Two declarative records drive the engine. A [`ControllerSchema`] says
//! which elements a device has and how it encodes them; a [`BindsSet`] says
//! which action each element triggers. Loading them (YAML or otherwise) is
//! the caller's business; both derive serde.
//!
//! ## Quick Start
//!
//! ```ignore
//! use midibind::prelude::*;
//!
//! let engine = MidiBindEngine::builder()
//!     .midi_io()
//!     .on_action(|action_id| {
//!         println!("run {action_id}");
//!         Ok(())
//!     })
//!     .build()?;
//!
//! engine.start(&schema, &binds, "X-TOUCH MINI")?;
//! // ... later, with edited binds
//! engine.restart(&schema, &new_binds, "X-TOUCH MINI")?;
//! engine.stop()?;
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - Hardware MIDI input
//! - `midi-io` - Hardware MIDI input through midir

/// Re-export of midibind-core for direct access
pub use midibind_core as core;
/// Re-export of midibind-io for direct access
pub use midibind_io as io;

// Model
pub use midibind_core::{
    ActionId, BindsSet, ButtonBind, ControllerElement, ControllerSchema, ElementKind, KnobBind,
};

// Pipeline
pub use midibind_core::{
    classify, BindResolver, KnobDirection, KnobState, MessageKind, RawMidiMessage, SchemaIndex,
    SemanticEvent,
};

// Actions
pub use midibind_core::{ActionError, ActionInvoker};

// Engine
pub use midibind_io::{
    DispatchStats, EngineBuilder, EngineConfig, EngineReport, EngineStatus, MidiBindEngine,
};

// Ports
#[cfg(feature = "midi-io")]
pub use midibind_io::MidirPortProvider;
pub use midibind_io::{
    find_port, InputConnection, InputSink, MidiInputDevice, PortProvider, VirtualPort,
    VirtualPortProvider,
};

mod error;
pub use error::{Error, Result};

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        ActionError, BindsSet, ControllerSchema, EngineReport, EngineStatus, Error,
        MidiBindEngine, Result, VirtualPortProvider,
    };

    #[cfg(feature = "midi-io")]
    pub use crate::MidirPortProvider;
}
