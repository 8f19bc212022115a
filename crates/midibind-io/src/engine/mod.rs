//! Lifecycle controller.
//!
//! [`MidiBindEngine`] owns at most one dispatch session. `start`, `stop` and
//! `restart` are serialized by a single lock; a transition that finds the
//! lock taken is rejected instead of queued.

mod builder;
mod config;
pub(crate) mod status;

pub use builder::EngineBuilder;
pub use config::EngineConfig;
pub use status::{DispatchStats, EngineReport, EngineStatus};

use std::sync::Arc;

use arc_swap::ArcSwap;
use crossbeam_channel::Receiver;
use midibind_core::{ActionInvoker, BindsSet, ControllerSchema};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::dispatch::{DispatchConfig, DispatchSession, Dispatcher, SessionParams, SpawnError};
use crate::error::{Error, Result};
use crate::port::{MidiInputDevice, PortProvider};
use status::{ReportSender, StatsCounters};

/// Listens to one MIDI input and turns controller gestures into actions.
///
/// Cloning is cheap; clones share the same session. The session is stopped
/// when the last clone is dropped.
///
/// ```ignore
/// let ports = VirtualPortProvider::new();
/// let pad = ports.create_port("Pad");
///
/// let engine = MidiBindEngine::builder()
///     .virtual_ports(ports.clone())
///     .on_action(|action| {
///         println!("{action}");
///         Ok(())
///     })
///     .build()?;
///
/// engine.start(&schema, &binds, "Pad")?;
/// pad.send(&[0x9A, 8, 127]);
/// engine.stop()?;
/// ```
#[derive(Clone)]
pub struct MidiBindEngine {
    inner: Arc<EngineInner>,
}

pub(crate) struct EngineInner {
    provider: Arc<dyn PortProvider>,
    invoker: Arc<dyn ActionInvoker>,
    config: EngineConfig,
    session: Mutex<Option<DispatchSession>>,
    status: Arc<ArcSwap<EngineStatus>>,
    connected_port: ArcSwap<Option<String>>,
    stats: ArcSwap<StatsCounters>,
    report_tx: ReportSender,
    report_rx: Receiver<EngineReport>,
}

impl MidiBindEngine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Open `port_name` and start dispatching.
    ///
    /// Returns once the port is open. Fails with
    /// [`Error::ConcurrentLifecycleRequest`] if a session is already live or
    /// another transition is in progress, and with
    /// [`Error::PortUnavailable`] if the port cannot be opened within the
    /// configured timeout. A failed start leaves the engine idle.
    ///
    /// After a timeout the abandoned open keeps its thread until the provider
    /// returns. Until then `start` is rejected; `stop` and `restart` wait
    /// for it.
    pub fn start(
        &self,
        schema: &ControllerSchema,
        binds: &BindsSet,
        port_name: &str,
    ) -> Result<()> {
        let mut slot = self
            .inner
            .session
            .try_lock()
            .ok_or(Error::ConcurrentLifecycleRequest)?;

        // Only a port fault writes Error, and the faulted thread is on its way out.
        let faulted = matches!(**self.inner.status.load(), EngineStatus::Error(_));
        if !faulted && slot.as_ref().is_some_and(|session| !session.is_finished()) {
            return Err(Error::ConcurrentLifecycleRequest);
        }
        // A session that ended on a port fault still needs joining.
        if let Some(stale) = slot.take() {
            stale.stop();
        }

        self.spawn_session(&mut slot, schema, binds, port_name)
    }

    /// [`start`](Self::start) on the schema's preferred input.
    pub fn start_preferred(&self, schema: &ControllerSchema, binds: &BindsSet) -> Result<()> {
        let port_name = schema.preferred_midi_in.as_deref().ok_or_else(|| {
            Error::PortUnavailable(format!(
                "controller '{}' has no preferred MIDI input",
                schema.name
            ))
        })?;
        self.start(schema, binds, port_name)
    }

    /// Stop the session, close its port and join its thread.
    ///
    /// Succeeds on an idle engine. Always leaves the status `Idle`.
    pub fn stop(&self) -> Result<()> {
        let mut slot = self
            .inner
            .session
            .try_lock()
            .ok_or(Error::ConcurrentLifecycleRequest)?;

        self.stop_session(&mut slot);
        Ok(())
    }

    /// Tear down the current session, if any, then start a new one with a
    /// fresh knob state.
    pub fn restart(
        &self,
        schema: &ControllerSchema,
        binds: &BindsSet,
        port_name: &str,
    ) -> Result<()> {
        let mut slot = self
            .inner
            .session
            .try_lock()
            .ok_or(Error::ConcurrentLifecycleRequest)?;

        self.stop_session(&mut slot);
        self.spawn_session(&mut slot, schema, binds, port_name)
    }

    pub fn status(&self) -> EngineStatus {
        self.inner.status.load().as_ref().clone()
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.inner.status.load().is_running()
    }

    /// Counters of the current (or last) session.
    pub fn stats(&self) -> DispatchStats {
        self.inner.stats.load().snapshot()
    }

    /// Asynchronous problems raised by the dispatch thread.
    pub fn reports(&self) -> Receiver<EngineReport> {
        self.inner.report_rx.clone()
    }

    /// Name of the port the running session opened.
    pub fn active_port(&self) -> Option<String> {
        self.inner.connected_port.load().as_ref().clone()
    }

    pub fn list_input_ports(&self) -> Vec<MidiInputDevice> {
        self.inner.provider.list_inputs()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    fn spawn_session(
        &self,
        slot: &mut Option<DispatchSession>,
        schema: &ControllerSchema,
        binds: &BindsSet,
        port_name: &str,
    ) -> Result<()> {
        schema.validate()?;

        let stats = Arc::new(StatsCounters::default());
        self.inner.stats.store(stats.clone());

        let dispatcher = Dispatcher::new(
            DispatchConfig::new(schema, binds),
            self.inner.invoker.clone(),
            self.inner.report_tx.clone(),
            stats,
        );
        let params = SessionParams {
            provider: self.inner.provider.clone(),
            port_name: port_name.to_string(),
            dispatcher,
            status: self.inner.status.clone(),
            check_interval: self.inner.config.port_check_interval,
        };

        let before = self.inner.status.load_full();
        match DispatchSession::spawn(params, self.inner.config.open_timeout) {
            Ok(session) => {
                // The thread may already have faulted; keep its Error.
                self.inner
                    .status
                    .compare_and_swap(&before, Arc::new(EngineStatus::Running));
                self.inner
                    .connected_port
                    .store(Arc::new(Some(session.port_name().to_string())));
                info!(
                    port = %session.port_name(),
                    controller = %schema.name,
                    binds = %binds.name,
                    "MIDI bind engine started"
                );
                *slot = Some(session);
                Ok(())
            }
            Err(SpawnError { error, abandoned }) => {
                warn!(port = %port_name, "failed to start MIDI bind engine: {error}");
                self.inner.status.store(Arc::new(EngineStatus::Idle));
                // Held until joined so no second session can start beside it.
                *slot = abandoned;
                Err(error)
            }
        }
    }

    fn stop_session(&self, slot: &mut Option<DispatchSession>) {
        if let Some(session) = slot.take() {
            let port = session.port_name().to_string();
            session.stop();
            info!(port = %port, "MIDI bind engine stopped");
        }
        self.inner.status.store(Arc::new(EngineStatus::Idle));
        self.inner.connected_port.store(Arc::new(None));
    }
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.stop();
        }
    }
}

impl std::fmt::Debug for MidiBindEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidiBindEngine")
            .field("status", &self.status())
            .field("active_port", &self.active_port())
            .field("config", &self.inner.config)
            .finish()
    }
}
