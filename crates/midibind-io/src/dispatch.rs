//! The dispatch loop: one background thread per session.
//!
//! The thread opens the input port, then blocks on whichever comes first of
//! the next message and a stop signal. Each message is classified, resolved
//! and its action invoked before the next one is taken, so actions run one at
//! a time in device order.

use crate::engine::status::{EngineReport, EngineStatus, ReportSender, StatsCounters};
use crate::error::{Error, Result};
use crate::port::{InputSink, PortProvider};
use arc_swap::ArcSwap;
use crossbeam_channel::{
    bounded, select, tick, unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError,
};
use midibind_core::{
    classify, ActionInvoker, BindResolver, BindsSet, ControllerSchema, KnobState, RawMidiMessage,
    SchemaIndex,
};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Immutable schema and binds snapshot read by one session.
pub(crate) struct DispatchConfig {
    index: SchemaIndex,
    resolver: BindResolver,
}

impl DispatchConfig {
    pub(crate) fn new(schema: &ControllerSchema, binds: &BindsSet) -> Self {
        if binds.controller_name != schema.name {
            warn!(
                binds = %binds.name,
                controller = %schema.name,
                "binds were made for controller '{}'",
                binds.controller_name
            );
        }
        Self {
            index: SchemaIndex::new(schema),
            resolver: BindResolver::new(binds),
        }
    }
}

/// Classify → resolve → invoke for one session. Owns the session's knob state.
pub(crate) struct Dispatcher {
    config: DispatchConfig,
    knobs: KnobState,
    invoker: Arc<dyn ActionInvoker>,
    reports: ReportSender,
    stats: Arc<StatsCounters>,
}

impl Dispatcher {
    pub(crate) fn new(
        config: DispatchConfig,
        invoker: Arc<dyn ActionInvoker>,
        reports: ReportSender,
        stats: Arc<StatsCounters>,
    ) -> Self {
        Self {
            config,
            knobs: KnobState::new(),
            invoker,
            reports,
            stats,
        }
    }

    pub(crate) fn handle(&mut self, bytes: &[u8]) {
        StatsCounters::bump(&self.stats.received);

        let message = match RawMidiMessage::from_bytes(bytes) {
            Ok(Some(message)) => message,
            Ok(None) => {
                StatsCounters::bump(&self.stats.ignored);
                trace!(?bytes, "not a controller message");
                return;
            }
            Err(e) => {
                StatsCounters::bump(&self.stats.malformed);
                debug!(?bytes, "{e}");
                return;
            }
        };

        let event = classify(&message, &self.config.index, &mut self.knobs);
        if event.is_ignored() {
            StatsCounters::bump(&self.stats.ignored);
            trace!(?message, "ignored");
            return;
        }

        let Some(action_id) = self.config.resolver.resolve(&event) else {
            StatsCounters::bump(&self.stats.unbound);
            debug!(?event, "no action bound");
            return;
        };

        let invoker = &self.invoker;
        match catch_unwind(AssertUnwindSafe(|| invoker.invoke(action_id))) {
            Ok(Ok(())) => {
                StatsCounters::bump(&self.stats.invoked);
                debug!(?event, action_id, "action invoked");
            }
            Ok(Err(e)) => {
                StatsCounters::bump(&self.stats.failed);
                warn!(action_id, "action failed: {e}");
                self.reports.send(EngineReport::ActionFailed {
                    action_id: action_id.to_string(),
                    reason: e.to_string(),
                });
            }
            Err(panic) => {
                StatsCounters::bump(&self.stats.failed);
                let reason = panic_message(panic.as_ref());
                warn!(action_id, "action panicked: {reason}");
                self.reports.send(EngineReport::ActionFailed {
                    action_id: action_id.to_string(),
                    reason,
                });
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn knobs(&self) -> &KnobState {
        &self.knobs
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

/// Everything a session thread needs, moved into it at spawn.
pub(crate) struct SessionParams {
    pub(crate) provider: Arc<dyn PortProvider>,
    pub(crate) port_name: String,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) status: Arc<ArcSwap<EngineStatus>>,
    pub(crate) check_interval: Duration,
}

/// Handle to a running dispatch thread.
pub(crate) struct DispatchSession {
    port_name: String,
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// Why a session failed to start.
pub(crate) struct SpawnError {
    pub(crate) error: Error,
    /// Session whose port open outlived the timeout. Already told to stop,
    /// it exits once the provider's open call returns, and must be joined
    /// before another session starts.
    pub(crate) abandoned: Option<DispatchSession>,
}

impl From<Error> for SpawnError {
    fn from(error: Error) -> Self {
        Self {
            error,
            abandoned: None,
        }
    }
}

impl DispatchSession {
    /// Spawn the session thread and wait, at most `open_timeout`, for its
    /// port to open.
    pub(crate) fn spawn(
        params: SessionParams,
        open_timeout: Duration,
    ) -> std::result::Result<Self, SpawnError> {
        let requested = params.port_name.clone();
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (ready_tx, ready_rx) = bounded::<Result<String>>(1);

        let handle = thread::Builder::new()
            .name("midibind-dispatch".to_string())
            .spawn(move || run_session(params, stop_rx, ready_tx))
            .map_err(|e| Error::MidiDevice(format!("failed to spawn dispatch thread: {e}")))?;

        match ready_rx.recv_timeout(open_timeout) {
            Ok(Ok(port_name)) => Ok(Self {
                port_name,
                stop_tx,
                handle,
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e.into())
            }
            Err(RecvTimeoutError::Timeout) => {
                let _ = stop_tx.try_send(());
                warn!(port = %requested, ?open_timeout, "timed out opening MIDI input");
                Err(SpawnError {
                    error: Error::PortUnavailable(format!(
                        "timed out opening '{requested}' after {open_timeout:?}"
                    )),
                    abandoned: Some(Self {
                        port_name: requested,
                        stop_tx,
                        handle,
                    }),
                })
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = handle.join();
                Err(Error::MidiDevice(format!(
                    "dispatch thread exited before opening '{requested}'"
                ))
                .into())
            }
        }
    }

    pub(crate) fn port_name(&self) -> &str {
        &self.port_name
    }

    /// The thread has exited (port fault, or an abandoned open finished).
    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signal the thread and wait for it to close the port and exit.
    pub(crate) fn stop(self) {
        let Self {
            port_name,
            stop_tx,
            handle,
        } = self;

        let _ = stop_tx.try_send(());
        drop(stop_tx);
        if handle.join().is_err() {
            warn!(port = %port_name, "dispatch thread panicked");
        }
    }
}

fn run_session(params: SessionParams, stop_rx: Receiver<()>, ready_tx: Sender<Result<String>>) {
    let SessionParams {
        provider,
        port_name: requested,
        mut dispatcher,
        status,
        check_interval,
    } = params;

    let (msg_tx, msg_rx) = unbounded();
    let connection = match provider.open_input(&requested, InputSink::new(msg_tx)) {
        Ok(connection) => connection,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };
    let port_name = connection.port_name().to_string();
    if ready_tx.send(Ok(port_name.clone())).is_err() {
        // `start` gave up waiting for this open.
        debug!(port = %port_name, "open completed after timeout, closing");
        connection.close();
        return;
    }
    info!(port = %port_name, "dispatch session started");

    let port_check = tick(check_interval);
    let fault = |reason: String, dispatcher: &Dispatcher| {
        warn!(port = %port_name, "{reason}");
        status.store(Arc::new(EngineStatus::Error(reason.clone())));
        dispatcher.reports.send(EngineReport::PortClosed {
            port: port_name.clone(),
            reason,
        });
    };

    loop {
        select! {
            recv(stop_rx) -> _ => break,
            recv(msg_rx) -> msg => {
                let Ok(bytes) = msg else {
                    if matches!(stop_rx.try_recv(), Err(TryRecvError::Empty)) {
                        fault(format!("MIDI input '{port_name}' closed unexpectedly"), &dispatcher);
                    }
                    break;
                };
                dispatcher.handle(&bytes);
            },
            recv(port_check) -> _ => {
                if !connection.is_alive() {
                    fault(format!("MIDI input '{port_name}' disappeared"), &dispatcher);
                    break;
                }
            },
        }
    }

    connection.close();
    info!(port = %port_name, "dispatch session stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use midibind_core::{ActionError, ControllerElement};
    use parking_lot::Mutex;

    fn schema() -> ControllerSchema {
        ControllerSchema {
            name: "Pad".to_string(),
            button_value_off: 0,
            button_value_on: 127,
            knob_value_min: 0,
            knob_value_max: 127,
            default_channel: 1,
            preferred_midi_in: None,
            preferred_midi_out: None,
            elements: vec![
                ControllerElement::button(36, "Pad 1"),
                ControllerElement::button(37, "Pad 2"),
                ControllerElement::knob(70, "Knob 1"),
            ],
        }
    }

    fn binds() -> BindsSet {
        BindsSet::new("Default", "app", "Pad")
            .with_button(36, "play")
            .with_button(37, "broken")
            .with_knob(70, Some("louder"), Some("quieter"))
    }

    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl ActionInvoker for Recorder {
        fn invoke(&self, action_id: &str) -> std::result::Result<(), ActionError> {
            self.calls.lock().push(action_id.to_string());
            match action_id {
                "broken" => Err(ActionError::new("command failed")),
                "explode" => panic!("invoker blew up"),
                _ => Ok(()),
            }
        }
    }

    fn dispatcher(
        binds: BindsSet,
    ) -> (Dispatcher, Arc<Recorder>, Receiver<EngineReport>, Arc<StatsCounters>) {
        let recorder = Arc::new(Recorder {
            calls: Mutex::new(Vec::new()),
        });
        let (tx, rx) = bounded(16);
        let stats = Arc::new(StatsCounters::default());
        let dispatcher = Dispatcher::new(
            DispatchConfig::new(&schema(), &binds),
            recorder.clone(),
            ReportSender::new(tx),
            stats.clone(),
        );
        (dispatcher, recorder, rx, stats)
    }

    #[test]
    fn test_press_invokes_bound_action_once() {
        let (mut dispatcher, recorder, _rx, stats) = dispatcher(binds());
        dispatcher.handle(&[0x90, 36, 127]);
        dispatcher.handle(&[0x80, 36, 0]);

        assert_eq!(*recorder.calls.lock(), vec!["play"]);
        let stats = stats.snapshot();
        assert_eq!(stats.received, 2);
        assert_eq!(stats.invoked, 1);
        assert_eq!(stats.unbound, 1);
    }

    #[test]
    fn test_knob_turns_in_order() {
        let (mut dispatcher, recorder, _rx, _stats) = dispatcher(binds());
        for value in [64, 65, 66, 60] {
            dispatcher.handle(&[0xB0, 70, value]);
        }
        assert_eq!(*recorder.calls.lock(), vec!["louder", "louder", "quieter"]);
        assert_eq!(dispatcher.knobs().last_value(70), Some(60));
    }

    #[test]
    fn test_failure_is_reported_and_dispatch_continues() {
        let (mut dispatcher, recorder, rx, stats) = dispatcher(binds());
        dispatcher.handle(&[0x90, 37, 127]);
        dispatcher.handle(&[0x90, 36, 127]);

        assert_eq!(*recorder.calls.lock(), vec!["broken", "play"]);
        assert_eq!(
            rx.try_recv().unwrap(),
            EngineReport::ActionFailed {
                action_id: "broken".to_string(),
                reason: "command failed".to_string(),
            }
        );
        assert_eq!(stats.snapshot().failed, 1);
    }

    #[test]
    fn test_panicking_action_is_contained() {
        let binds = BindsSet::new("Default", "app", "Pad")
            .with_button(36, "explode")
            .with_button(37, "play");
        let (mut dispatcher, recorder, rx, stats) = dispatcher(binds);
        dispatcher.handle(&[0x90, 36, 127]);
        dispatcher.handle(&[0x90, 37, 127]);

        match rx.try_recv().unwrap() {
            EngineReport::ActionFailed { action_id, reason } => {
                assert_eq!(action_id, "explode");
                assert!(reason.contains("invoker blew up"));
            }
            other => panic!("unexpected report {other:?}"),
        }
        assert_eq!(*recorder.calls.lock(), vec!["explode", "play"]);
        assert_eq!(stats.snapshot().failed, 1);
        assert_eq!(stats.snapshot().invoked, 1);
    }

    #[test]
    fn test_malformed_and_foreign_messages() {
        let (mut dispatcher, recorder, _rx, stats) = dispatcher(binds());
        dispatcher.handle(&[]);
        dispatcher.handle(&[0x90, 36]);
        dispatcher.handle(&[0x91, 36, 127]);
        dispatcher.handle(&[0xF8]);

        assert!(recorder.calls.lock().is_empty());
        let stats = stats.snapshot();
        assert_eq!(stats.malformed, 2);
        assert_eq!(stats.ignored, 2);
    }

    /// Holds its sink for the whole connection, like a midir callback.
    struct UnpluggablePort {
        present: Arc<std::sync::atomic::AtomicBool>,
        sink: Mutex<Option<InputSink>>,
    }

    struct UnpluggableConnection {
        present: Arc<std::sync::atomic::AtomicBool>,
    }

    impl crate::port::InputConnection for UnpluggableConnection {
        fn port_name(&self) -> &str {
            "Pad"
        }

        fn is_alive(&self) -> bool {
            self.present.load(std::sync::atomic::Ordering::SeqCst)
        }

        fn close(self: Box<Self>) {}
    }

    impl PortProvider for UnpluggablePort {
        fn list_inputs(&self) -> Vec<crate::port::MidiInputDevice> {
            Vec::new()
        }

        fn open_input(
            &self,
            _port_name: &str,
            sink: InputSink,
        ) -> Result<Box<dyn crate::port::InputConnection>> {
            *self.sink.lock() = Some(sink);
            Ok(Box::new(UnpluggableConnection {
                present: self.present.clone(),
            }))
        }
    }

    #[test]
    fn test_vanished_port_faults_session() {
        let present = Arc::new(std::sync::atomic::AtomicBool::new(true));
        let port = Arc::new(UnpluggablePort {
            present: present.clone(),
            sink: Mutex::new(None),
        });
        let (dispatcher, _recorder, rx, _stats) = dispatcher(binds());
        let status = Arc::new(ArcSwap::from_pointee(EngineStatus::Running));
        let params = SessionParams {
            provider: port.clone(),
            port_name: "Pad".to_string(),
            dispatcher,
            status: status.clone(),
            check_interval: Duration::from_millis(10),
        };
        let session = DispatchSession::spawn(params, Duration::from_secs(1))
            .unwrap_or_else(|e| panic!("spawn failed: {}", e.error));

        present.store(false, std::sync::atomic::Ordering::SeqCst);
        match rx.recv_timeout(Duration::from_secs(2)).unwrap() {
            EngineReport::PortClosed { port, reason } => {
                assert_eq!(port, "Pad");
                assert!(reason.contains("disappeared"));
            }
            other => panic!("unexpected report {other:?}"),
        }
        assert!(matches!(**status.load(), EngineStatus::Error(_)));
        // The sink is still held, so only the port check could have noticed.
        assert!(port.sink.lock().is_some());
        session.stop();
    }
}
