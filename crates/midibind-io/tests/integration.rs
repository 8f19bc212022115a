//! Engine lifecycle and dispatch, driven through virtual ports.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use midibind_core::{ActionError, BindsSet, ControllerElement, ControllerSchema, RawMidiMessage};
use midibind_io::{EngineReport, EngineStatus, Error, MidiBindEngine, VirtualPortProvider};
use parking_lot::Mutex;

const CHANNEL: u8 = 10;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn xtouch() -> ControllerSchema {
    ControllerSchema {
        name: "X-TOUCH MINI".to_string(),
        button_value_off: 0,
        button_value_on: 127,
        knob_value_min: 0,
        knob_value_max: 127,
        default_channel: 11,
        preferred_midi_in: Some("X-TOUCH MINI".to_string()),
        preferred_midi_out: None,
        elements: vec![
            ControllerElement::button(1, "Button 1"),
            ControllerElement::button(2, "Button 2"),
            ControllerElement::knob(1, "Knob 1"),
        ],
    }
}

fn binds() -> BindsSet {
    BindsSet::new("Default", "Player", "X-TOUCH MINI")
        .with_button(1, "play")
        .with_button(2, "fail")
        .with_knob(1, Some("volume_up"), Some("volume_down"))
}

#[derive(Clone, Default)]
struct Calls(Arc<Mutex<Vec<String>>>);

impl Calls {
    fn get(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    fn len(&self) -> usize {
        self.0.lock().len()
    }
}

fn setup() -> (MidiBindEngine, VirtualPortProvider, Calls) {
    init_tracing();
    let ports = VirtualPortProvider::new();
    let calls = Calls::default();
    let recorded = calls.clone();
    let engine = MidiBindEngine::builder()
        .virtual_ports(ports.clone())
        .on_action(move |action_id| {
            recorded.0.lock().push(action_id.to_string());
            if action_id == "fail" {
                return Err(ActionError::new("command exited with status 1"));
            }
            Ok(())
        })
        .build()
        .unwrap();
    (engine, ports, calls)
}

fn wait_for(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_button_press_invokes_action_once() {
    let (engine, ports, calls) = setup();
    let pad = ports.create_port("X-TOUCH MINI");

    engine.start(&xtouch(), &binds(), "X-TOUCH MINI").unwrap();
    assert_eq!(engine.status(), EngineStatus::Running);

    assert!(pad.send_message(RawMidiMessage::note_on(CHANNEL, 1, 127)));
    assert!(pad.send_message(RawMidiMessage::note_off(CHANNEL, 1, 0)));
    wait_for("both messages", || engine.stats().received == 2);

    assert_eq!(calls.get(), vec!["play"]);
    engine.stop().unwrap();
}

#[test]
fn test_stop_immediately_after_start() {
    let (engine, ports, _calls) = setup();
    let pad = ports.create_port("X-TOUCH MINI");

    engine.start(&xtouch(), &binds(), "X-TOUCH MINI").unwrap();
    engine.stop().unwrap();

    assert_eq!(engine.status(), EngineStatus::Idle);
    assert_eq!(engine.active_port(), None);
    assert!(!pad.is_open());
    assert!(!pad.send(&[0x9A, 1, 127]));
}

#[test]
fn test_messages_dispatch_in_device_order() {
    let (engine, ports, calls) = setup();
    let pad = ports.create_port("X-TOUCH MINI");
    engine.start(&xtouch(), &binds(), "X-TOUCH MINI").unwrap();

    for value in [10, 11, 12, 11, 10, 11] {
        pad.send_message(RawMidiMessage::control_change(CHANNEL, 1, value));
    }
    wait_for("five knob events", || calls.len() == 5);

    assert_eq!(
        calls.get(),
        vec!["volume_up", "volume_up", "volume_down", "volume_down", "volume_up"]
    );
    engine.stop().unwrap();
}

#[test]
fn test_knob_wraparound_keeps_direction() {
    let (engine, ports, calls) = setup();
    let pad = ports.create_port("X-TOUCH MINI");
    engine.start(&xtouch(), &binds(), "X-TOUCH MINI").unwrap();

    for value in [126, 127, 0, 1] {
        pad.send_message(RawMidiMessage::control_change(CHANNEL, 1, value));
    }
    wait_for("three knob events", || calls.len() == 3);
    assert_eq!(calls.get(), vec!["volume_up"; 3]);

    engine.stop().unwrap();
}

#[test]
fn test_restart_clears_knob_state() {
    let (engine, ports, calls) = setup();
    let pad = ports.create_port("X-TOUCH MINI");
    engine.start(&xtouch(), &binds(), "X-TOUCH MINI").unwrap();

    pad.send_message(RawMidiMessage::control_change(CHANNEL, 1, 64));
    pad.send_message(RawMidiMessage::control_change(CHANNEL, 1, 65));
    wait_for("first knob event", || calls.len() == 1);

    engine.restart(&xtouch(), &binds(), "X-TOUCH MINI").unwrap();
    assert!(engine.is_running());

    // First message after restart only sets the baseline.
    pad.send_message(RawMidiMessage::control_change(CHANNEL, 1, 66));
    wait_for("baseline message", || engine.stats().received == 1);
    assert_eq!(calls.len(), 1);

    pad.send_message(RawMidiMessage::control_change(CHANNEL, 1, 67));
    wait_for("second knob event", || calls.len() == 2);

    let stats = engine.stats();
    assert_eq!(stats.received, 2);
    assert_eq!(stats.ignored, 1);
    assert_eq!(stats.invoked, 1);
    engine.stop().unwrap();
}

#[test]
fn test_restart_applies_new_binds() {
    let (engine, ports, calls) = setup();
    let pad = ports.create_port("X-TOUCH MINI");
    engine.start(&xtouch(), &binds(), "X-TOUCH MINI").unwrap();

    let remapped = BindsSet::new("Alt", "Player", "X-TOUCH MINI").with_button(1, "stop");
    engine.restart(&xtouch(), &remapped, "X-TOUCH MINI").unwrap();

    pad.send_message(RawMidiMessage::note_on(CHANNEL, 1, 127));
    wait_for("remapped press", || calls.len() == 1);
    assert_eq!(calls.get(), vec!["stop"]);
    engine.stop().unwrap();
}

#[test]
fn test_restart_from_idle_starts() {
    let (engine, ports, _calls) = setup();
    ports.create_port("X-TOUCH MINI");

    engine.restart(&xtouch(), &binds(), "X-TOUCH MINI").unwrap();
    assert!(engine.is_running());
    engine.stop().unwrap();
}

#[test]
fn test_concurrent_starts_exactly_one_wins() {
    let (engine, ports, _calls) = setup();
    let pad = ports.create_port("X-TOUCH MINI");
    // Keep the first start inside its transition while the second arrives.
    pad.set_open_delay(Some(Duration::from_millis(100)));

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let engine = engine.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                engine.start(&xtouch(), &binds(), "X-TOUCH MINI")
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(Error::ConcurrentLifecycleRequest)))
            .count(),
        1
    );
    assert!(engine.is_running());
    engine.stop().unwrap();
}

#[test]
fn test_missing_port_is_unavailable() {
    let (engine, _ports, _calls) = setup();

    let result = engine.start(&xtouch(), &binds(), "Launchpad");
    assert!(matches!(result, Err(Error::PortUnavailable(_))));
    assert_eq!(engine.status(), EngineStatus::Idle);
    assert_eq!(engine.active_port(), None);
}

#[test]
fn test_claimed_port_is_unavailable() {
    let (first, ports, _calls) = setup();
    ports.create_port("X-TOUCH MINI");
    let second = MidiBindEngine::builder()
        .virtual_ports(ports.clone())
        .on_action(|_| Ok(()))
        .build()
        .unwrap();

    first.start(&xtouch(), &binds(), "X-TOUCH MINI").unwrap();
    let result = second.start(&xtouch(), &binds(), "X-TOUCH MINI");
    assert!(matches!(result, Err(Error::PortUnavailable(_))));
    assert!(first.is_running());
    assert!(!second.is_running());

    first.stop().unwrap();
    second.start(&xtouch(), &binds(), "X-TOUCH MINI").unwrap();
    second.stop().unwrap();
}

fn slow_engine(ports: &VirtualPortProvider) -> MidiBindEngine {
    init_tracing();
    MidiBindEngine::builder()
        .virtual_ports(ports.clone())
        .on_action(|_| Ok(()))
        .open_timeout(Duration::from_millis(50))
        .build()
        .unwrap()
}

#[test]
fn test_slow_open_times_out() {
    let ports = VirtualPortProvider::new();
    let pad = ports.create_port("X-TOUCH MINI");
    pad.set_open_delay(Some(Duration::from_millis(300)));
    let engine = slow_engine(&ports);

    let started = Instant::now();
    let result = engine.start(&xtouch(), &binds(), "X-TOUCH MINI");
    assert!(matches!(result, Err(Error::PortUnavailable(_))));
    assert!(started.elapsed() < Duration::from_millis(300));
    assert_eq!(engine.status(), EngineStatus::Idle);

    // The abandoned open completes, then releases the port on its own.
    thread::sleep(Duration::from_millis(350));
    wait_for("abandoned session to release the port", || !pad.is_open());

    pad.set_open_delay(None);
    engine.start(&xtouch(), &binds(), "X-TOUCH MINI").unwrap();
    engine.stop().unwrap();
}

#[test]
fn test_no_second_session_beside_abandoned_open() {
    let ports = VirtualPortProvider::new();
    let slow = ports.create_port("Slow");
    let other = ports.create_port("Other");
    slow.set_open_delay(Some(Duration::from_millis(300)));
    let engine = slow_engine(&ports);

    assert!(matches!(
        engine.start(&xtouch(), &binds(), "Slow"),
        Err(Error::PortUnavailable(_))
    ));

    // The timed-out session thread is still inside the open call.
    assert!(matches!(
        engine.start(&xtouch(), &binds(), "Other"),
        Err(Error::ConcurrentLifecycleRequest)
    ));
    assert!(!other.is_open());
    assert!(!engine.is_running());

    // stop waits for the abandoned thread to finish its open and exit.
    let stopping = Instant::now();
    engine.stop().unwrap();
    assert!(stopping.elapsed() >= Duration::from_millis(100));
    assert!(!slow.is_open());

    engine.start(&xtouch(), &binds(), "Other").unwrap();
    assert!(other.is_open());
    engine.stop().unwrap();
}

#[test]
fn test_restart_waits_for_abandoned_open() {
    let ports = VirtualPortProvider::new();
    let slow = ports.create_port("Slow");
    let other = ports.create_port("Other");
    slow.set_open_delay(Some(Duration::from_millis(200)));
    let engine = slow_engine(&ports);

    assert!(engine.start(&xtouch(), &binds(), "Slow").is_err());
    engine.restart(&xtouch(), &binds(), "Other").unwrap();

    assert!(!slow.is_open());
    assert!(other.is_open());
    assert_eq!(engine.active_port().as_deref(), Some("Other"));
    engine.stop().unwrap();
}

#[test]
fn test_port_fault_sets_error_status() {
    let (engine, ports, _calls) = setup();
    let pad = ports.create_port("X-TOUCH MINI");
    let reports = engine.reports();
    engine.start(&xtouch(), &binds(), "X-TOUCH MINI").unwrap();

    pad.disconnect();
    wait_for("error status", || {
        matches!(engine.status(), EngineStatus::Error(_))
    });

    match reports.recv_timeout(Duration::from_secs(1)).unwrap() {
        EngineReport::PortClosed { port, .. } => assert_eq!(port, "X-TOUCH MINI"),
        other => panic!("unexpected report {other:?}"),
    }

    // The faulted session is reaped by the next start.
    engine.start(&xtouch(), &binds(), "X-TOUCH MINI").unwrap();
    assert!(engine.is_running());
    engine.stop().unwrap();
    assert_eq!(engine.status(), EngineStatus::Idle);
}

#[test]
fn test_action_failure_is_reported_and_loop_continues() {
    let (engine, ports, calls) = setup();
    let pad = ports.create_port("X-TOUCH MINI");
    let reports = engine.reports();
    engine.start(&xtouch(), &binds(), "X-TOUCH MINI").unwrap();

    pad.send_message(RawMidiMessage::note_on(CHANNEL, 2, 127));
    pad.send_message(RawMidiMessage::note_on(CHANNEL, 1, 127));
    wait_for("both presses", || calls.len() == 2);

    assert_eq!(calls.get(), vec!["fail", "play"]);
    assert_eq!(
        reports.recv_timeout(Duration::from_secs(1)).unwrap(),
        EngineReport::ActionFailed {
            action_id: "fail".to_string(),
            reason: "command exited with status 1".to_string(),
        }
    );
    assert!(engine.is_running());

    let stats = engine.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.invoked, 1);
    engine.stop().unwrap();
}

#[test]
fn test_foreign_and_malformed_input_is_ignored() {
    let (engine, ports, calls) = setup();
    let pad = ports.create_port("X-TOUCH MINI");
    engine.start(&xtouch(), &binds(), "X-TOUCH MINI").unwrap();

    // Wrong channel, unknown element, truncated, clock, then a real press.
    pad.send_message(RawMidiMessage::note_on(0, 1, 127));
    pad.send_message(RawMidiMessage::note_on(CHANNEL, 99, 127));
    pad.send(&[0x9A, 1]);
    pad.send(&[0xF8]);
    pad.send_message(RawMidiMessage::note_on(CHANNEL, 1, 127));
    wait_for("all messages", || engine.stats().received == 5);

    assert_eq!(calls.get(), vec!["play"]);
    let stats = engine.stats();
    assert_eq!(stats.malformed, 1);
    assert_eq!(stats.ignored, 3);
    assert_eq!(stats.invoked, 1);
    engine.stop().unwrap();
}

#[test]
fn test_start_preferred_port() {
    let (engine, ports, _calls) = setup();
    ports.create_port("X-TOUCH MINI:X-TOUCH MINI MIDI 1 20:0");

    engine.start_preferred(&xtouch(), &binds()).unwrap();
    assert_eq!(
        engine.active_port().as_deref(),
        Some("X-TOUCH MINI:X-TOUCH MINI MIDI 1 20:0")
    );
    engine.stop().unwrap();

    let mut schema = xtouch();
    schema.preferred_midi_in = None;
    assert!(matches!(
        engine.start_preferred(&schema, &binds()),
        Err(Error::PortUnavailable(_))
    ));
}

#[test]
fn test_list_input_ports() {
    let (engine, ports, _calls) = setup();
    ports.create_port("Pad A");
    ports.create_port("Pad B");

    let names: Vec<_> = engine
        .list_input_ports()
        .into_iter()
        .map(|device| device.name)
        .collect();
    assert_eq!(names, vec!["Pad A", "Pad B"]);
}
