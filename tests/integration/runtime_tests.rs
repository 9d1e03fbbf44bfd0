//! Thread-level behaviour: startup gate, control loop exit, panel input.

use core::time::Duration;
use std::sync::Arc;
use std::thread;

use poolctl::app::commands::{Intent, RemoteCommand};
use poolctl::app::events::ExitReason;
use poolctl::app::ports::RelayOutput;
use poolctl::drivers::button::{PanelButton, PanelButtons};
use poolctl::adapters::gpio::SimButtons;
use poolctl::error::Error;
use poolctl::events::IntentQueue;
use poolctl::fsm::SystemMode;
use poolctl::equipment::EquipmentState;
use poolctl::runtime::{
    ShutdownSignal, StartupGate, await_sensors, control_loop, install_signal_handler, spawn_panel_input,
};

use crate::mock_hw::Rig;

#[test]
fn startup_timeout_forces_outputs_off() {
    let mut rig = Rig::new();
    rig.send(RemoteCommand::Spare(true));
    let estop = rig.service.equipment().emergency_stop();
    rig.relays.clear();

    let gate = StartupGate::new();
    let result = await_sensors(&gate, Duration::from_millis(20), &estop);
    assert_eq!(result, Err(Error::Timeout("sensor bus init")));

    let writes = rig.relays.writes();
    assert_eq!(writes.len(), RelayOutput::ALL.len());
    assert!(writes.iter().all(|(_, on)| !on));
    assert!(writes.contains(&(RelayOutput::Spare, false)));
}

#[test]
fn open_gate_lets_startup_continue() {
    let rig = Rig::new();
    let estop = rig.service.equipment().emergency_stop();
    rig.relays.clear();

    let gate = StartupGate::new();
    let opener = {
        let gate = gate.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            gate.open();
        })
    };
    assert_eq!(await_sensors(&gate, Duration::from_secs(5), &estop), Ok(()));
    opener.join().unwrap();
    assert!(rig.relays.writes().is_empty());
}

#[test]
fn queued_commands_run_before_exit() {
    let mut rig = Rig::new();
    let queue = IntentQueue::new();
    let shutdown = ShutdownSignal::new();
    queue.submit(Intent::Remote(RemoteCommand::PumpOn { hours: Some(2) })).unwrap();
    queue.submit(Intent::Remote(RemoteCommand::Exit)).unwrap();
    queue.submit(Intent::Remote(RemoteCommand::PumpOff)).unwrap();

    let reason = control_loop(
        &mut rig.service,
        &queue,
        &shutdown,
        &mut rig.display,
        &mut rig.status,
        Duration::from_millis(10),
    );
    assert_eq!(reason, ExitReason::Exit);
    assert!(shutdown.is_triggered());
    assert_eq!(rig.mode(), SystemMode::Manual);
    // Intents behind the exit stay queued.
    assert_eq!(queue.len(), 1);
}

#[test]
fn external_shutdown_stops_the_loop() {
    let mut rig = Rig::new();
    let queue = IntentQueue::new();
    let shutdown = ShutdownSignal::new();
    let trigger = {
        let shutdown = shutdown.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            shutdown.trigger();
        })
    };

    let reason = control_loop(
        &mut rig.service,
        &queue,
        &shutdown,
        &mut rig.display,
        &mut rig.status,
        Duration::from_millis(5),
    );
    trigger.join().unwrap();
    assert_eq!(reason, ExitReason::Signalled);
    assert!(rig.service.ticks() >= 1);
}

// The only test in this binary that installs the process handler.
#[cfg(unix)]
#[test]
fn sigterm_stops_the_loop_with_outputs_off() {
    let mut rig = Rig::new();
    rig.send(RemoteCommand::SpaOn { hours: Some(2) });
    assert_eq!(rig.mode(), SystemMode::SpaOn);

    let queue = IntentQueue::new();
    let shutdown = ShutdownSignal::new();
    install_signal_handler(&shutdown).unwrap();
    let status = std::process::Command::new("kill")
        .args(["-TERM", &std::process::id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());
    assert!(shutdown.wait_timeout(Duration::from_secs(5)));

    let reason = control_loop(
        &mut rig.service,
        &queue,
        &shutdown,
        &mut rig.display,
        &mut rig.status,
        Duration::from_millis(5),
    );
    assert_eq!(reason, ExitReason::Signalled);

    rig.service.finish(reason, &mut rig.display);
    assert_eq!(rig.service.equipment().state(), EquipmentState::all_off());
    assert_eq!(rig.mode(), SystemMode::Off);
}

#[test]
fn panel_thread_queues_debounced_presses() {
    let buttons = SimButtons::new();
    let queue = Arc::new(IntentQueue::new());
    let shutdown = ShutdownSignal::new();
    let handle = spawn_panel_input(
        PanelButtons::new(buttons.clone()),
        Arc::clone(&queue),
        shutdown.clone(),
        Duration::from_millis(5),
    )
    .unwrap();

    buttons.set(3, true);
    let mut seen = None;
    for _ in 0..200 {
        seen = queue.next();
        if seen.is_some() {
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }
    buttons.set(3, false);
    shutdown.trigger();
    handle.join().unwrap();

    assert_eq!(seen, Some(Intent::Button(PanelButton::Four)));
    assert!(queue.is_empty(), "a held button reports once");
}
