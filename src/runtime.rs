//! Threads, stop signal and startup ordering.
//!
//! ```text
//!  ┌──────────────┐ Button  ┌─────────────┐         ┌────────────────┐
//!  │ panel input  │────────▶│             │         │                │
//!  ├──────────────┤ Remote  │ IntentQueue │────────▶│  control loop  │
//!  │ remote reader│────────▶│             │         │ (owns service) │
//!  ├──────────────┤ Fault   │             │         └───────┬────────┘
//!  │ sensor       │────────▶│             │                 │ read
//!  │ sampler      │─────────┴─────────────┴──▶ SharedSensors◀┘
//!  └──────────────┘  write
//! ```
//!
//! Every loop waits on the shared [`ShutdownSignal`] instead of sleeping,
//! so a stop request is seen within one loop period.  The control loop
//! does not start until the sampler opens the [`StartupGate`].

use core::time::Duration;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use log::{error, info, warn};

use crate::app::commands::Intent;
use crate::app::events::{ExitReason, LoopControl};
use crate::app::ports::{ButtonPort, ClockPort, DisplayPort, RelayPort, StatusSink};
use crate::app::service::ControlService;
use crate::drivers::button::PanelButtons;
use crate::equipment::EmergencyStop;
use crate::error::{Error, Result};
use crate::events::IntentQueue;

// ───────────────────────────────────────────────────────────────
// Latches
// ───────────────────────────────────────────────────────────────

/// A one-way flag with a blocking wait.
#[derive(Clone, Default)]
struct Latch {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Latch {
    fn set(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    fn is_set(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `true` if the latch was set before `timeout` ran out.
    fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = cvar
            .wait_timeout_while(guard, timeout, |set| !*set)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

/// Process-wide stop request.
#[derive(Clone, Default)]
pub struct ShutdownSignal(Latch);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        if !self.0.is_set() {
            info!("RUNTIME | shutdown requested");
        }
        self.0.set();
    }

    pub fn is_triggered(&self) -> bool {
        self.0.is_set()
    }

    /// Sleep for `timeout`.  Returns `true` early if shutdown is triggered.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.0.wait_timeout(timeout)
    }
}

/// Route SIGINT, SIGTERM and SIGHUP to `shutdown`, so a service stop
/// takes the same path as the `exit` command.  Callable once per process.
pub fn install_signal_handler(shutdown: &ShutdownSignal) -> core::result::Result<(), ctrlc::Error> {
    let shutdown = shutdown.clone();
    ctrlc::set_handler(move || {
        warn!("RUNTIME | signal received, stopping");
        shutdown.trigger();
    })
}

/// Opened by the sampler once every present sensor has a first reading.
#[derive(Clone, Default)]
pub struct StartupGate(Latch);

impl StartupGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) {
        self.0.set();
    }

    pub fn is_open(&self) -> bool {
        self.0.is_set()
    }

    pub fn wait(&self, timeout: Duration) -> bool {
        self.0.wait_timeout(timeout)
    }
}

/// Block until the sampler reports initial readings.  On timeout every
/// output is forced off and the caller must terminate.
pub fn await_sensors<R: RelayPort>(
    gate: &StartupGate,
    timeout: Duration,
    estop: &EmergencyStop<R>,
) -> Result<()> {
    info!("RUNTIME | waiting up to {}s for sensor bus init", timeout.as_secs());
    if gate.wait(timeout) {
        info!("RUNTIME | sensors ready");
        return Ok(());
    }
    error!("RUNTIME | timeout waiting for sensor bus init");
    estop.engage("sensor init timeout");
    Err(Error::Timeout("sensor bus init"))
}

// ───────────────────────────────────────────────────────────────
// Control loop
// ───────────────────────────────────────────────────────────────

/// Drain intents, run the per-second work, sleep.  Returns when an intent
/// asks to stop or the shutdown signal fires.  Leaves the outputs to the
/// caller's [`ControlService::finish`].
pub fn control_loop<R: RelayPort, C: ClockPort>(
    service: &mut ControlService<R, C>,
    queue: &IntentQueue,
    shutdown: &ShutdownSignal,
    display: &mut impl DisplayPort,
    status: &mut impl StatusSink,
    interval: Duration,
) -> ExitReason {
    info!("RUNTIME | control loop running");
    loop {
        let mut control = LoopControl::Continue;
        queue.drain(|intent| {
            control = service.handle_intent(intent, display);
            control == LoopControl::Continue
        });
        if let LoopControl::Exit(reason) = control {
            shutdown.trigger();
            return reason;
        }

        service.tick(display, status);

        if shutdown.wait_timeout(interval) {
            return ExitReason::Signalled;
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Worker threads
// ───────────────────────────────────────────────────────────────

/// Poll the panel buttons and queue each debounced press.
pub fn spawn_panel_input<B: ButtonPort + 'static>(
    mut buttons: PanelButtons<B>,
    queue: Arc<IntentQueue>,
    shutdown: ShutdownSignal,
    interval: Duration,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new().name("panel-input".into()).spawn(move || {
        let start = Instant::now();
        loop {
            let now_ms = start.elapsed().as_millis() as u32;
            if let Some(button) = buttons.tick(now_ms) {
                // Dropped presses are logged by the queue.
                let _ = queue.submit(Intent::Button(button));
            }
            if shutdown.wait_timeout(interval) {
                break;
            }
        }
        info!("RUNTIME | panel input stopped");
    })
}
