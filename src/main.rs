//! PoolCtl main entry point
//!
//! Wires the adapters to the control service and runs the thread set.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  PinBank<SysfsPin>  SerialLcd     JsonFileConfig  SystemClock  │
//! │  (RelayPort)        (DisplayPort) (ConfigPort)    (ClockPort)  │
//! │  SysfsW1Bus         SysfsButtons  console         Systemctl    │
//! │  (TemperatureBus)   (ButtonPort)  (remote intents)(HostPower)  │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              ControlService (domain core)              │    │
//! │  │  Equipment · Scheduler · Thermostat · Freeze · Panel   │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Threads: sampler · panel input · remote console · control     │
//! └────────────────────────────────────────────────────────────────┘
//! ```

use core::time::Duration;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info, warn};
use tracing_subscriber::EnvFilter;

use poolctl::adapters::config_file::{CONFIG_ENV, JsonFileConfig};
use poolctl::adapters::console::spawn_console;
use poolctl::adapters::gpio::{SimButtons, SimPin, SysfsGpio};
use poolctl::adapters::host::SystemctlPower;
use poolctl::adapters::lcd::SerialLcd;
use poolctl::adapters::log_sink::{LogDisplay, LogStatusSink};
use poolctl::adapters::time::SystemClock;
use poolctl::app::events::ExitReason;
use poolctl::app::ports::{
    ButtonPort, ConfigPort, DisplayError, DisplayPort, HostPowerPort, RelayPort, TemperatureBus,
};
use poolctl::app::service::ControlService;
use poolctl::config::{Backend, HardwareConfig, SystemConfig};
use poolctl::drivers::button::PanelButtons;
use poolctl::drivers::relays::PinBank;
use poolctl::events::IntentQueue;
use poolctl::runtime::{
    ShutdownSignal, StartupGate, await_sensors, control_loop, install_signal_handler, spawn_panel_input,
};
use poolctl::sensors::SensorStore;
use poolctl::sensors::onewire::{SimBus, SysfsW1Bus};
use poolctl::sensors::sampler::{Sampler, spawn_sampler};

const DEFAULT_CONFIG_PATH: &str = "/etc/poolctl/poolctl.json";

// ── Display selection ─────────────────────────────────────────

/// The LCD when one is configured and answers, the log otherwise.
enum PanelDisplay {
    Lcd(SerialLcd<std::fs::File>),
    Log(LogDisplay),
}

impl PanelDisplay {
    fn open(hw: &HardwareConfig) -> Self {
        let Some(port) = hw.lcd_port.as_deref() else {
            return Self::Log(LogDisplay::new());
        };
        match SerialLcd::open(port).and_then(|mut lcd| lcd.init().map(|()| lcd)) {
            Ok(lcd) => Self::Lcd(lcd),
            Err(e) => {
                warn!("LCD | {} unusable ({}), logging screen instead", port, e);
                Self::Log(LogDisplay::new())
            }
        }
    }

    fn port(&mut self) -> &mut dyn DisplayPort {
        match self {
            Self::Lcd(lcd) => lcd,
            Self::Log(log) => log,
        }
    }
}

impl DisplayPort for PanelDisplay {
    fn clear(&mut self) -> Result<(), DisplayError> {
        self.port().clear()
    }

    fn set_cursor(&mut self, row: u8, col: u8) -> Result<(), DisplayError> {
        self.port().set_cursor(row, col)
    }

    fn write_text(&mut self, text: &str) -> Result<(), DisplayError> {
        self.port().write_text(text)
    }

    fn set_backlight(&mut self, r: u8, g: u8, b: u8) -> Result<(), DisplayError> {
        self.port().set_backlight(r, g, b)
    }

    fn set_brightness(&mut self, level: u8) -> Result<(), DisplayError> {
        self.port().set_brightness(level)
    }

    fn set_outputs(&mut self, outputs: [bool; 4]) -> Result<(), DisplayError> {
        self.port().set_outputs(outputs)
    }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. Logging ────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("╔══════════════════════════════════════╗");
    info!("║  PoolCtl v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Load config (or defaults) ──────────────────────────
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.into());
    let config = JsonFileConfig::new(&path)
        .load()
        .with_context(|| format!("loading config from {path}"))?;

    // ── 3. Backend-specific adapters, then run ────────────────
    let shutdown = ShutdownSignal::new();
    install_signal_handler(&shutdown).context("installing signal handler")?;
    let hw = config.hardware.clone();
    let reason = match hw.backend {
        Backend::Sim => {
            info!("Backend: simulation");
            let relays = PinBank::new(core::array::from_fn::<_, 8, _>(|_| SimPin::new()));
            let ids = &config.sensor_ids;
            let bus = SimBus::new(&[
                (ids.spa.as_str(), 84.0),
                (ids.controller.as_str(), 95.0),
                (ids.air.as_str(), 60.0),
            ]);
            run(config.clone(), relays, bus, SimButtons::new(), &shutdown)?
        }
        Backend::Sysfs => {
            info!("Backend: sysfs GPIO + w1");
            let gpio = SysfsGpio::default();
            let pins = [
                hw.pump_pin,
                hw.heater_pin,
                hw.heater_enable_pin,
                hw.valve1_pin,
                hw.valve2_pin,
                hw.spare_pin,
                hw.led_pin,
                hw.led_return_pin,
            ];
            let mut outputs = Vec::with_capacity(pins.len());
            for pin in pins {
                outputs.push(gpio.output(pin).with_context(|| format!("exporting GPIO {pin}"))?);
            }
            let Ok(outputs) = <[_; 8]>::try_from(outputs) else {
                anyhow::bail!("relay bank needs exactly eight outputs");
            };
            let buttons = gpio
                .buttons(hw.button_pins)
                .context("exporting panel button inputs")?;
            let bus = SysfsW1Bus::new(
                &hw.w1_devices_dir,
                Duration::from_millis(config.sensor_read_timeout_ms),
            );
            run(config.clone(), PinBank::new(outputs), bus, buttons, &shutdown)?
        }
    };

    // ── 4. Host power ─────────────────────────────────────────
    let mut host = SystemctlPower::new(hw.allow_host_power);
    let requested = match reason {
        ExitReason::Shutdown => Some(host.power_off()),
        ExitReason::Reboot => Some(host.reboot()),
        ExitReason::Exit | ExitReason::Signalled => None,
    };
    if let Some(Err(e)) = requested {
        warn!("Host power request not carried out: {}", e);
    }
    info!("PoolCtl stopped ({:?})", reason);
    Ok(())
}

/// Start the worker threads, gate on the first sensor readings, run the
/// control loop on this thread and tear everything down.
fn run<R, B, K>(
    config: SystemConfig,
    relays: R,
    bus: B,
    buttons: K,
    shutdown: &ShutdownSignal,
) -> Result<ExitReason>
where
    R: RelayPort + 'static,
    B: TemperatureBus + 'static,
    K: ButtonPort + 'static,
{
    let sensors = SensorStore::shared(config.sensor_error_limit);
    let queue = Arc::new(IntentQueue::new());
    let clock = SystemClock::new(shutdown.clone());
    let mut display = PanelDisplay::open(&config.hardware);
    let mut status = LogStatusSink::new();

    // Outputs are driven off here, before any thread starts.
    let mut service = ControlService::new(config.clone(), relays, clock, sensors.clone())
        .context("building control service")?;
    let estop = service.equipment().emergency_stop();

    // ── Sensor sampler + startup gate ─────────────────────────
    let gate = StartupGate::new();
    let sampler = Sampler::new(bus, config.sensor_ids.clone(), sensors, Arc::clone(&queue));
    let sampler_thread =
        spawn_sampler(sampler, gate.clone(), shutdown.clone()).context("spawning sensor sampler")?;

    let startup_timeout = Duration::from_secs(config.startup_timeout_secs);
    if let Err(e) = await_sensors(&gate, startup_timeout, &estop) {
        shutdown.trigger();
        if sampler_thread.join().is_err() {
            error!("sensor sampler panicked");
        }
        return Err(e).context("waiting for initial sensor readings");
    }

    // ── Inputs ────────────────────────────────────────────────
    let input_thread = spawn_panel_input(
        PanelButtons::new(buttons),
        Arc::clone(&queue),
        shutdown.clone(),
        Duration::from_millis(config.input_poll_interval_ms),
    )
    .context("spawning panel input")?;
    // Never joined: a blocked stdin read outlives the loop.
    spawn_console(Arc::clone(&queue), shutdown.clone()).context("spawning remote console")?;

    info!("System ready. Entering control loop.");

    // ── Control loop ──────────────────────────────────────────
    let reason = control_loop(
        &mut service,
        &queue,
        shutdown,
        &mut display,
        &mut status,
        Duration::from_millis(config.control_loop_interval_ms),
    );
    service.finish(reason, &mut display);
    shutdown.trigger();

    for (name, handle) in [("panel input", input_thread), ("sensor sampler", sampler_thread)] {
        if handle.join().is_err() {
            error!("{} thread panicked", name);
        }
    }
    Ok(reason)
}
