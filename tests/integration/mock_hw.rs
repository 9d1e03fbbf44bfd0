//! Mock hardware for integration tests.
//!
//! Records every relay write so tests can assert on the full command
//! history, and bundles the service with a manual clock, a log display,
//! a status sink and a scripted sensor store.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{NaiveDate, NaiveDateTime};
use poolctl::adapters::log_sink::{LogDisplay, LogStatusSink};
use poolctl::adapters::time::ManualClock;
use poolctl::app::commands::{Intent, RemoteCommand};
use poolctl::app::events::LoopControl;
use poolctl::app::ports::{RelayOutput, RelayPort};
use poolctl::app::service::ControlService;
use poolctl::config::SystemConfig;
use poolctl::error::ActuatorError;
use poolctl::fsm::SystemMode;
use poolctl::sensors::{SensorId, SensorStore, SharedSensors};

// ── Relay write record ────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct RelayLog {
    inner: Arc<Mutex<Vec<(RelayOutput, bool)>>>,
}

#[allow(dead_code)]
impl RelayLog {
    pub fn writes(&self) -> Vec<(RelayOutput, bool)> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Writes to anything but the activity LED.
    pub fn equipment_writes(&self) -> Vec<(RelayOutput, bool)> {
        self.writes()
            .into_iter()
            .filter(|(o, _)| *o != RelayOutput::ActivityLed)
            .collect()
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

// ── RecordingRelays ───────────────────────────────────────────

/// Relay bank that remembers every write and can be told to fail one
/// output.
pub struct RecordingRelays {
    levels: [bool; 8],
    log: RelayLog,
    pub failing: Option<RelayOutput>,
}

impl RecordingRelays {
    pub fn new() -> (Self, RelayLog) {
        let log = RelayLog::default();
        (
            Self {
                levels: [false; 8],
                log: log.clone(),
                failing: None,
            },
            log,
        )
    }
}

impl RelayPort for RecordingRelays {
    fn set(&mut self, output: RelayOutput, on: bool) -> Result<(), ActuatorError> {
        if self.failing == Some(output) {
            return Err(ActuatorError::GpioWriteFailed);
        }
        self.levels[output.index()] = on;
        self.log
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((output, on));
        Ok(())
    }

    fn level(&self, output: RelayOutput) -> bool {
        self.levels[output.index()]
    }
}

// ── Rig ───────────────────────────────────────────────────────

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .and_then(|date| date.and_hms_opt(h, min, s))
        .unwrap()
}

/// A control service on simulated hardware.
pub struct Rig {
    pub service: ControlService<RecordingRelays, ManualClock>,
    pub clock: ManualClock,
    pub sensors: SharedSensors,
    pub display: LogDisplay,
    pub status: LogStatusSink,
    pub relays: RelayLog,
}

#[allow(dead_code)]
impl Rig {
    /// Defaults, noon on a June day, every sensor attached and reading
    /// spa 84 °F, controller 95 °F, air 60 °F.
    pub fn new() -> Self {
        Self::with(SystemConfig::default(), at(2024, 6, 1, 12, 0, 0))
    }

    pub fn with(config: SystemConfig, start: NaiveDateTime) -> Self {
        let clock = ManualClock::starting_at(start);
        let sensors = SensorStore::shared(config.sensor_error_limit);
        {
            let mut s = sensors.write().unwrap();
            for id in SensorId::ALL {
                s.attach(id);
            }
            s.record_success(SensorId::Spa, 84.0);
            s.record_success(SensorId::Controller, 95.0);
            s.record_success(SensorId::Air, 60.0);
        }
        let (relays, log) = RecordingRelays::new();
        let service = ControlService::new(config, relays, clock.clone(), sensors.clone()).unwrap();
        Self {
            service,
            clock,
            sensors,
            display: LogDisplay::new(),
            status: LogStatusSink::new(),
            relays: log,
        }
    }

    pub fn set_temp(&self, id: SensorId, value_f: f32) {
        self.sensors.write().unwrap().record_success(id, value_f);
    }

    pub fn send(&mut self, cmd: RemoteCommand) -> LoopControl {
        self.service.handle_intent(Intent::Remote(cmd), &mut self.display)
    }

    pub fn intent(&mut self, intent: Intent) -> LoopControl {
        self.service.handle_intent(intent, &mut self.display)
    }

    /// Tick at the current second.
    pub fn tick(&mut self) -> bool {
        self.service.tick(&mut self.display, &mut self.status)
    }

    /// Advance one second at a time, ticking after each.
    pub fn run_for(&mut self, secs: u64) {
        for _ in 0..secs {
            self.clock.advance_secs(1);
            self.tick();
        }
    }

    /// Tick second by second until the mode changes or `limit` runs out.
    /// Returns the seconds taken.
    pub fn run_until_mode_leaves(&mut self, mode: SystemMode, limit: u64) -> Option<u64> {
        for s in 1..=limit {
            self.clock.advance_secs(1);
            self.tick();
            if self.service.mode() != mode {
                return Some(s);
            }
        }
        None
    }

    pub fn mode(&self) -> SystemMode {
        self.service.mode()
    }

    pub fn row(&self, n: usize) -> String {
        self.display.rows()[n].clone()
    }
}
