//! Outbound application state.
//!
//! The [`ControlService`](super::service::ControlService) publishes a
//! [`ControllerSnapshot`] after every intent and every tick.  Readers (the
//! status page publisher, the display, tests) always work from one whole
//! snapshot, never from individual fields read at different times.

use chrono::{NaiveDateTime, TimeDelta};

use crate::equipment::EquipmentState;
use crate::fsm::SystemMode;
use crate::scheduler::{PumpWindow, WINDOW_SLOTS};
use crate::sensors::{SensorId, SensorStore};

/// Why the control loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Leave the process; the host keeps running.
    Exit,
    /// Power the host off after the outputs are off.
    Shutdown,
    /// Restart the host after the outputs are off.
    Reboot,
    /// The stop signal was raised from outside the loop.
    Signalled,
}

/// Result of handling one intent or tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Exit(ExitReason),
}

/// A point-in-time view of the whole controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerSnapshot {
    pub at: NaiveDateTime,
    pub uptime_secs: u64,
    pub mode: SystemMode,
    pub equipment: EquipmentState,
    pub setpoint_f: f32,
    pub sensors: SensorStore,
    pub time_remaining: Option<TimeDelta>,
    pub windows: [Option<PumpWindow>; WINDOW_SLOTS],
    pub pump_off_at: Option<NaiveDateTime>,
    pub next_pump_off: Option<NaiveDateTime>,
    pub spa_off_at: Option<NaiveDateTime>,
}

fn flag(on: bool) -> String {
    u8::from(on).to_string()
}

fn temp(t: f32) -> String {
    format!("{:.1}", t)
}

fn opt_time(t: Option<NaiveDateTime>) -> String {
    t.map_or_else(|| "-".into(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string())
}

impl ControllerSnapshot {
    pub fn spa_f(&self) -> f32 {
        self.sensors.read(SensorId::Spa)
    }

    pub fn air_f(&self) -> f32 {
        self.sensors.read(SensorId::Air)
    }

    /// Keys refreshed every second.
    pub fn status_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("at", temp(self.air_f())),
            ("st", temp(self.spa_f())),
            ("sp", temp(self.setpoint_f)),
            ("sm", self.mode.name().trim_end().to_string()),
            ("pp", flag(self.equipment.pump_power)),
            ("hp", flag(self.equipment.heater_power)),
            ("he", flag(self.equipment.heater_enable)),
            ("vm", self.equipment.valve.label().to_string()),
            ("tr", crate::display::format_remaining(self.time_remaining).to_string()),
        ]
    }

    /// Slower-changing keys: schedule, sensor health, build.
    pub fn info_fields(&self) -> Vec<(&'static str, String)> {
        let window = |slot: usize| self.windows[slot];
        let on = |slot| window(slot).map_or_else(|| "-".into(), |w| w.on.to_string());
        let off = |slot| window(slot).map_or_else(|| "-".into(), |w| w.off.to_string());
        let errors = |id| self.sensors.reading(id).consecutive_errors.to_string();

        vec![
            ("te1on", on(0)),
            ("te1off", off(0)),
            ("te2on", on(1)),
            ("te2off", off(1)),
            ("te3off", opt_time(self.pump_off_at)),
            ("tsot", opt_time(self.spa_off_at)),
            ("npo", opt_time(self.next_pump_off)),
            ("cput", temp(self.sensors.read(SensorId::Controller))),
            ("owse", errors(SensorId::Spa)),
            ("owce", errors(SensorId::Controller)),
            ("owae", errors(SensorId::Air)),
            ("swv", env!("CARGO_PKG_VERSION").to_string()),
            ("cpus", self.uptime_secs.to_string()),
        ]
    }
}
