//! Spa thermostat: hysteresis band with a minimum heater-off lockout.
//!
//! ```text
//!            temp > setpoint              temp < setpoint - hysteresis
//!  Heating ───────────────────▶ Idle ──────────────────────────────┐
//!     ▲                          │                                 ▼
//!     │          lockout over    │                            LockedOut
//!     └──────────────────────────┴─────────────────────────────────┘
//! ```
//!
//! Only runs in `SpaOn`.  The over-temperature cut-off is checked first
//! and does not depend on the band.

use log::{error, info, warn};

use crate::app::commands::Step;
use crate::app::ports::{ClockPort, RelayPort};
use crate::config::ThermostatSettings;
use crate::equipment::Equipment;
use crate::error::{Result, SafetyTrip, SensorError};
use crate::fsm::SystemMode;
use crate::scheduler::EventScheduler;
use crate::sensors::{SensorId, SensorStore};

/// What one evaluation did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThermostatOutcome {
    /// Not in SpaOn.
    Skipped,
    /// Spa sensor disabled; the session was ended.
    SensorFault(SensorError),
    /// Above the maximum; heater enable and power were cut.
    OverTemp(SafetyTrip),
    /// Reached setpoint; heater enable turned off.
    HeaterOff,
    /// Below the band but still inside the lockout.  Seconds left.
    LockedOut(u64),
    /// Below the band; heater enable turned on.
    HeaterOn,
    /// Inside the band, nothing to do.
    Idle,
}

pub struct Thermostat {
    settings: ThermostatSettings,
    /// Uptime second at which heater enable last went off.
    last_off: Option<u64>,
}

impl Thermostat {
    pub fn new(settings: ThermostatSettings) -> Self {
        Self {
            settings,
            last_off: None,
        }
    }

    pub fn setpoint(&self) -> f32 {
        self.settings.setpoint_f
    }

    pub fn settings(&self) -> ThermostatSettings {
        self.settings
    }

    /// Move the setpoint one degree.  Refused (returns `false`) when the
    /// result would leave `[min, max]`.
    pub fn adjust_setpoint(&mut self, step: Step) -> bool {
        let next = self.settings.setpoint_f + step.sign() as f32;
        if next < self.settings.min_temp_f || next > self.settings.max_temp_f {
            warn!("THERM | setpoint {} out of range", next);
            return false;
        }
        self.settings.setpoint_f = next;
        info!("THERM | setpoint now {}", next);
        true
    }

    /// Record a heater-off that happened outside the thermostat.
    pub fn note_heater_off(&mut self, uptime_secs: u64) {
        self.last_off = Some(uptime_secs);
    }

    pub fn evaluate<R: RelayPort, C: ClockPort>(
        &mut self,
        equipment: &mut Equipment<R, C>,
        sensors: &SensorStore,
        scheduler: &mut EventScheduler,
    ) -> Result<ThermostatOutcome> {
        if equipment.mode() != SystemMode::SpaOn {
            return Ok(ThermostatOutcome::Skipped);
        }

        let temp = match sensors.temperature(SensorId::Spa) {
            Ok(t) => t,
            Err(e) => {
                error!("THERM | spa sensor not available, ending spa session");
                equipment.spa_off(scheduler)?;
                return Ok(ThermostatOutcome::SensorFault(e));
            }
        };
        let now = equipment.clock().uptime_secs();
        let s = self.settings;

        if temp > s.max_temp_f {
            error!("THERM | spa over max temp: {}", temp);
            let was_enabled = equipment.state().heater_enable;
            equipment.set_heater_enable(false)?;
            equipment.set_heater_power(false)?;
            if was_enabled {
                self.last_off = Some(now);
            }
            return Ok(ThermostatOutcome::OverTemp(SafetyTrip::OverTemp));
        }

        let enabled = equipment.state().heater_enable;
        if temp > s.setpoint_f {
            if !enabled {
                return Ok(ThermostatOutcome::Idle);
            }
            info!("THERM | at temp, heat off at {}", temp);
            equipment.set_heater_enable(false)?;
            self.last_off = Some(now);
            return Ok(ThermostatOutcome::HeaterOff);
        }

        if temp < s.setpoint_f - s.hysteresis_f && !enabled {
            if let Some(off) = self.last_off {
                let elapsed = now.saturating_sub(off);
                if elapsed < s.lockout_secs {
                    let left = s.lockout_secs - elapsed;
                    info!("THERM | heater lockout: {}s remaining", left);
                    return Ok(ThermostatOutcome::LockedOut(left));
                }
            }
            info!("THERM | below setpoint, heat on at {}", temp);
            equipment.set_heater_enable(true)?;
            return Ok(ThermostatOutcome::HeaterOn);
        }

        Ok(ThermostatOutcome::Idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::time::ManualClock;
    use crate::drivers::relays::SimRelays;
    use crate::equipment::EquipmentTiming;
    use chrono::TimeDelta;
    use core::time::Duration;

    struct Rig {
        eq: Equipment<SimRelays, ManualClock>,
        sched: EventScheduler,
        sensors: SensorStore,
        therm: Thermostat,
    }

    fn rig() -> Rig {
        let timing = EquipmentTiming {
            settle: Duration::from_secs(1),
            spa_max_hours: 12,
            cooldown: TimeDelta::minutes(15),
        };
        let mut eq = Equipment::new(SimRelays::new(), ManualClock::default(), timing);
        let mut sched = EventScheduler::new();
        eq.spa_on(2, &mut sched).unwrap();
        let mut sensors = SensorStore::new(10);
        for id in SensorId::ALL {
            sensors.attach(id);
        }
        Rig {
            eq,
            sched,
            sensors,
            therm: Thermostat::new(ThermostatSettings::default()),
        }
    }

    impl Rig {
        fn eval_at(&mut self, temp: f32) -> ThermostatOutcome {
            self.sensors.record_success(SensorId::Spa, temp);
            self.therm
                .evaluate(&mut self.eq, &self.sensors, &mut self.sched)
                .unwrap()
        }
    }

    #[test]
    fn skipped_outside_spa_mode() {
        let mut r = rig();
        r.eq.spa_off(&mut r.sched).unwrap();
        assert_eq!(r.eval_at(50.0), ThermostatOutcome::Skipped);
        assert!(!r.eq.state().heater_enable);
    }

    #[test]
    fn heat_off_above_setpoint() {
        let mut r = rig();
        assert_eq!(r.eval_at(93.5), ThermostatOutcome::HeaterOff);
        assert!(!r.eq.state().heater_enable);
        assert!(r.eq.state().heater_power);
        assert_eq!(r.eval_at(93.5), ThermostatOutcome::Idle);
    }

    #[test]
    fn inside_band_is_idle() {
        let mut r = rig();
        r.eval_at(95.0);
        assert_eq!(r.eval_at(92.8), ThermostatOutcome::Idle);
        assert!(!r.eq.state().heater_enable);
    }

    #[test]
    fn lockout_boundary() {
        let mut r = rig();
        r.eval_at(95.0);
        let lockout = ThermostatSettings::default().lockout_secs;

        r.eq.clock().advance_secs(lockout - 1);
        assert_eq!(r.eval_at(90.0), ThermostatOutcome::LockedOut(1));
        assert!(!r.eq.state().heater_enable);

        r.eq.clock().advance_secs(1);
        assert_eq!(r.eval_at(90.0), ThermostatOutcome::HeaterOn);
        assert!(r.eq.state().heater_enable);
    }

    #[test]
    fn over_temp_cuts_heater_power() {
        let mut r = rig();
        let out = r.eval_at(104.5);
        assert_eq!(out, ThermostatOutcome::OverTemp(SafetyTrip::OverTemp));
        let s = r.eq.state();
        assert!(!s.heater_enable && !s.heater_power && s.pump_power);
    }

    #[test]
    fn disabled_sensor_ends_session() {
        let mut r = rig();
        for _ in 0..=10 {
            r.sensors.record_failure(SensorId::Spa);
        }
        let out = r
            .therm
            .evaluate(&mut r.eq, &r.sensors, &mut r.sched)
            .unwrap();
        assert!(matches!(out, ThermostatOutcome::SensorFault(_)));
        assert_eq!(r.eq.mode(), SystemMode::Cooldown);
        assert!(r.sched.spa_off_at().is_none());
    }

    #[test]
    fn setpoint_stays_in_bounds() {
        let mut therm = Thermostat::new(ThermostatSettings {
            setpoint_f: 103.0,
            ..ThermostatSettings::default()
        });
        assert!(therm.adjust_setpoint(Step::Up));
        assert!(!therm.adjust_setpoint(Step::Up));
        assert_eq!(therm.setpoint(), 104.0);
    }
}
