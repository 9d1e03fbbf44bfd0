//! Freeze guard.
//!
//! Checked on a slow cadence from the control loop.  When the air drops
//! below the freeze threshold the pump is forced on for a fixed run and
//! the mode latches to `Freeze`.
//!
//! ## Lifecycle
//!
//! 1. Air below threshold while not in `Freeze`: pump on, pump-off deadline
//!    armed for the freeze run, mode `Freeze`.
//! 2. Each later check in `Freeze` with the air still cold does nothing;
//!    the latch does not re-trigger.
//! 3. The first check in `Freeze` that finds the air at or above the
//!    threshold clears the latch.  The pump finishes its run as a manual
//!    run.
//! 4. If the run ends while it is still cold, the mode has already left
//!    `Freeze`, so the next check starts a new run.
//!
//! A spa session already circulates water, so the guard stands aside in
//! `SpaOn`.  A disabled air sensor skips the check with a warning.

use chrono::TimeDelta;
use log::{error, info, warn};

use crate::app::ports::{ClockPort, RelayPort};
use crate::equipment::Equipment;
use crate::error::{Result, SafetyTrip, SensorError};
use crate::fsm::SystemMode;
use crate::scheduler::EventScheduler;
use crate::sensors::{SensorId, SensorStore};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FreezeOutcome {
    /// Air is warm enough, or a spa session is running.
    Clear,
    /// Protection started.
    Tripped(SafetyTrip),
    /// Still in `Freeze`, still cold.
    Holding,
    /// Air recovered; the latch was released.
    Released,
    /// No air reading available.
    Skipped(SensorError),
}

pub struct FreezeGuard {
    threshold_f: f32,
    run: TimeDelta,
}

impl FreezeGuard {
    pub fn new(threshold_f: f32, run_hours: u8) -> Self {
        Self {
            threshold_f,
            run: TimeDelta::hours(i64::from(run_hours)),
        }
    }

    pub fn from_config(config: &crate::config::SystemConfig) -> Self {
        Self::new(config.freeze_temp_f, config.freeze_run_hours)
    }

    pub fn threshold_f(&self) -> f32 {
        self.threshold_f
    }

    pub fn check<R: RelayPort, C: ClockPort>(
        &self,
        equipment: &mut Equipment<R, C>,
        sensors: &SensorStore,
        scheduler: &mut EventScheduler,
    ) -> Result<FreezeOutcome> {
        let air = match sensors.temperature(SensorId::Air) {
            Ok(t) => t,
            Err(e) => {
                warn!("FREEZE | air sensor unavailable, check skipped");
                return Ok(FreezeOutcome::Skipped(e));
            }
        };

        match equipment.mode() {
            SystemMode::SpaOn => Ok(FreezeOutcome::Clear),
            SystemMode::Freeze if air >= self.threshold_f => {
                info!("FREEZE | air recovered at {}", air);
                equipment.clear_freeze();
                Ok(FreezeOutcome::Released)
            }
            SystemMode::Freeze => Ok(FreezeOutcome::Holding),
            _ if air < self.threshold_f => {
                error!(
                    "FREEZE | detected at air {}, spa {}",
                    air,
                    sensors.read(SensorId::Spa)
                );
                equipment.freeze_protect(self.run, scheduler)?;
                Ok(FreezeOutcome::Tripped(SafetyTrip::Freeze))
            }
            _ => Ok(FreezeOutcome::Clear),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::time::ManualClock;
    use crate::drivers::relays::SimRelays;
    use crate::equipment::EquipmentTiming;
    use core::time::Duration;

    fn setup() -> (Equipment<SimRelays, ManualClock>, EventScheduler, SensorStore) {
        let timing = EquipmentTiming {
            settle: Duration::from_secs(1),
            spa_max_hours: 12,
            cooldown: TimeDelta::minutes(15),
        };
        let eq = Equipment::new(SimRelays::new(), ManualClock::default(), timing);
        let mut sensors = SensorStore::new(10);
        for id in SensorId::ALL {
            sensors.attach(id);
        }
        (eq, EventScheduler::new(), sensors)
    }

    #[test]
    fn trips_once_and_latches() {
        let (mut eq, mut sched, mut sensors) = setup();
        let guard = FreezeGuard::new(32.0, 1);
        sensors.record_success(SensorId::Air, 28.0);

        let out = guard.check(&mut eq, &sensors, &mut sched).unwrap();
        assert_eq!(out, FreezeOutcome::Tripped(SafetyTrip::Freeze));
        assert_eq!(eq.mode(), SystemMode::Freeze);
        assert!(eq.state().pump_power);
        let deadline = sched.pump_off_at().unwrap();
        assert_eq!(deadline, eq.clock().local_now() + TimeDelta::hours(1));

        eq.clock().advance_secs(60);
        assert_eq!(
            guard.check(&mut eq, &sensors, &mut sched).unwrap(),
            FreezeOutcome::Holding
        );
        assert_eq!(sched.pump_off_at(), Some(deadline));
    }

    #[test]
    fn warm_air_releases_latch() {
        let (mut eq, mut sched, mut sensors) = setup();
        let guard = FreezeGuard::new(32.0, 1);
        sensors.record_success(SensorId::Air, 30.0);
        guard.check(&mut eq, &sensors, &mut sched).unwrap();

        sensors.record_success(SensorId::Air, 34.0);
        assert_eq!(
            guard.check(&mut eq, &sensors, &mut sched).unwrap(),
            FreezeOutcome::Released
        );
        assert_eq!(eq.mode(), SystemMode::Manual);
        assert!(eq.state().pump_power);
    }

    #[test]
    fn disabled_air_sensor_skips() {
        let (mut eq, mut sched, mut sensors) = setup();
        for _ in 0..11 {
            sensors.record_failure(SensorId::Air);
        }
        let out = FreezeGuard::new(32.0, 1)
            .check(&mut eq, &sensors, &mut sched)
            .unwrap();
        assert!(matches!(out, FreezeOutcome::Skipped(_)));
        assert_eq!(eq.mode(), SystemMode::Off);
    }

    #[test]
    fn spa_session_is_left_alone() {
        let (mut eq, mut sched, mut sensors) = setup();
        eq.spa_on(2, &mut sched).unwrap();
        sensors.record_success(SensorId::Air, 20.0);
        let out = FreezeGuard::new(32.0, 1)
            .check(&mut eq, &sensors, &mut sched)
            .unwrap();
        assert_eq!(out, FreezeOutcome::Clear);
        assert_eq!(eq.mode(), SystemMode::SpaOn);
    }
}
