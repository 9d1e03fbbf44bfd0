//! Equipment actuator layer.
//!
//! [`Equipment`] is the only code that writes relay outputs.  It owns the
//! authoritative [`EquipmentState`] and the [`ModeMachine`], and checks the
//! heater interlock on every command:
//!
//! ```text
//!   heater enable  ⇒  heater power  ⇒  pump
//! ```
//!
//! Turning something on checks the chain from the right; turning the pump
//! or heater power off first drops everything that depends on it, in
//! order.  A rejected command changes nothing, neither outputs nor state.
//!
//! The relay bank sits behind an `Arc<Mutex<_>>` so that
//! [`EmergencyStop`] can force every output off from outside the owning
//! thread.

use core::time::Duration;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{NaiveDateTime, TimeDelta};
use log::{error, info, warn};

use crate::app::ports::{ClockPort, RelayOutput, RelayPort};
use crate::error::{Error, PreconditionViolation, Result};
use crate::fsm::{ModeEvent, ModeMachine, SystemMode};
use crate::scheduler::{EventScheduler, validate_spa_hours};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Commanded valve position.  There is no position feedback; this is the
/// last mapping written to the two direction outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValveMode {
    Pool,
    Spa,
    Fill,
    Drain,
    /// The last request did not map to a known position.
    Unknown,
}

impl ValveMode {
    /// `(valve 1, valve 2)` direction outputs; `None` for `Unknown`.
    pub fn outputs(self) -> Option<(bool, bool)> {
        match self {
            Self::Pool => Some((false, false)),
            Self::Spa => Some((true, true)),
            Self::Fill => Some((false, true)),
            Self::Drain => Some((true, false)),
            Self::Unknown => None,
        }
    }

    /// Numeric code used by the remote command surface.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Pool,
            1 => Self::Spa,
            2 => Self::Fill,
            3 => Self::Drain,
            _ => Self::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Pool => "Pool",
            Self::Spa => "Spa",
            Self::Fill => "Fill",
            Self::Drain => "Drain",
            Self::Unknown => "Unknown",
        }
    }
}

/// Everything the controller has commanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EquipmentState {
    pub pump_power: bool,
    pub heater_power: bool,
    pub heater_enable: bool,
    pub valve: ValveMode,
    pub spare_power: bool,
}

impl EquipmentState {
    pub const fn all_off() -> Self {
        Self {
            pump_power: false,
            heater_power: false,
            heater_enable: false,
            valve: ValveMode::Pool,
            spare_power: false,
        }
    }

    /// Heater enable needs heater power, heater power needs the pump.
    pub fn interlock_holds(&self) -> bool {
        (!self.heater_enable || self.heater_power) && (!self.heater_power || self.pump_power)
    }
}

impl Default for EquipmentState {
    fn default() -> Self {
        Self::all_off()
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

// ---------------------------------------------------------------------------
// Equipment
// ---------------------------------------------------------------------------

/// Timing knobs for the composite operations.
#[derive(Debug, Clone, Copy)]
pub struct EquipmentTiming {
    /// Relay settle delay after energising pump or heater.
    pub settle: Duration,
    /// Spa sessions must be shorter than this many hours.
    pub spa_max_hours: u8,
    /// Pump run after a spa session ends.
    pub cooldown: TimeDelta,
}

impl EquipmentTiming {
    pub fn from_config(config: &crate::config::SystemConfig) -> Self {
        Self {
            settle: Duration::from_millis(config.settle_ms),
            spa_max_hours: config.spa_max_hours,
            cooldown: TimeDelta::minutes(i64::from(config.cooldown_minutes)),
        }
    }
}

pub struct Equipment<R: RelayPort, C: ClockPort> {
    relays: Arc<Mutex<R>>,
    clock: C,
    timing: EquipmentTiming,
    state: EquipmentState,
    mode: ModeMachine,
    led_on: bool,
}

impl<R: RelayPort, C: ClockPort> Equipment<R, C> {
    /// Take ownership of the relay bank and drive every output off.
    pub fn new(relays: R, clock: C, timing: EquipmentTiming) -> Self {
        let mut relays = relays;
        relays.all_off();
        info!("EQUIP | init complete, all outputs off");
        Self {
            relays: Arc::new(Mutex::new(relays)),
            clock,
            timing,
            state: EquipmentState::all_off(),
            mode: ModeMachine::new(),
            led_on: false,
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> EquipmentState {
        self.state
    }

    pub fn mode(&self) -> SystemMode {
        self.mode.current()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn timing(&self) -> EquipmentTiming {
        self.timing
    }

    /// Handle for forcing outputs off without going through the owner.
    pub fn emergency_stop(&self) -> EmergencyStop<R> {
        EmergencyStop {
            relays: Arc::clone(&self.relays),
        }
    }

    /// Shared relay bank, for inspection.
    pub fn relays(&self) -> Arc<Mutex<R>> {
        Arc::clone(&self.relays)
    }

    // ── Primitive commands ────────────────────────────────────

    pub fn set_pump_power(&mut self, on: bool) -> Result<()> {
        if on == self.state.pump_power {
            return Ok(());
        }
        if on {
            self.write(RelayOutput::Pump, true)?;
            self.state.pump_power = true;
            info!("EQUIP | pump on");
            self.mode.apply(ModeEvent::PumpStarted);
            return Ok(());
        }

        if self.state.heater_power {
            warn!("EQUIP | turning pump off with heater on");
        }
        if matches!(self.mode.current(), SystemMode::Manual | SystemMode::Cooldown) {
            warn!("EQUIP | heater may not have cooled down yet");
        }
        self.set_heater_enable(false)?;
        self.set_heater_power(false)?;
        self.write(RelayOutput::Pump, false)?;
        self.state.pump_power = false;
        info!("EQUIP | pump off");
        self.mode.apply(ModeEvent::PumpStopped);
        Ok(())
    }

    /// Turning on blocks for the settle delay before returning.
    pub fn set_heater_power(&mut self, on: bool) -> Result<()> {
        if on == self.state.heater_power {
            return Ok(());
        }
        if on {
            if !self.state.pump_power {
                error!("EQUIP | heater power refused: pump is off");
                return Err(PreconditionViolation::HeaterWithoutPump.into());
            }
            self.write(RelayOutput::HeaterPower, true)?;
            self.state.heater_power = true;
            info!("EQUIP | heater power on");
            self.mode.apply(ModeEvent::HeaterPowered);
            return self.settle();
        }

        self.set_heater_enable(false)?;
        self.write(RelayOutput::HeaterPower, false)?;
        self.state.heater_power = false;
        info!("EQUIP | heater power off");
        self.mode.apply(ModeEvent::HeaterUnpowered);
        Ok(())
    }

    pub fn set_heater_enable(&mut self, on: bool) -> Result<()> {
        if on == self.state.heater_enable {
            return Ok(());
        }
        if on {
            if !self.state.pump_power {
                error!("EQUIP | heater enable refused: pump is off");
                return Err(PreconditionViolation::EnableWithoutPump.into());
            }
            if !self.state.heater_power {
                error!("EQUIP | heater enable refused: heater power is off");
                return Err(PreconditionViolation::EnableWithoutHeaterPower.into());
            }
        }
        self.write(RelayOutput::HeaterEnable, on)?;
        self.state.heater_enable = on;
        info!("EQUIP | heater enable {}", on_off(on));
        Ok(())
    }

    /// `Unknown` records the request and leaves both outputs as they are.
    pub fn set_valve_mode(&mut self, valve: ValveMode) -> Result<()> {
        let Some((v1, v2)) = valve.outputs() else {
            error!("EQUIP | unknown valve command, position now unknown");
            self.state.valve = ValveMode::Unknown;
            return Ok(());
        };
        if valve == self.state.valve {
            return Ok(());
        }
        // A failure between the two writes leaves the valves in no known
        // position.
        let written = self
            .write(RelayOutput::Valve1Dir, v1)
            .and_then(|()| self.write(RelayOutput::Valve2Dir, v2));
        if let Err(e) = written {
            self.state.valve = ValveMode::Unknown;
            return Err(e);
        }
        self.state.valve = valve;
        info!("EQUIP | valves set to {} mode", valve.label());
        Ok(())
    }

    pub fn set_spare_power(&mut self, on: bool) -> Result<()> {
        if on == self.state.spare_power {
            return Ok(());
        }
        self.write(RelayOutput::Spare, on)?;
        self.state.spare_power = on;
        info!("EQUIP | spare {}", on_off(on));
        Ok(())
    }

    /// Heartbeat LED, flipped once per second.
    pub fn toggle_activity_led(&mut self) -> Result<()> {
        let next = !self.led_on;
        self.write(RelayOutput::ActivityLed, next)?;
        self.led_on = next;
        Ok(())
    }

    /// Drive every output off regardless of state.  Cannot fail.
    pub fn shutdown_all(&mut self) {
        info!("EQUIP | shutting down all outputs");
        self.relays.lock().unwrap_or_else(PoisonError::into_inner).all_off();
        self.state = EquipmentState::all_off();
        self.led_on = false;
        self.mode.apply(ModeEvent::Shutdown);
    }

    // ── Composite operations ──────────────────────────────────

    /// Start a spa session of `hours`.  Returns the spa-off deadline.
    ///
    /// Steps run in a fixed order and the first failure aborts the rest:
    /// pump, settle, heater power (settles), valves to Spa, heater enable.
    pub fn spa_on(&mut self, hours: u8, scheduler: &mut EventScheduler) -> Result<NaiveDateTime> {
        validate_spa_hours(hours, self.timing.spa_max_hours)?;
        info!("EQUIP | spa on for {}h", hours);
        let start = self.clock.local_now();

        self.set_pump_power(true)?;
        self.settle()?;
        self.set_heater_power(true)?;
        self.set_valve_mode(ValveMode::Spa)?;
        self.set_heater_enable(true)?;
        // A manual run's deadline only gives way once the session is up.
        scheduler.clear_pump_off();
        self.mode.apply(ModeEvent::SpaStarted);

        let off_at = scheduler.arm_spa_off(start, hours, self.timing.spa_max_hours)?;
        info!("EQUIP | *** spa on ***");
        Ok(off_at)
    }

    /// End the spa session.  With the pump running this starts a cooldown
    /// run; with the pump already off everything just stops.
    pub fn spa_off(&mut self, scheduler: &mut EventScheduler) -> Result<()> {
        info!("EQUIP | spa off");
        scheduler.clear_spa_off();
        self.set_heater_enable(false)?;
        self.set_heater_power(false)?;

        if self.state.pump_power {
            let now = self.clock.local_now();
            scheduler.arm_pump_off(now, self.timing.cooldown)?;
            self.mode.apply(ModeEvent::SpaEnded);
            info!("EQUIP | *** starting cooldown ***");
        } else {
            self.mode.apply(ModeEvent::Halted);
        }
        self.set_valve_mode(ValveMode::Pool)
    }

    /// Timed manual pump run.  Refused while a spa session owns the pump.
    pub fn pump_on(&mut self, hours: u8, scheduler: &mut EventScheduler) -> Result<NaiveDateTime> {
        if self.mode.current() == SystemMode::SpaOn {
            warn!("EQUIP | manual pump run refused during spa session");
            return Err(PreconditionViolation::WrongMode.into());
        }
        let run = TimeDelta::hours(i64::from(hours));
        if hours == 0 {
            return Err(crate::error::SchedulerConfigError::ZeroDuration.into());
        }
        self.set_pump_power(true)?;
        let off_at = scheduler.arm_pump_off(self.clock.local_now(), run)?;
        self.mode.apply(ModeEvent::ManualRun);
        Ok(off_at)
    }

    /// Stop the pump and every pending deadline.
    pub fn pump_off(&mut self, scheduler: &mut EventScheduler) -> Result<()> {
        self.set_pump_power(false)?;
        scheduler.clear_pump_off();
        scheduler.clear_spa_off();
        self.mode.apply(ModeEvent::Halted);
        Ok(())
    }

    /// Freeze protection: run the pump for `run` and hold Freeze mode.
    pub fn freeze_protect(&mut self, run: TimeDelta, scheduler: &mut EventScheduler) -> Result<()> {
        self.set_pump_power(true)?;
        scheduler.arm_pump_off(self.clock.local_now(), run)?;
        self.mode.apply(ModeEvent::FreezeDetected);
        Ok(())
    }

    /// Air has recovered; the remaining freeze run continues as a manual run.
    pub fn clear_freeze(&mut self) {
        self.mode.apply(ModeEvent::FreezeCleared);
    }

    // ── Internal ──────────────────────────────────────────────

    fn write(&self, output: RelayOutput, on: bool) -> Result<()> {
        self.relays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set(output, on)
            .map_err(|e| {
                error!("EQUIP | {:?} write failed: {}", output, e);
                Error::Actuator(e)
            })
    }

    fn settle(&self) -> Result<()> {
        if self.clock.settle(self.timing.settle) {
            Ok(())
        } else {
            warn!("EQUIP | settle interrupted");
            Err(Error::Interrupted)
        }
    }
}

// ---------------------------------------------------------------------------
// Emergency stop
// ---------------------------------------------------------------------------

/// Forces all outputs off directly on the relay bank, bypassing the
/// owner's state.  For fatal paths where the owner may be unreachable.
pub struct EmergencyStop<R: RelayPort> {
    relays: Arc<Mutex<R>>,
}

impl<R: RelayPort> Clone for EmergencyStop<R> {
    fn clone(&self) -> Self {
        Self {
            relays: Arc::clone(&self.relays),
        }
    }
}

impl<R: RelayPort> EmergencyStop<R> {
    pub fn engage(&self, reason: &str) {
        error!("ESTOP | all outputs off: {}", reason);
        self.relays.lock().unwrap_or_else(PoisonError::into_inner).all_off();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::time::ManualClock;
    use crate::drivers::relays::SimRelays;
    use crate::error::SchedulerConfigError;

    fn make() -> (Equipment<SimRelays, ManualClock>, EventScheduler) {
        let timing = EquipmentTiming {
            settle: Duration::from_secs(1),
            spa_max_hours: 12,
            cooldown: TimeDelta::minutes(15),
        };
        (
            Equipment::new(SimRelays::new(), ManualClock::default(), timing),
            EventScheduler::new(),
        )
    }

    fn level(eq: &Equipment<SimRelays, ManualClock>, out: RelayOutput) -> bool {
        eq.relays().lock().unwrap().level(out)
    }

    #[test]
    fn heater_refused_without_pump() {
        let (mut eq, _) = make();
        let before = eq.state();
        assert_eq!(
            eq.set_heater_power(true),
            Err(Error::Precondition(PreconditionViolation::HeaterWithoutPump))
        );
        assert_eq!(eq.state(), before);
        assert!(!level(&eq, RelayOutput::HeaterPower));
    }

    #[test]
    fn enable_refused_without_pump() {
        let (mut eq, _) = make();
        let before = eq.state();
        assert_eq!(
            eq.set_heater_enable(true),
            Err(Error::Precondition(PreconditionViolation::EnableWithoutPump))
        );
        assert_eq!(eq.state(), before);
        assert!(!level(&eq, RelayOutput::HeaterEnable));
    }

    #[test]
    fn enable_refused_without_heater_power() {
        let (mut eq, _) = make();
        eq.set_pump_power(true).unwrap();
        let before = eq.state();
        assert_eq!(
            eq.set_heater_enable(true),
            Err(Error::Precondition(PreconditionViolation::EnableWithoutHeaterPower))
        );
        assert_eq!(eq.state(), before);
    }

    #[test]
    fn heater_power_settles() {
        let (mut eq, _) = make();
        eq.set_pump_power(true).unwrap();
        let t0 = eq.clock().uptime_secs();
        eq.set_heater_power(true).unwrap();
        assert_eq!(eq.clock().uptime_secs(), t0 + 1);
        assert_eq!(eq.mode(), SystemMode::SpaOn);
    }

    #[test]
    fn pump_off_drops_heater_chain_first() {
        let (mut eq, mut sched) = make();
        eq.spa_on(2, &mut sched).unwrap();
        eq.relays().lock().unwrap().clear_history();

        eq.set_pump_power(false).unwrap();
        let history = eq.relays().lock().unwrap().history().to_vec();
        assert_eq!(
            history,
            vec![
                (RelayOutput::HeaterEnable, false),
                (RelayOutput::HeaterPower, false),
                (RelayOutput::Pump, false),
            ]
        );
        assert!(eq.state().interlock_holds());
        assert_eq!(eq.mode(), SystemMode::Off);
    }

    #[test]
    fn valve_table() {
        let (mut eq, _) = make();
        for (valve, expect) in [
            (ValveMode::Spa, (true, true)),
            (ValveMode::Fill, (false, true)),
            (ValveMode::Drain, (true, false)),
            (ValveMode::Pool, (false, false)),
        ] {
            eq.set_valve_mode(valve).unwrap();
            assert_eq!(
                (level(&eq, RelayOutput::Valve1Dir), level(&eq, RelayOutput::Valve2Dir)),
                expect,
                "{valve:?}"
            );
            assert_eq!(eq.state().valve, valve);
        }
    }

    #[test]
    fn unknown_valve_keeps_outputs() {
        let (mut eq, _) = make();
        eq.set_valve_mode(ValveMode::Drain).unwrap();
        eq.set_valve_mode(ValveMode::from_code(9)).unwrap();
        assert_eq!(eq.state().valve, ValveMode::Unknown);
        assert!(level(&eq, RelayOutput::Valve1Dir));
        assert!(!level(&eq, RelayOutput::Valve2Dir));
    }

    #[test]
    fn spa_on_rejects_bad_hours_before_touching_outputs() {
        let (mut eq, mut sched) = make();
        assert_eq!(
            eq.spa_on(12, &mut sched),
            Err(Error::Scheduler(SchedulerConfigError::DurationTooLong))
        );
        assert_eq!(eq.state(), EquipmentState::all_off());
        assert!(sched.spa_off_at().is_none());
    }

    #[test]
    fn spa_off_with_pump_running_starts_cooldown() {
        let (mut eq, mut sched) = make();
        eq.spa_on(2, &mut sched).unwrap();
        eq.spa_off(&mut sched).unwrap();
        let s = eq.state();
        assert!(s.pump_power && !s.heater_power && !s.heater_enable);
        assert_eq!(s.valve, ValveMode::Pool);
        assert_eq!(eq.mode(), SystemMode::Cooldown);
        assert_eq!(
            sched.pump_off_at(),
            Some(eq.clock().local_now() + TimeDelta::minutes(15))
        );
        assert!(sched.spa_off_at().is_none());
    }

    #[test]
    fn manual_run_refused_during_spa() {
        let (mut eq, mut sched) = make();
        eq.spa_on(1, &mut sched).unwrap();
        assert_eq!(
            eq.pump_on(2, &mut sched),
            Err(Error::Precondition(PreconditionViolation::WrongMode))
        );
    }

    #[test]
    fn pump_on_then_off() {
        let (mut eq, mut sched) = make();
        let off_at = eq.pump_on(3, &mut sched).unwrap();
        assert_eq!(eq.mode(), SystemMode::Manual);
        assert_eq!(off_at, eq.clock().local_now() + TimeDelta::hours(3));
        eq.pump_off(&mut sched).unwrap();
        assert_eq!(eq.mode(), SystemMode::Off);
        assert!(sched.pump_off_at().is_none());
        assert!(!eq.state().pump_power);
    }

    #[test]
    fn shutdown_all_from_spa() {
        let (mut eq, mut sched) = make();
        eq.spa_on(2, &mut sched).unwrap();
        eq.set_spare_power(true).unwrap();
        eq.shutdown_all();
        assert_eq!(eq.state(), EquipmentState::all_off());
        assert_eq!(eq.mode(), SystemMode::Off);
        for out in RelayOutput::ALL {
            assert!(!level(&eq, out), "{out:?} still on");
        }
    }

    #[test]
    fn interrupted_settle_aborts_spa_on() {
        let (mut eq, mut sched) = make();
        eq.clock().interrupt();
        assert_eq!(eq.spa_on(2, &mut sched), Err(Error::Interrupted));
        assert!(!eq.state().heater_power);
        assert!(sched.spa_off_at().is_none());
    }

    #[test]
    fn failed_spa_on_keeps_manual_run_deadline() {
        let (mut eq, mut sched) = make();
        let deadline = eq.pump_on(3, &mut sched).unwrap();
        eq.clock().interrupt();
        assert_eq!(eq.spa_on(2, &mut sched), Err(Error::Interrupted));
        assert_eq!(sched.pump_off_at(), Some(deadline));
        assert_eq!(eq.mode(), SystemMode::Manual);
    }

    #[test]
    fn emergency_stop_bypasses_owner() {
        let (mut eq, _) = make();
        eq.set_pump_power(true).unwrap();
        eq.emergency_stop().engage("test");
        assert!(!level(&eq, RelayOutput::Pump));
    }
}
