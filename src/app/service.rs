//! Control service: the hexagonal core and the sole writer of equipment
//! state.
//!
//! [`ControlService`] owns the equipment, the mode machine (through the
//! equipment), the scheduler, the thermostat, the freeze guard and the
//! panel menu.  Everything that changes state reaches it as an
//! [`Intent`] or as a call to [`tick`](ControlService::tick) from the
//! same thread, so there is exactly one writer.
//!
//! ```text
//!  IntentQueue ──▶ ┌────────────────────────────┐ ──▶ DisplayPort
//!                  │       ControlService       │ ──▶ StatusSink
//!  SharedSensors ─▶│ Equipment · Scheduler ·    │
//!     (read)       │ Thermostat · Freeze · Panel│ ──▶ RelayPort
//!                  └────────────────────────────┘
//! ```

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use log::{error, info, warn};
use std::sync::PoisonError;

use crate::config::SystemConfig;
use crate::control::thermostat::{Thermostat, ThermostatOutcome};
use crate::display::{self, Line, ScreenWriter};
use crate::equipment::{Equipment, EquipmentTiming, ValveMode};
use crate::error::{Error, PreconditionViolation, Result};
use crate::fsm::SystemMode;
use crate::safety::{FreezeGuard, FreezeOutcome};
use crate::scheduler::{Deadline, EventScheduler, TimerAction, WINDOW_SLOTS};
use crate::sensors::{self, SensorId, SharedSensors};

use super::commands::{Intent, RemoteCommand, Step};
use super::events::{ControllerSnapshot, ExitReason, LoopControl};
use super::panel::{Panel, PanelAction};
use super::ports::{ClockPort, DisplayPort, RelayPort, StatusSink};

/// How long a short message stays on the main screen (seconds).
const MESSAGE_SECS: u64 = 3;

const FULL_BRIGHTNESS: u8 = 255;

/// Backlight for the final "System Off" screen.
const OFF_BACKLIGHT: (u8, u8, u8) = (0, 0, 255);

// ───────────────────────────────────────────────────────────────
// ControlService
// ───────────────────────────────────────────────────────────────

pub struct ControlService<R: RelayPort, C: ClockPort> {
    config: SystemConfig,
    equipment: Equipment<R, C>,
    scheduler: EventScheduler,
    thermostat: Thermostat,
    freeze: FreezeGuard,
    panel: Panel,
    sensors: SharedSensors,
    writer: ScreenWriter,
    /// Short message and the uptime second it expires at.
    message: Option<(Line, u64)>,
    last_second: Option<NaiveDateTime>,
    last_date: Option<NaiveDate>,
    ticks: u64,
}

impl<R: RelayPort, C: ClockPort> ControlService<R, C> {
    /// Build the service and arm the configured pump windows.  Outputs are
    /// driven off before anything else happens.
    pub fn new(config: SystemConfig, relays: R, clock: C, sensors: SharedSensors) -> Result<Self> {
        let equipment = Equipment::new(relays, clock, EquipmentTiming::from_config(&config));
        let mut scheduler = EventScheduler::new();
        for (slot, w) in config.pump_windows.iter().enumerate().take(WINDOW_SLOTS) {
            scheduler.set_window(slot, w.start_hour, w.start_minute, w.duration_minutes)?;
        }

        Ok(Self {
            thermostat: Thermostat::new(config.thermostat),
            freeze: FreezeGuard::from_config(&config),
            panel: Panel::new(config.default_run_hours, config.spa_max_hours),
            equipment,
            scheduler,
            sensors,
            writer: ScreenWriter::new(),
            message: None,
            last_second: None,
            last_date: None,
            ticks: 0,
            config,
        })
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn equipment(&self) -> &Equipment<R, C> {
        &self.equipment
    }

    pub fn scheduler(&self) -> &EventScheduler {
        &self.scheduler
    }

    pub fn thermostat(&self) -> &Thermostat {
        &self.thermostat
    }

    pub fn panel(&self) -> &Panel {
        &self.panel
    }

    pub fn mode(&self) -> SystemMode {
        self.equipment.mode()
    }

    /// Seconds processed by [`tick`](Self::tick) since startup.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Consistent copy of the whole controller state.
    pub fn snapshot(&self) -> ControllerSnapshot {
        let now = self.equipment.clock().local_now();
        let mode = self.equipment.mode();
        ControllerSnapshot {
            at: now,
            uptime_secs: self.equipment.clock().uptime_secs(),
            mode,
            equipment: self.equipment.state(),
            setpoint_f: self.thermostat.setpoint(),
            sensors: sensors::snapshot(&self.sensors),
            time_remaining: self.scheduler.time_remaining(mode, now),
            windows: core::array::from_fn(|slot| self.scheduler.window(slot)),
            pump_off_at: self.scheduler.pump_off_at(),
            next_pump_off: self.scheduler.next_pump_off(now),
            spa_off_at: self.scheduler.spa_off_at(),
        }
    }

    // ── Intents ───────────────────────────────────────────────

    /// Apply one intent.  Failures are logged and shown on the display;
    /// they never stop the loop.
    pub fn handle_intent(&mut self, intent: Intent, display: &mut impl DisplayPort) -> LoopControl {
        let result = match intent {
            Intent::Remote(cmd) => {
                info!("CMD | {:?}", cmd);
                self.execute(cmd)
            }
            Intent::Button(button) => {
                let state = self.equipment.state();
                match self.panel.press(button, self.equipment.mode(), state.pump_power) {
                    Some(PanelAction::Command(cmd)) => {
                        info!("PANEL | {:?}", cmd);
                        self.execute(cmd)
                    }
                    Some(PanelAction::CleanSpa) => self.clean_spa().map(|()| LoopControl::Continue),
                    None => Ok(LoopControl::Continue),
                }
            }
            Intent::SensorFault(id) => self.sensor_fault(id).map(|()| LoopControl::Continue),
        };

        let control = match result {
            Ok(control) => control,
            Err(e) => {
                error!("CMD | {:?} failed: {}", intent, e);
                self.show_message(e.display_text());
                LoopControl::Continue
            }
        };
        if control == LoopControl::Continue {
            self.refresh_display(display);
        }
        control
    }

    fn execute(&mut self, cmd: RemoteCommand) -> Result<LoopControl> {
        let default_hours = self.config.default_run_hours;
        match cmd {
            RemoteCommand::PumpOn { hours } => {
                self.equipment
                    .pump_on(hours.unwrap_or(default_hours), &mut self.scheduler)?;
            }
            RemoteCommand::PumpOff => self.equipment.pump_off(&mut self.scheduler)?,
            RemoteCommand::SpaOn { hours } => {
                self.equipment
                    .spa_on(hours.unwrap_or(default_hours), &mut self.scheduler)?;
            }
            RemoteCommand::SpaOff => self.end_spa()?,
            RemoteCommand::ValveMode(valve) => self.equipment.set_valve_mode(valve)?,
            RemoteCommand::TempAdjust(step) => {
                if !self.thermostat.adjust_setpoint(step) {
                    self.show_message("Setpoint at limit");
                }
            }
            RemoteCommand::TimeAdjust(step) => self.adjust_time(step)?,
            RemoteCommand::Spare(on) => self.equipment.set_spare_power(on)?,
            RemoteCommand::Shutdown => return Ok(LoopControl::Exit(ExitReason::Shutdown)),
            RemoteCommand::Reboot => return Ok(LoopControl::Exit(ExitReason::Reboot)),
            RemoteCommand::Exit => return Ok(LoopControl::Exit(ExitReason::Exit)),
        }
        Ok(LoopControl::Continue)
    }

    /// Move the deadline that governs the current mode by one hour.
    fn adjust_time(&mut self, step: Step) -> Result<()> {
        let which = match self.equipment.mode() {
            SystemMode::SpaOn => Deadline::SpaOff,
            SystemMode::Manual => Deadline::PumpOff,
            _ => return Err(PreconditionViolation::WrongMode.into()),
        };
        let now = self.equipment.clock().local_now();
        self.scheduler.adjust(which, step.sign(), now)?;
        Ok(())
    }

    /// One-hour pump run with the valves set to drain.
    fn clean_spa(&mut self) -> Result<()> {
        info!("PANEL | clean spa");
        self.show_message("Cleaning spa");
        self.equipment.pump_on(1, &mut self.scheduler)?;
        self.equipment.set_valve_mode(ValveMode::Drain)
    }

    fn end_spa(&mut self) -> Result<()> {
        let was_heating = self.equipment.state().heater_enable;
        self.equipment.spa_off(&mut self.scheduler)?;
        if was_heating {
            self.thermostat.note_heater_off(self.equipment.clock().uptime_secs());
        }
        if self.equipment.mode() == SystemMode::Cooldown {
            self.show_message(&format!("Cooldown {} min", self.config.cooldown_minutes));
        }
        Ok(())
    }

    fn sensor_fault(&mut self, id: SensorId) -> Result<()> {
        warn!("SENSOR | {} fault reported", id.name());
        if id == SensorId::Spa && self.equipment.mode() == SystemMode::SpaOn {
            error!("SENSOR | spa sensor lost, ending spa session");
            self.show_message("Spa sensor fault");
            self.end_spa()?;
        }
        Ok(())
    }

    // ── Per-second work ───────────────────────────────────────

    /// Run the once-per-second work if the wall clock has moved to a new
    /// second since the last call.  Returns `true` when it ran.
    pub fn tick(&mut self, display: &mut impl DisplayPort, status: &mut impl StatusSink) -> bool {
        let now = self.equipment.clock().local_now();
        let now = now.with_nanosecond(0).unwrap_or(now);
        if self.last_second.is_some_and(|last| now <= last) {
            return false;
        }
        self.last_second = Some(now);
        self.ticks += 1;

        self.run_timers(now);

        if let Err(e) = self.equipment.toggle_activity_led() {
            warn!("TICK | activity LED: {}", e);
        }

        let second_of_day = u64::from(now.num_seconds_from_midnight());
        if second_of_day % self.config.thermostat_interval_secs == 0 {
            self.run_thermostat();
        }
        if second_of_day % self.config.freeze_check_interval_secs == 0 {
            self.run_freeze_guard();
        }
        self.daily_maintenance(now.date());

        self.apply_brightness(display, now.hour() as u8);
        self.refresh_display(display);

        let snap = self.snapshot();
        publish(status, &snap.status_fields());
        if second_of_day % self.config.info_interval_secs == 0 {
            publish(status, &snap.info_fields());
        }
        true
    }

    fn run_timers(&mut self, now: NaiveDateTime) {
        for action in self.scheduler.evaluate(now, self.equipment.mode()) {
            info!("TIMER | {:?} fired", action);
            if let Err(e) = self.dispatch_timer(action) {
                error!("TIMER | {:?} failed: {}", action, e);
                self.show_message(e.display_text());
            }
        }
    }

    fn dispatch_timer(&mut self, action: TimerAction) -> Result<()> {
        match action {
            TimerAction::WindowOn(slot) => {
                if self.equipment.state().pump_power {
                    info!("TIMER | window {} on skipped, pump already running", slot + 1);
                    return Ok(());
                }
                self.equipment.set_pump_power(true)?;
                self.scheduler.note_window_run(slot);
            }
            TimerAction::WindowOff(slot) => {
                // A manual run keeps its own deadline.
                if self.scheduler.pump_off_at().is_some() {
                    info!("TIMER | window {} off skipped, timed run active", slot + 1);
                    return Ok(());
                }
                self.equipment.pump_off(&mut self.scheduler)?;
            }
            TimerAction::PumpOffDeadline => self.equipment.pump_off(&mut self.scheduler)?,
            TimerAction::SpaOffDeadline => self.end_spa()?,
        }
        Ok(())
    }

    fn run_thermostat(&mut self) {
        if self.equipment.mode() != SystemMode::SpaOn {
            return;
        }
        let readings = sensors::snapshot(&self.sensors);
        match self
            .thermostat
            .evaluate(&mut self.equipment, &readings, &mut self.scheduler)
        {
            Ok(ThermostatOutcome::OverTemp(trip)) => self.show_message(Error::Safety(trip).display_text()),
            Ok(ThermostatOutcome::SensorFault(e)) => self.show_message(Error::Sensor(e).display_text()),
            Ok(_) => {}
            Err(e) => {
                error!("THERM | evaluation failed: {}", e);
                self.show_message(e.display_text());
            }
        }
    }

    fn run_freeze_guard(&mut self) {
        let readings = sensors::snapshot(&self.sensors);
        match self
            .freeze
            .check(&mut self.equipment, &readings, &mut self.scheduler)
        {
            Ok(FreezeOutcome::Tripped(trip)) => self.show_message(Error::Safety(trip).display_text()),
            Ok(_) => {}
            Err(e) => error!("FREEZE | protection failed: {}", e),
        }
    }

    /// Reset sensor errors on the first tick of a new day.
    fn daily_maintenance(&mut self, today: NaiveDate) {
        let rolled = self.last_date.is_some_and(|d| d != today);
        self.last_date = Some(today);
        if rolled {
            info!("DAILY | resetting sensor errors");
            self.sensors
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .reset_all();
        }
    }

    // ── Display ───────────────────────────────────────────────

    fn show_message(&mut self, text: &str) {
        let until = self.equipment.clock().uptime_secs() + MESSAGE_SECS;
        self.message = Some((display::centered(text), until));
    }

    fn apply_brightness(&mut self, display: &mut impl DisplayPort, hour: u8) {
        let dim = hour >= self.config.dim_hour || hour < self.config.bright_hour;
        let level = if dim {
            self.config.dim_brightness
        } else {
            FULL_BRIGHTNESS
        };
        if let Err(e) = self.writer.brightness(display, level) {
            warn!("DISPLAY | brightness: {}", e);
        }
    }

    fn refresh_display(&mut self, display: &mut impl DisplayPort) {
        let uptime = self.equipment.clock().uptime_secs();
        if self.message.as_ref().is_some_and(|(_, until)| uptime >= *until) {
            self.message = None;
        }

        let snap = self.snapshot();
        let screen = match (&self.message, self.panel.render(snap.setpoint_f)) {
            (_, Some(menu)) => menu,
            (Some((text, _)), None) => {
                let mut screen = display::main_screen(&snap);
                screen[1] = text.clone();
                screen
            }
            (None, None) => display::main_screen(&snap),
        };

        let drawn = self
            .writer
            .backlight(display, snap.mode.backlight())
            .and_then(|()| self.writer.draw(display, &screen));
        if let Err(e) = drawn {
            warn!("DISPLAY | update failed: {}", e);
        }
    }

    // ── Shutdown ──────────────────────────────────────────────

    /// Drive every output off and leave a final screen.  Infallible.
    pub fn finish(&mut self, reason: ExitReason, display: &mut impl DisplayPort) {
        info!("CTRL | stopping: {:?}", reason);
        self.equipment.shutdown_all();
        self.scheduler.clear_pump_off();
        self.scheduler.clear_spa_off();

        let text = match reason {
            ExitReason::Shutdown => "System Off",
            ExitReason::Reboot => "Rebooting",
            ExitReason::Exit | ExitReason::Signalled => "Controller stopped",
        };
        let painted = self
            .writer
            .invalidate(display)
            .and_then(|()| self.writer.backlight(display, OFF_BACKLIGHT))
            .and_then(|()| self.writer.draw(display, &display::message_screen(text)));
        if let Err(e) = painted {
            warn!("DISPLAY | final screen: {}", e);
        }
    }
}

fn publish(status: &mut impl StatusSink, fields: &[(&'static str, String)]) {
    for (key, value) in fields {
        if let Err(e) = status.set(key, value) {
            warn!("STATUS | {} not published: {}", key, e);
            return;
        }
    }
}
