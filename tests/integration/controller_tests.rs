//! End-to-end scenarios through ControlService on mock hardware.

use chrono::TimeDelta;
use poolctl::app::commands::{Intent, RemoteCommand, Step};
use poolctl::app::ports::RelayOutput;
use poolctl::config::{PumpWindowConfig, SystemConfig};
use poolctl::drivers::button::PanelButton;
use poolctl::equipment::ValveMode;
use poolctl::fsm::SystemMode;
use poolctl::sensors::SensorId;

use crate::mock_hw::{Rig, at};

/// Replay a relay log and check the heater interlock after every write.
fn assert_interlock_never_broken(writes: &[(RelayOutput, bool)]) {
    let (mut pump, mut heater, mut enable) = (false, false, false);
    for (i, (output, on)) in writes.iter().enumerate() {
        match output {
            RelayOutput::Pump => pump = *on,
            RelayOutput::HeaterPower => heater = *on,
            RelayOutput::HeaterEnable => enable = *on,
            _ => {}
        }
        assert!(
            (!enable || heater) && (!heater || pump),
            "interlock broken at write {i}: {output:?}={on}"
        );
    }
}

// ── Spa session ───────────────────────────────────────────────

#[test]
fn spa_session_heats_cools_down_and_stops() {
    let mut rig = Rig::new();
    rig.tick();

    rig.send(RemoteCommand::SpaOn { hours: Some(2) });
    assert_eq!(rig.mode(), SystemMode::SpaOn);
    let state = rig.service.equipment().state();
    assert!(state.pump_power && state.heater_power && state.heater_enable);
    assert_eq!(state.valve, ValveMode::Spa);
    assert_eq!(
        rig.service.scheduler().spa_off_at(),
        Some(at(2024, 6, 1, 14, 0, 0))
    );

    // Water reaches the setpoint: the thermostat drops the enable only.
    rig.set_temp(SensorId::Spa, 94.0);
    rig.run_for(10);
    let state = rig.service.equipment().state();
    assert!(!state.heater_enable);
    assert!(state.heater_power);
    assert_eq!(rig.mode(), SystemMode::SpaOn);

    // Cooling again, but inside the lockout.
    rig.set_temp(SensorId::Spa, 92.0);
    rig.run_for(30);
    assert!(!rig.service.equipment().state().heater_enable);
    rig.run_for(100);
    assert!(rig.service.equipment().state().heater_enable);

    // Session deadline.
    rig.run_until_mode_leaves(SystemMode::SpaOn, 2 * 3600).expect("spa never ended");
    assert_eq!(rig.mode(), SystemMode::Cooldown);
    let state = rig.service.equipment().state();
    assert!(state.pump_power);
    assert!(!state.heater_power && !state.heater_enable);
    assert_eq!(state.valve, ValveMode::Pool);
    assert!(rig.row(1).contains("Cooldown 15 min"));

    let secs = rig
        .run_until_mode_leaves(SystemMode::Cooldown, 16 * 60)
        .expect("cooldown never ended");
    assert!(secs >= 15 * 60 - 1);
    assert_eq!(rig.mode(), SystemMode::Off);
    assert!(!rig.service.equipment().state().pump_power);

    assert_interlock_never_broken(&rig.relays.equipment_writes());
}

#[test]
fn over_temperature_cuts_heater_power() {
    let mut rig = Rig::new();
    rig.send(RemoteCommand::SpaOn { hours: Some(3) });
    rig.set_temp(SensorId::Spa, 105.0);
    rig.run_for(10);

    assert_eq!(rig.mode(), SystemMode::Cooldown);
    let state = rig.service.equipment().state();
    assert!(!state.heater_power && !state.heater_enable);
    assert!(state.pump_power, "pump keeps circulating after a trip");
    assert!(rig.row(1).contains("Spa over max temp"));
}

#[test]
fn losing_the_spa_sensor_ends_the_session() {
    let mut rig = Rig::new();
    rig.send(RemoteCommand::SpaOn { hours: Some(2) });
    rig.intent(Intent::SensorFault(SensorId::Spa));

    assert_eq!(rig.mode(), SystemMode::Cooldown);
    assert!(!rig.service.equipment().state().heater_power);
    assert!(rig.service.scheduler().spa_off_at().is_none());
    assert!(rig.service.scheduler().pump_off_at().is_some());
}

#[test]
fn spa_longer_than_maximum_is_refused() {
    let mut rig = Rig::new();
    rig.relays.clear();
    rig.send(RemoteCommand::SpaOn { hours: Some(12) });
    assert_eq!(rig.mode(), SystemMode::Off);
    assert!(rig.relays.equipment_writes().is_empty());
}

// ── Freeze protection ─────────────────────────────────────────

#[test]
fn freeze_runs_pump_then_hands_over_to_manual() {
    let mut rig = Rig::new();
    rig.set_temp(SensorId::Air, 30.0);
    // 12:00:00 is a freeze-check second.
    rig.tick();
    assert_eq!(rig.mode(), SystemMode::Freeze);
    assert!(rig.service.equipment().state().pump_power);
    assert_eq!(rig.status.get("sm").as_deref(), Some("FREZ"));

    rig.set_temp(SensorId::Air, 40.0);
    rig.run_for(60);
    assert_eq!(rig.mode(), SystemMode::Manual);

    // The hour-long freeze run still ends on time.
    rig.run_until_mode_leaves(SystemMode::Manual, 3600).expect("run never ended");
    assert_eq!(rig.mode(), SystemMode::Off);
    assert!(!rig.service.equipment().state().pump_power);
}

#[test]
fn freeze_guard_leaves_spa_sessions_alone() {
    let mut rig = Rig::new();
    rig.send(RemoteCommand::SpaOn { hours: Some(2) });
    rig.set_temp(SensorId::Air, 20.0);
    rig.run_for(120);
    assert_eq!(rig.mode(), SystemMode::SpaOn);
}

// ── Pump windows ──────────────────────────────────────────────

fn one_minute_window() -> SystemConfig {
    let mut config = SystemConfig::default();
    config.pump_windows[0] = PumpWindowConfig {
        start_hour: 9,
        start_minute: 0,
        duration_minutes: 1,
    };
    config
}

#[test]
fn window_starts_and_stops_the_pump() {
    let mut rig = Rig::with(one_minute_window(), at(2024, 6, 1, 8, 59, 55));
    rig.tick();
    rig.run_for(10);
    assert_eq!(rig.mode(), SystemMode::PumpOn);
    assert_eq!(rig.status.get("pp").as_deref(), Some("1"));

    rig.run_for(60);
    assert_eq!(rig.mode(), SystemMode::Off);
    assert_eq!(rig.status.get("pp").as_deref(), Some("0"));
}

#[test]
fn window_off_waits_for_spa_and_cooldown() {
    let mut rig = Rig::with(one_minute_window(), at(2024, 6, 1, 8, 59, 55));
    rig.tick();
    rig.run_for(10);
    assert_eq!(rig.mode(), SystemMode::PumpOn);

    rig.send(RemoteCommand::SpaOn { hours: Some(1) });
    rig.run_for(60);
    assert_eq!(rig.mode(), SystemMode::SpaOn);
    assert!(rig.service.equipment().state().pump_power);

    rig.send(RemoteCommand::SpaOff);
    assert_eq!(rig.mode(), SystemMode::Cooldown);
    rig.run_for(5 * 60);
    assert!(rig.service.equipment().state().pump_power, "deferred off must not cut cooldown");

    rig.run_until_mode_leaves(SystemMode::Cooldown, 11 * 60).expect("cooldown never ended");
    rig.run_for(2);
    assert_eq!(rig.mode(), SystemMode::Off);
}

// ── Manual runs and adjustments ───────────────────────────────

#[test]
fn manual_run_time_adjust() {
    let mut rig = Rig::new();
    rig.send(RemoteCommand::PumpOn { hours: Some(1) });
    assert_eq!(rig.mode(), SystemMode::Manual);

    rig.send(RemoteCommand::TimeAdjust(Step::Up));
    assert_eq!(
        rig.service.scheduler().pump_off_at(),
        Some(at(2024, 6, 1, 14, 0, 0))
    );
    rig.run_for(1);
    assert_eq!(rig.status.get("tr").as_deref(), Some("1:59:59"));

    rig.send(RemoteCommand::TimeAdjust(Step::Down));
    rig.send(RemoteCommand::TimeAdjust(Step::Down));
    // The second step would land in the past and is refused.
    assert_eq!(
        rig.service.scheduler().pump_off_at(),
        Some(at(2024, 6, 1, 13, 0, 0))
    );
    assert!(rig.row(1).contains("Invalid time"));
}

#[test]
fn setpoint_stays_inside_heater_bounds() {
    let mut rig = Rig::new();
    for _ in 0..20 {
        rig.send(RemoteCommand::TempAdjust(Step::Up));
    }
    assert_eq!(rig.service.thermostat().setpoint(), 104.0);
    assert!(rig.row(1).contains("Setpoint at limit"));
    for _ in 0..20 {
        rig.send(RemoteCommand::TempAdjust(Step::Down));
    }
    assert_eq!(rig.service.thermostat().setpoint(), 90.0);
}

#[test]
fn spare_relay_and_valve_commands() {
    let mut rig = Rig::new();
    rig.send(RemoteCommand::Spare(true));
    rig.send(RemoteCommand::ValveMode(ValveMode::Fill));
    let writes = rig.relays.equipment_writes();
    assert!(writes.contains(&(RelayOutput::Spare, true)));
    assert!(writes.contains(&(RelayOutput::Valve2Dir, true)));

    // Unknown positions leave the outputs alone.
    rig.relays.clear();
    rig.send(RemoteCommand::ValveMode(ValveMode::Unknown));
    assert!(rig.relays.equipment_writes().is_empty());
    assert_eq!(rig.service.equipment().state().valve, ValveMode::Unknown);
}

// ── Front panel ───────────────────────────────────────────────

#[test]
fn panel_starts_and_stops_a_spa_session() {
    let mut rig = Rig::new();
    rig.intent(Intent::Button(PanelButton::Four));
    assert!(rig.row(0).contains("SPA TIME"));
    rig.intent(Intent::Button(PanelButton::Two));
    assert!(rig.row(1).contains("Time = 3 hours"));
    rig.intent(Intent::Button(PanelButton::Four));
    assert_eq!(rig.mode(), SystemMode::SpaOn);
    let remaining = rig.service.snapshot().time_remaining.unwrap();
    assert!(remaining > TimeDelta::hours(2) && remaining <= TimeDelta::hours(3));

    // Spa button on the main screen while the spa runs ends it.
    rig.intent(Intent::Button(PanelButton::Four));
    assert_eq!(rig.mode(), SystemMode::Cooldown);
}

#[test]
fn panel_clean_spa_runs_the_drain() {
    let mut rig = Rig::new();
    rig.intent(Intent::Button(PanelButton::One));
    assert!(rig.row(0).contains("Clean Spa"));
    rig.intent(Intent::Button(PanelButton::Four));
    assert_eq!(rig.mode(), SystemMode::Manual);
    assert_eq!(rig.service.equipment().state().valve, ValveMode::Drain);
}

// ── Exit paths ────────────────────────────────────────────────

#[test]
fn shutdown_leaves_everything_off() {
    use poolctl::app::events::{ExitReason, LoopControl};

    let mut rig = Rig::new();
    rig.send(RemoteCommand::SpaOn { hours: Some(2) });
    let control = rig.send(RemoteCommand::Shutdown);
    assert_eq!(control, LoopControl::Exit(ExitReason::Shutdown));

    rig.service.finish(ExitReason::Shutdown, &mut rig.display);
    let state = rig.service.equipment().state();
    assert!(!state.pump_power && !state.heater_power && !state.heater_enable);
    assert_eq!(rig.mode(), SystemMode::Off);
    assert!(rig.service.scheduler().spa_off_at().is_none());
    assert_eq!(rig.display.backlight(), Some((0, 0, 255)));
    assert!(rig.display.rows().iter().any(|r| r.contains("System Off")));
}
