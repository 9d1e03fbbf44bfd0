//! System configuration parameters
//!
//! All tunable parameters for the pool controller. Loaded once at startup
//! through a [`ConfigPort`](crate::app::ports::ConfigPort) and immutable
//! afterwards.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// A recurring daily pump window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PumpWindowConfig {
    pub start_hour: u8,
    pub start_minute: u8,
    pub duration_minutes: u16,
}

/// Heater thermostat parameters (degrees Fahrenheit, seconds).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermostatSettings {
    pub setpoint_f: f32,
    pub hysteresis_f: f32,
    pub min_temp_f: f32,
    pub max_temp_f: f32,
    pub lockout_secs: u64,
}

impl Default for ThermostatSettings {
    fn default() -> Self {
        Self {
            setpoint_f: 93.0,
            hysteresis_f: 0.5,
            min_temp_f: 90.0,
            max_temp_f: 104.0,
            lockout_secs: 120,
        }
    }
}

/// One-wire device IDs assigned to each logical sensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorIds {
    pub spa: String,
    pub controller: String,
    pub air: String,
}

impl Default for SensorIds {
    fn default() -> Self {
        Self {
            spa: "0416c1da95ff".into(),
            controller: "0000062aeeb9".into(),
            air: "0000053ccec8".into(),
        }
    }
}

/// Which hardware backend the binary drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-memory pins and a synthetic one-wire bus.
    Sim,
    /// Linux sysfs GPIO and the `w1` kernel driver.
    Sysfs,
}

/// GPIO numbering and device paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    pub backend: Backend,
    pub pump_pin: u8,
    pub heater_pin: u8,
    pub heater_enable_pin: u8,
    pub valve1_pin: u8,
    pub valve2_pin: u8,
    pub spare_pin: u8,
    pub led_pin: u8,
    pub led_return_pin: u8,
    /// Panel buttons in order: Menu, Temp, Pump, Spa.
    pub button_pins: [u8; 4],
    /// Directory holding one-wire device folders.
    pub w1_devices_dir: String,
    /// Serial device of the character LCD; `None` logs the screen instead.
    pub lcd_port: Option<String>,
    /// Allow Shutdown/Reboot commands to power-cycle the host.
    pub allow_host_power: bool,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Sim,
            pump_pin: crate::pins::PUMP_GPIO,
            heater_pin: crate::pins::HEATER_GPIO,
            heater_enable_pin: crate::pins::HEATER_ENABLE_GPIO,
            valve1_pin: crate::pins::VALVE1_DIR_GPIO,
            valve2_pin: crate::pins::VALVE2_DIR_GPIO,
            spare_pin: crate::pins::SPARE_GPIO,
            led_pin: crate::pins::ACTIVITY_LED_GPIO,
            led_return_pin: crate::pins::LED_RETURN_GPIO,
            button_pins: crate::pins::BUTTON_GPIOS,
            w1_devices_dir: "/sys/bus/w1/devices".into(),
            lcd_port: None,
            allow_host_power: false,
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    // --- Schedule ---
    /// The two recurring daily pump windows.
    pub pump_windows: [PumpWindowConfig; 2],
    /// Default run length for remote PumpOn / SpaOn (hours).
    pub default_run_hours: u8,
    /// Spa sessions must be shorter than this (hours).
    pub spa_max_hours: u8,
    /// Pump keeps running this long after the heater shuts off (minutes).
    pub cooldown_minutes: u16,
    /// Pump run length when freeze protection trips (hours).
    pub freeze_run_hours: u8,

    // --- Heater ---
    pub thermostat: ThermostatSettings,
    /// Air temperature below which freeze protection trips (°F).
    pub freeze_temp_f: f32,

    // --- Sensors ---
    pub sensor_ids: SensorIds,
    /// Consecutive read failures tolerated before a sensor is disabled.
    pub sensor_error_limit: u32,
    /// Per-read timeout on the one-wire bus (milliseconds).
    pub sensor_read_timeout_ms: u64,

    // --- Timing ---
    /// Relay settle delay after energising pump or heater (milliseconds).
    pub settle_ms: u64,
    /// How long startup waits for initial sensor readings (seconds).
    pub startup_timeout_secs: u64,
    /// Control loop wake interval (milliseconds).
    pub control_loop_interval_ms: u64,
    /// Panel button polling interval (milliseconds).
    pub input_poll_interval_ms: u64,
    /// Thermostat evaluation cadence while the spa runs (seconds).
    pub thermostat_interval_secs: u64,
    /// Freeze-guard evaluation cadence (seconds).
    pub freeze_check_interval_secs: u64,
    /// Extended status publication cadence (seconds).
    pub info_interval_secs: u64,

    // --- Display ---
    pub dim_hour: u8,
    pub bright_hour: u8,
    pub dim_brightness: u8,

    // --- Hardware ---
    pub hardware: HardwareConfig,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Schedule
            pump_windows: [
                PumpWindowConfig {
                    start_hour: 9,
                    start_minute: 0,
                    duration_minutes: 120,
                },
                PumpWindowConfig {
                    start_hour: 19,
                    start_minute: 0,
                    duration_minutes: 60,
                },
            ],
            default_run_hours: 2,
            spa_max_hours: 12,
            cooldown_minutes: 15,
            freeze_run_hours: 1,

            // Heater
            thermostat: ThermostatSettings::default(),
            freeze_temp_f: 32.0,

            // Sensors
            sensor_ids: SensorIds::default(),
            sensor_error_limit: 10,
            sensor_read_timeout_ms: 2000,

            // Timing
            settle_ms: 1000,
            startup_timeout_secs: 60,
            control_loop_interval_ms: 250,
            input_poll_interval_ms: 50,
            thermostat_interval_secs: 10,
            freeze_check_interval_secs: 60,
            info_interval_secs: 5,

            // Display
            dim_hour: 21,
            bright_hour: 6,
            dim_brightness: 64,

            hardware: HardwareConfig::default(),
        }
    }
}

impl SystemConfig {
    /// Range-check every field. Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for w in &self.pump_windows {
            if w.start_hour > 23 || w.start_minute > 59 {
                return Err(ConfigError::ValidationFailed("pump_windows: time of day"));
            }
            if w.duration_minutes == 0 || w.duration_minutes >= 24 * 60 {
                return Err(ConfigError::ValidationFailed("pump_windows: duration"));
            }
        }
        if self.spa_max_hours < 2 || self.spa_max_hours > 24 {
            return Err(ConfigError::ValidationFailed("spa_max_hours must be 2..=24"));
        }
        if self.default_run_hours == 0 || self.default_run_hours >= self.spa_max_hours {
            return Err(ConfigError::ValidationFailed(
                "default_run_hours must be 1..spa_max_hours",
            ));
        }
        if self.cooldown_minutes == 0 {
            return Err(ConfigError::ValidationFailed("cooldown_minutes must be > 0"));
        }
        if self.freeze_run_hours == 0 {
            return Err(ConfigError::ValidationFailed("freeze_run_hours must be > 0"));
        }

        let t = &self.thermostat;
        if !(t.min_temp_f < t.max_temp_f) {
            return Err(ConfigError::ValidationFailed("thermostat: min_temp_f >= max_temp_f"));
        }
        if t.setpoint_f < t.min_temp_f || t.setpoint_f > t.max_temp_f {
            return Err(ConfigError::ValidationFailed("thermostat: setpoint out of bounds"));
        }
        if !(t.hysteresis_f > 0.0 && t.hysteresis_f < 10.0) {
            return Err(ConfigError::ValidationFailed("thermostat: hysteresis_f"));
        }

        if self.sensor_error_limit == 0 {
            return Err(ConfigError::ValidationFailed("sensor_error_limit must be > 0"));
        }
        if self.sensor_read_timeout_ms == 0 || self.sensor_read_timeout_ms > 10_000 {
            return Err(ConfigError::ValidationFailed("sensor_read_timeout_ms"));
        }
        if self.settle_ms > 5_000 {
            return Err(ConfigError::ValidationFailed("settle_ms must be <= 5000"));
        }
        if self.startup_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed("startup_timeout_secs must be > 0"));
        }
        if self.control_loop_interval_ms == 0 || self.control_loop_interval_ms > 1000 {
            return Err(ConfigError::ValidationFailed(
                "control_loop_interval_ms must be 1..=1000",
            ));
        }
        if self.input_poll_interval_ms == 0 || self.input_poll_interval_ms > 1000 {
            return Err(ConfigError::ValidationFailed("input_poll_interval_ms"));
        }
        if self.thermostat_interval_secs == 0
            || self.freeze_check_interval_secs == 0
            || self.info_interval_secs == 0
        {
            return Err(ConfigError::ValidationFailed("evaluation intervals must be > 0"));
        }
        if self.dim_hour > 23 || self.bright_hour > 23 {
            return Err(ConfigError::ValidationFailed("dim_hour/bright_hour"));
        }
        Ok(())
    }
}
