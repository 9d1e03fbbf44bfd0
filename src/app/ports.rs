//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ControlService (domain)
//! ```
//!
//! Driven adapters (relays, clock, display, status store, one-wire bus,
//! buttons, config file) implement these traits.  The
//! [`ControlService`](super::service::ControlService) consumes them via
//! generics, so the domain core never touches hardware directly.
//!
//! ## Failure policy
//!
//! - **RelayPort** failures abort the operation that issued them.
//! - **DisplayPort** and **StatusSink** are fire-and-forget: callers log
//!   errors and carry on.
//! - **ConfigPort** implementations MUST validate before returning or
//!   persisting a config.

use core::time::Duration;

use chrono::NaiveDateTime;

use crate::config::SystemConfig;
use crate::error::ActuatorError;

// ───────────────────────────────────────────────────────────────
// Relay port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// The eight digital outputs on the relay board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelayOutput {
    Pump,
    HeaterPower,
    HeaterEnable,
    Valve1Dir,
    Valve2Dir,
    Spare,
    ActivityLed,
    LedReturn,
}

impl RelayOutput {
    pub const ALL: [RelayOutput; 8] = [
        RelayOutput::Pump,
        RelayOutput::HeaterPower,
        RelayOutput::HeaterEnable,
        RelayOutput::Valve1Dir,
        RelayOutput::Valve2Dir,
        RelayOutput::Spare,
        RelayOutput::ActivityLed,
        RelayOutput::LedReturn,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Write-side port: set one output level per call, no framing.
pub trait RelayPort: Send {
    fn set(&mut self, output: RelayOutput, on: bool) -> Result<(), ActuatorError>;

    /// Level last written to `output`.
    fn level(&self, output: RelayOutput) -> bool;

    /// Drive every output low.  Best effort: keeps going past failures.
    fn all_off(&mut self) {
        for output in RelayOutput::ALL {
            if let Err(e) = self.set(output, false) {
                log::error!("RELAY | {:?} off failed: {}", output, e);
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Wall-clock, monotonic time and bounded waits.
pub trait ClockPort {
    /// Local wall-clock time (second resolution is enough).
    fn local_now(&self) -> NaiveDateTime;

    /// Monotonic seconds since start.
    fn uptime_secs(&self) -> u64;

    /// Block for `delay` or until shutdown is requested.
    /// Returns `false` if the wait was interrupted.
    fn settle(&self, delay: Duration) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Display port (20×4 character LCD)
// ───────────────────────────────────────────────────────────────

pub const DISPLAY_COLS: usize = 20;
pub const DISPLAY_ROWS: usize = 4;

/// Line/column addressed text surface.  Rows and columns are zero-based.
pub trait DisplayPort {
    fn clear(&mut self) -> Result<(), DisplayError>;
    fn set_cursor(&mut self, row: u8, col: u8) -> Result<(), DisplayError>;
    fn write_text(&mut self, text: &str) -> Result<(), DisplayError>;
    fn set_backlight(&mut self, r: u8, g: u8, b: u8) -> Result<(), DisplayError>;
    fn set_brightness(&mut self, level: u8) -> Result<(), DisplayError>;
    /// Drive the four general-purpose outputs on the display module.
    fn set_outputs(&mut self, outputs: [bool; 4]) -> Result<(), DisplayError>;
}

// ───────────────────────────────────────────────────────────────
// Status publication port
// ───────────────────────────────────────────────────────────────

/// Write-only key/value store read by the remote status page.
pub trait StatusSink {
    fn set(&mut self, key: &str, value: &str) -> Result<(), StatusError>;
}

// ───────────────────────────────────────────────────────────────
// Temperature bus port
// ───────────────────────────────────────────────────────────────

/// One-wire temperature bus.
pub trait TemperatureBus: Send {
    /// IDs of every device currently on the bus.
    fn enumerate(&mut self) -> Result<Vec<String>, BusError>;

    /// Read one device in °F.  Must return within the adapter's timeout.
    fn read_f(&mut self, device_id: &str) -> Result<f32, BusError>;
}

// ───────────────────────────────────────────────────────────────
// Button port
// ───────────────────────────────────────────────────────────────

/// Raw front-panel switch levels, panel order 1..=4.  `true` = pressed.
pub trait ButtonPort: Send {
    fn levels(&mut self) -> [bool; 4];
}

// ───────────────────────────────────────────────────────────────
// Host power port
// ───────────────────────────────────────────────────────────────

/// Power the host down or restart it after the outputs are off.
pub trait HostPowerPort {
    fn power_off(&mut self) -> Result<(), HostPowerError>;
    fn reboot(&mut self) -> Result<(), HostPowerError>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// never clamped.  A zero lockout or an inverted min/max heater bound
/// would defeat the thermostat's protection.
pub trait ConfigPort {
    /// Returns [`SystemConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// No config file at the given path.
    NotFound,
    /// The file is not valid JSON for [`SystemConfig`].
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`DisplayPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayError {
    /// Row or column outside the 20×4 grid.
    OutOfRange,
    /// The serial link to the display failed.
    Io,
}

/// Errors from [`StatusSink`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusError {
    Unavailable,
}

/// Errors from [`TemperatureBus`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// The bus master is missing or could not be listed.
    Unavailable,
    /// The device did not answer within the read timeout.
    Timeout,
    /// The device answered with a bad checksum or unparsable data.
    BadReading,
}

/// Errors from [`HostPowerPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPowerError {
    /// Host power control is disabled in config.
    NotAllowed,
    /// The system command failed.
    CommandFailed,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl core::fmt::Display for DisplayError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::OutOfRange => write!(f, "cursor out of range"),
            Self::Io => write!(f, "display I/O error"),
        }
    }
}

impl core::fmt::Display for StatusError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "status store unavailable")
    }
}

impl core::fmt::Display for BusError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unavailable => write!(f, "bus unavailable"),
            Self::Timeout => write!(f, "read timed out"),
            Self::BadReading => write!(f, "bad reading"),
        }
    }
}

impl core::fmt::Display for HostPowerError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotAllowed => write!(f, "host power control disabled"),
            Self::CommandFailed => write!(f, "host power command failed"),
        }
    }
}
