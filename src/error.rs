//! Unified error types for the pool controller.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! control loop's error handling uniform. All variants are `Copy` so they
//! can be passed through the scheduler, thermostat and panel without
//! allocation.

use core::fmt;

use crate::sensors::SensorId;

// ---------------------------------------------------------------------------
// Top-level controller error
// ---------------------------------------------------------------------------

/// Every fallible operation in the controller funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An unsafe actuator transition was requested; state left unchanged.
    Precondition(PreconditionViolation),
    /// A sensor reading is unavailable or the sensor is disabled.
    Sensor(SensorError),
    /// A safety condition forced a corrective action.
    Safety(SafetyTrip),
    /// A timer event was armed with invalid parameters.
    Scheduler(SchedulerConfigError),
    /// An actuator output could not be driven.
    Actuator(ActuatorError),
    /// Peripheral initialisation failed.
    HardwareInit(&'static str),
    /// A bounded startup wait expired.
    Timeout(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
    /// A settle wait was cut short by a shutdown request.
    Interrupted,
    /// The intent queue is full; the request was dropped.
    QueueFull,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Precondition(e) => write!(f, "precondition: {e}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Safety(e) => write!(f, "safety: {e}"),
            Self::Scheduler(e) => write!(f, "scheduler: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::HardwareInit(msg) => write!(f, "hardware init: {msg}"),
            Self::Timeout(msg) => write!(f, "timeout: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Interrupted => write!(f, "interrupted by shutdown"),
            Self::QueueFull => write!(f, "intent queue full"),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Operator-facing text, at most one display row.
    pub fn display_text(self) -> &'static str {
        match self {
            Self::Precondition(p) => p.display_text(),
            Self::Sensor(_) => "Sensor fault",
            Self::Safety(SafetyTrip::OverTemp) => "Spa over max temp",
            Self::Safety(SafetyTrip::Freeze) => "Freeze protection",
            Self::Scheduler(SchedulerConfigError::NotArmed) => "No timer running",
            Self::Scheduler(_) => "Invalid time",
            Self::Actuator(_) => "Relay fault",
            Self::HardwareInit(_) => "Hardware fault",
            Self::Timeout(_) => "Timed out",
            Self::Config(_) => "Config error",
            Self::Interrupted => "Interrupted",
            Self::QueueFull => "Busy, try again",
        }
    }
}

// ---------------------------------------------------------------------------
// Precondition violations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreconditionViolation {
    /// Heater power requested while the pump is off.
    HeaterWithoutPump,
    /// Heater enable requested while the pump is off.
    EnableWithoutPump,
    /// Heater enable requested while heater power is off.
    EnableWithoutHeaterPower,
    /// The operation only applies to a mode that is not active.
    WrongMode,
}

impl PreconditionViolation {
    /// Short operator-facing text for the 20-column display.
    pub fn display_text(self) -> &'static str {
        match self {
            Self::HeaterWithoutPump => "Heat needs pump on",
            Self::EnableWithoutPump => "Enable needs pump on",
            Self::EnableWithoutHeaterPower => "Enable needs heater",
            Self::WrongMode => "Not in that mode",
        }
    }
}

impl fmt::Display for PreconditionViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HeaterWithoutPump => write!(f, "heater power requested with pump off"),
            Self::EnableWithoutPump => write!(f, "heater enable requested with pump off"),
            Self::EnableWithoutHeaterPower => {
                write!(f, "heater enable requested with heater power off")
            }
            Self::WrongMode => write!(f, "operation not valid in current mode"),
        }
    }
}

impl std::error::Error for PreconditionViolation {}

impl From<PreconditionViolation> for Error {
    fn from(e: PreconditionViolation) -> Self {
        Self::Precondition(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The sensor exceeded its error limit and is disabled until reset.
    Disabled(SensorId),
    /// A single read failed or timed out.
    ReadFailed(SensorId),
    /// The one-wire bus could not be enumerated.
    BusUnavailable,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled(id) => write!(f, "{} sensor disabled", id.name()),
            Self::ReadFailed(id) => write!(f, "{} sensor read failed", id.name()),
            Self::BusUnavailable => write!(f, "one-wire bus not responding"),
        }
    }
}

impl std::error::Error for SensorError {}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Safety trips
// ---------------------------------------------------------------------------

/// Safety conditions always force a corrective actuator action; they are
/// never merely reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyTrip {
    /// Spa water above the heater maximum; heater forced off.
    OverTemp,
    /// Air below the freeze threshold; pump forced on.
    Freeze,
}

impl fmt::Display for SafetyTrip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OverTemp => write!(f, "spa over maximum temperature"),
            Self::Freeze => write!(f, "freeze condition"),
        }
    }
}

impl std::error::Error for SafetyTrip {}

impl From<SafetyTrip> for Error {
    fn from(e: SafetyTrip) -> Self {
        Self::Safety(e)
    }
}

// ---------------------------------------------------------------------------
// Scheduler configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerConfigError {
    /// A zero duration was supplied.
    ZeroDuration,
    /// The duration exceeds the allowed maximum.
    DurationTooLong,
    /// Hour or minute out of range.
    InvalidTimeOfDay,
    /// No deadline is armed for the requested adjustment.
    NotArmed,
    /// The adjusted deadline would not lie in the future.
    DeadlineInPast,
}

impl fmt::Display for SchedulerConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroDuration => write!(f, "duration must be non-zero"),
            Self::DurationTooLong => write!(f, "duration too long"),
            Self::InvalidTimeOfDay => write!(f, "invalid time of day"),
            Self::NotArmed => write!(f, "no deadline armed"),
            Self::DeadlineInPast => write!(f, "deadline would be in the past"),
        }
    }
}

impl std::error::Error for SchedulerConfigError {}

impl From<SchedulerConfigError> for Error {
    fn from(e: SchedulerConfigError) -> Self {
        Self::Scheduler(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// GPIO level write failed.
    GpioWriteFailed,
    /// The pin was never exported or configured as an output.
    NotExported,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
            Self::NotExported => write!(f, "GPIO not exported"),
        }
    }
}

impl std::error::Error for ActuatorError {}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Controller-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
