//! Inbound commands to the control service.
//!
//! Every request for a state change, whether it comes from the front
//! panel, the remote command surface or the sensor sampler, arrives at
//! the [`ControlService`](super::service::ControlService) as an
//! [`Intent`] through the same queue.

use core::fmt;
use core::str::FromStr;

use crate::drivers::button::PanelButton;
use crate::equipment::ValveMode;
use crate::sensors::SensorId;

/// Direction of a one-step adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Up,
    Down,
}

impl Step {
    pub fn sign(self) -> i64 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
        }
    }
}

/// Verbs accepted from the remote command surface.  The panel menu
/// produces the same verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCommand {
    /// Timed manual pump run; `None` uses the configured default.
    PumpOn { hours: Option<u8> },
    PumpOff,
    /// Spa session; `None` uses the configured default.
    SpaOn { hours: Option<u8> },
    SpaOff,
    ValveMode(ValveMode),
    /// Spa setpoint ±1 °F.
    TempAdjust(Step),
    /// Current deadline ±1 h.
    TimeAdjust(Step),
    Spare(bool),
    Shutdown,
    Reboot,
    Exit,
}

/// Anything that asks the controller to act.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Remote(RemoteCommand),
    Button(PanelButton),
    /// The sampler disabled a sensor.
    SensorFault(SensorId),
}

// ───────────────────────────────────────────────────────────────
// Text form
// ───────────────────────────────────────────────────────────────

/// Why a command line was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseCommandError {
    Empty,
    UnknownVerb,
    MissingArgument,
    BadArgument,
}

impl fmt::Display for ParseCommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty command"),
            Self::UnknownVerb => write!(f, "unknown command"),
            Self::MissingArgument => write!(f, "missing argument"),
            Self::BadArgument => write!(f, "bad argument"),
        }
    }
}

impl std::error::Error for ParseCommandError {}

/// Line grammar, case-insensitive, whitespace separated:
///
/// ```text
/// pump on [hours] | pump off
/// spa on [hours]  | spa off
/// valve pool|spa|fill|drain|<code>
/// temp up|down|+|-
/// time up|down|+|-
/// spare on|off
/// shutdown | reboot | exit
/// ```
impl FromStr for RemoteCommand {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let lower = line.trim().to_ascii_lowercase();
        let mut words = lower.split_whitespace();
        let verb = words.next().ok_or(ParseCommandError::Empty)?;
        let arg = words.next();
        let extra = words.next();

        let cmd = match verb {
            "pump" if on_off(arg)? => RemoteCommand::PumpOn {
                hours: hours(extra)?,
            },
            "pump" => RemoteCommand::PumpOff,
            "spa" if on_off(arg)? => RemoteCommand::SpaOn {
                hours: hours(extra)?,
            },
            "spa" => RemoteCommand::SpaOff,
            "valve" => RemoteCommand::ValveMode(valve(arg.ok_or(ParseCommandError::MissingArgument)?)),
            "temp" => RemoteCommand::TempAdjust(step(arg)?),
            "time" => RemoteCommand::TimeAdjust(step(arg)?),
            "spare" => RemoteCommand::Spare(on_off(arg)?),
            "shutdown" | "poweroff" => RemoteCommand::Shutdown,
            "reboot" => RemoteCommand::Reboot,
            "exit" | "quit" => RemoteCommand::Exit,
            _ => return Err(ParseCommandError::UnknownVerb),
        };

        let takes_extra = matches!(
            cmd,
            RemoteCommand::PumpOn { .. } | RemoteCommand::SpaOn { .. }
        );
        let trailing = if takes_extra { words.next() } else { extra };
        let no_arg_verb = matches!(
            cmd,
            RemoteCommand::Shutdown | RemoteCommand::Reboot | RemoteCommand::Exit
        );
        if trailing.is_some() || (no_arg_verb && arg.is_some()) {
            return Err(ParseCommandError::BadArgument);
        }
        Ok(cmd)
    }
}

fn on_off(arg: Option<&str>) -> Result<bool, ParseCommandError> {
    match arg.ok_or(ParseCommandError::MissingArgument)? {
        "on" | "1" => Ok(true),
        "off" | "0" => Ok(false),
        _ => Err(ParseCommandError::BadArgument),
    }
}

fn hours(arg: Option<&str>) -> Result<Option<u8>, ParseCommandError> {
    arg.map(|h| h.parse::<u8>().map_err(|_| ParseCommandError::BadArgument))
        .transpose()
}

fn step(arg: Option<&str>) -> Result<Step, ParseCommandError> {
    match arg.ok_or(ParseCommandError::MissingArgument)? {
        "up" | "+" | "inc" => Ok(Step::Up),
        "down" | "-" | "dec" => Ok(Step::Down),
        _ => Err(ParseCommandError::BadArgument),
    }
}

/// Unrecognised positions map to `Unknown`, which the equipment records
/// without moving the valves.
fn valve(arg: &str) -> ValveMode {
    match arg {
        "pool" => ValveMode::Pool,
        "spa" => ValveMode::Spa,
        "fill" => ValveMode::Fill,
        "drain" => ValveMode::Drain,
        code => code.parse::<u8>().map_or(ValveMode::Unknown, ValveMode::from_code),
    }
}
