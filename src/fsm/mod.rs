//! System mode machine.
//!
//! The controller has exactly one live [`SystemMode`].  Modes never change
//! by assignment: equipment operations report what physically happened as a
//! [`ModeEvent`] and the per-mode handler in the state table decides the
//! next mode.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  ModeTable                                                   │
//! │  ┌──────────┬──────┬───────────┬────────────┬─────────────┐  │
//! │  │ Mode     │ name │ backlight │ protective │ on_event    │  │
//! │  ├──────────┼──────┼───────────┼────────────┼─────────────┤  │
//! │  │ Off      │ OFF  │ white     │            │ fn(ev)->Opt │  │
//! │  │ PumpOn   │ PUMP │ green     │            │ fn(ev)->Opt │  │
//! │  │ SpaOn    │ SPA  │ blue      │     x      │ fn(ev)->Opt │  │
//! │  │ Cooldown │ COOL │ cyan      │     x      │ fn(ev)->Opt │  │
//! │  │ Freeze   │ FREZ │ red       │     x      │ fn(ev)->Opt │  │
//! │  │ Manual   │ MAN  │ yellow    │            │ fn(ev)->Opt │  │
//! │  │ Standby  │ STBY │ white     │            │ fn(ev)->Opt │  │
//! │  └──────────┴──────┴───────────┴────────────┴─────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Protective modes hold back recurring pump-off windows until they end.

pub mod states;

use log::info;

// ---------------------------------------------------------------------------
// Mode identity
// ---------------------------------------------------------------------------

/// Operating mode of the whole controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SystemMode {
    Off = 0,
    PumpOn = 1,
    SpaOn = 2,
    Cooldown = 3,
    Freeze = 4,
    Manual = 5,
    /// Retained for status compatibility; no transition enters it.
    Standby = 6,
}

impl SystemMode {
    /// Total number of modes, used to size the table.
    pub const COUNT: usize = 7;

    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Off,
            1 => Self::PumpOn,
            2 => Self::SpaOn,
            3 => Self::Cooldown,
            4 => Self::Freeze,
            5 => Self::Manual,
            6 => Self::Standby,
            _ => {
                debug_assert!(false, "invalid mode index: {idx}");
                Self::Off
            }
        }
    }

    /// Four-character name shown on the panel and published as `sm`.
    pub fn name(self) -> &'static str {
        states::MODE_TABLE[self as usize].name
    }

    /// Backlight colour for this mode.
    pub fn backlight(self) -> (u8, u8, u8) {
        states::MODE_TABLE[self as usize].backlight
    }

    /// Whether recurring pump-off windows are deferred in this mode.
    pub fn is_protective(self) -> bool {
        states::MODE_TABLE[self as usize].protective
    }
}

impl core::fmt::Display for SystemMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

// ---------------------------------------------------------------------------
// Mode events
// ---------------------------------------------------------------------------

/// Something that happened to the equipment and may move the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeEvent {
    /// Pump relay went from off to on.
    PumpStarted,
    /// Pump relay went from on to off.
    PumpStopped,
    /// Heater power relay went from off to on.
    HeaterPowered,
    /// Heater power relay went from on to off.
    HeaterUnpowered,
    /// A spa session completed its start sequence.
    SpaStarted,
    /// A spa session ended with the pump left running.
    SpaEnded,
    /// A timed manual pump run began.
    ManualRun,
    /// Air temperature dropped below the freeze threshold.
    FreezeDetected,
    /// Air temperature recovered while in freeze protection.
    FreezeCleared,
    /// A composite operation stopped everything.
    Halted,
    /// All outputs were forced off.
    Shutdown,
}

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// Per-mode event handler.  `None` keeps the current mode.
pub type ModeEventFn = fn(ModeEvent) -> Option<SystemMode>;

/// One row of the static mode table.
pub struct ModeDescriptor {
    pub mode: SystemMode,
    pub name: &'static str,
    pub backlight: (u8, u8, u8),
    pub protective: bool,
    pub on_event: ModeEventFn,
}

// ---------------------------------------------------------------------------
// Machine
// ---------------------------------------------------------------------------

/// Holds the live mode and applies events through the table.
#[derive(Debug, Clone)]
pub struct ModeMachine {
    current: SystemMode,
    transitions: u64,
}

impl Default for ModeMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ModeMachine {
    pub fn new() -> Self {
        Self {
            current: SystemMode::Off,
            transitions: 0,
        }
    }

    pub fn current(&self) -> SystemMode {
        self.current
    }

    /// Number of mode changes since startup.
    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    /// Feed an event.  Returns `(from, to)` when the mode changed.
    pub fn apply(&mut self, event: ModeEvent) -> Option<(SystemMode, SystemMode)> {
        let from = self.current;
        let to = (states::MODE_TABLE[from as usize].on_event)(event)?;
        if to == from {
            return None;
        }
        info!("MODE | {} -> {} ({:?})", from.name().trim(), to.name().trim(), event);
        self.current = to;
        self.transitions += 1;
        Some((from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine_in(mode: SystemMode) -> ModeMachine {
        let mut m = ModeMachine::new();
        m.current = mode;
        m
    }

    #[test]
    fn starts_off() {
        assert_eq!(ModeMachine::new().current(), SystemMode::Off);
    }

    #[test]
    fn table_rows_match_their_index() {
        for (i, row) in states::MODE_TABLE.iter().enumerate() {
            assert_eq!(row.mode as usize, i);
            assert_eq!(SystemMode::from_index(i), row.mode);
        }
    }

    #[test]
    fn pump_start_from_off_enters_pump_on() {
        let mut m = ModeMachine::new();
        assert_eq!(
            m.apply(ModeEvent::PumpStarted),
            Some((SystemMode::Off, SystemMode::PumpOn))
        );
    }

    #[test]
    fn pump_events_leave_higher_priority_modes_alone() {
        for mode in [SystemMode::SpaOn, SystemMode::Manual, SystemMode::Freeze] {
            let mut m = machine_in(mode);
            assert_eq!(m.apply(ModeEvent::PumpStarted), None);
            assert_eq!(m.apply(ModeEvent::PumpStopped), None);
            assert_eq!(m.current(), mode);
        }
    }

    #[test]
    fn pump_stop_ends_cooldown() {
        let mut m = machine_in(SystemMode::Cooldown);
        m.apply(ModeEvent::PumpStopped);
        assert_eq!(m.current(), SystemMode::Off);
    }

    #[test]
    fn heater_events_drive_spa_and_cooldown() {
        let mut m = machine_in(SystemMode::PumpOn);
        m.apply(ModeEvent::HeaterPowered);
        assert_eq!(m.current(), SystemMode::SpaOn);
        m.apply(ModeEvent::HeaterUnpowered);
        assert_eq!(m.current(), SystemMode::Cooldown);
    }

    #[test]
    fn freeze_is_sticky_until_cleared() {
        let mut m = machine_in(SystemMode::PumpOn);
        m.apply(ModeEvent::FreezeDetected);
        assert_eq!(m.current(), SystemMode::Freeze);
        assert_eq!(m.apply(ModeEvent::ManualRun), None);
        assert_eq!(m.apply(ModeEvent::FreezeDetected), None);
        m.apply(ModeEvent::FreezeCleared);
        assert_eq!(m.current(), SystemMode::Manual);
    }

    #[test]
    fn freeze_cleared_outside_freeze_is_ignored() {
        let mut m = machine_in(SystemMode::PumpOn);
        assert_eq!(m.apply(ModeEvent::FreezeCleared), None);
    }

    #[test]
    fn shutdown_always_returns_to_off() {
        for i in 0..SystemMode::COUNT {
            let mode = SystemMode::from_index(i);
            let mut m = machine_in(mode);
            m.apply(ModeEvent::Shutdown);
            assert_eq!(m.current(), SystemMode::Off, "from {mode:?}");
        }
    }

    #[test]
    fn nothing_enters_standby() {
        let events = [
            ModeEvent::PumpStarted,
            ModeEvent::PumpStopped,
            ModeEvent::HeaterPowered,
            ModeEvent::HeaterUnpowered,
            ModeEvent::SpaStarted,
            ModeEvent::SpaEnded,
            ModeEvent::ManualRun,
            ModeEvent::FreezeDetected,
            ModeEvent::FreezeCleared,
            ModeEvent::Halted,
            ModeEvent::Shutdown,
        ];
        for i in 0..SystemMode::COUNT {
            for ev in events {
                let mut m = machine_in(SystemMode::from_index(i));
                m.apply(ev);
                if i != SystemMode::Standby as usize {
                    assert_ne!(m.current(), SystemMode::Standby);
                }
            }
        }
    }

    #[test]
    fn names_are_four_wide() {
        for i in 0..SystemMode::COUNT {
            assert_eq!(SystemMode::from_index(i).name().len(), 4);
        }
    }
}
