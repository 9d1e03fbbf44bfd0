//! Front-panel menu state machine.
//!
//! ```text
//!                 ┌── 4 (spa off) ─▶ SpaOff
//!         ┌───────┤
//!         │       └── 4 ──▶ SpaTime ── 4 ──▶ SpaOn{h}
//!  Main ──┼── 3 (pump on) ─▶ PumpOff
//!         ├── 3 ──▶ PumpTime ── 4 ──▶ PumpOn{h}
//!         ├── 2 ──▶ Setpoint ── 2/3 ──▶ TempAdjust
//!         └── 1 ──▶ Util ── 4 ──▶ CleanSpa
//!                        └─ 3 ──▶ Setpoint
//! ```
//!
//! Button 1 always backs out to the main screen.  Presses never touch the
//! equipment directly; they become the same commands the remote surface
//! sends.

use crate::app::commands::{RemoteCommand, Step};
use crate::display::{Screen, centered, fit};
use crate::app::ports::DISPLAY_COLS;
use crate::drivers::button::PanelButton;
use crate::fsm::SystemMode;

/// Longest manual pump run selectable from the panel (hours).
const PUMP_MENU_MAX: u8 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelScreen {
    Main,
    SpaTime(u8),
    PumpTime(u8),
    Setpoint,
    Util,
}

/// What a press asks the controller to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelAction {
    Command(RemoteCommand),
    /// One-hour pump run with the valves set to drain the spa.
    CleanSpa,
}

pub struct Panel {
    screen: PanelScreen,
    spa_default: u8,
    spa_menu_max: u8,
}

impl Panel {
    /// `spa_max_hours` is exclusive, as for remote spa sessions.
    pub fn new(spa_default: u8, spa_max_hours: u8) -> Self {
        Self {
            screen: PanelScreen::Main,
            spa_default,
            spa_menu_max: spa_max_hours.saturating_sub(1).max(1),
        }
    }

    pub fn screen(&self) -> PanelScreen {
        self.screen
    }

    pub fn press(&mut self, button: PanelButton, mode: SystemMode, pump_on: bool) -> Option<PanelAction> {
        use PanelButton::{Four, One, Three, Two};

        let (next, action) = match (self.screen, button) {
            (PanelScreen::Main, Four) if mode == SystemMode::SpaOn => {
                (PanelScreen::Main, Some(RemoteCommand::SpaOff))
            }
            (PanelScreen::Main, Four) => (PanelScreen::SpaTime(self.spa_default), None),
            (PanelScreen::Main, Three) if pump_on => (PanelScreen::Main, Some(RemoteCommand::PumpOff)),
            (PanelScreen::Main, Three) => (PanelScreen::PumpTime(1), None),
            (PanelScreen::Main, Two) => (PanelScreen::Setpoint, None),
            (PanelScreen::Main, One) => (PanelScreen::Util, None),

            (_, One) => (PanelScreen::Main, None),

            (PanelScreen::SpaTime(h), Two) => (PanelScreen::SpaTime((h + 1).min(self.spa_menu_max)), None),
            (PanelScreen::SpaTime(h), Three) => (PanelScreen::SpaTime(h.saturating_sub(1).max(1)), None),
            (PanelScreen::SpaTime(h), Four) => {
                (PanelScreen::Main, Some(RemoteCommand::SpaOn { hours: Some(h) }))
            }

            (PanelScreen::PumpTime(h), Two) => (PanelScreen::PumpTime((h + 1).min(PUMP_MENU_MAX)), None),
            (PanelScreen::PumpTime(h), Three) => (PanelScreen::PumpTime(h.saturating_sub(1).max(1)), None),
            (PanelScreen::PumpTime(h), Four) => {
                (PanelScreen::Main, Some(RemoteCommand::PumpOn { hours: Some(h) }))
            }

            (PanelScreen::Setpoint, Two) => {
                (PanelScreen::Setpoint, Some(RemoteCommand::TempAdjust(Step::Up)))
            }
            (PanelScreen::Setpoint, Three) => {
                (PanelScreen::Setpoint, Some(RemoteCommand::TempAdjust(Step::Down)))
            }
            (PanelScreen::Setpoint, Four) => (PanelScreen::Main, None),

            (PanelScreen::Util, Four) => {
                self.screen = PanelScreen::Main;
                return Some(PanelAction::CleanSpa);
            }
            (PanelScreen::Util, Three) => (PanelScreen::Setpoint, None),
            (PanelScreen::Util, Two) => (PanelScreen::Util, None),
        };
        self.screen = next;
        action.map(PanelAction::Command)
    }

    /// Menu screen, or `None` on the main screen.
    pub fn render(&self, setpoint_f: f32) -> Option<Screen> {
        let blank = fit("", DISPLAY_COLS);
        let legend = fit("Back More Less Start", DISPLAY_COLS);
        let screen = match self.screen {
            PanelScreen::Main => return None,
            PanelScreen::SpaTime(h) => [
                centered("*** SPA TIME ***"),
                fit(&format!("Time = {} hours", h), DISPLAY_COLS),
                blank,
                legend,
            ],
            PanelScreen::PumpTime(h) => [
                centered("*** Pump Timer ***"),
                fit(&format!("Time = {} hours", h), DISPLAY_COLS),
                blank,
                legend,
            ],
            PanelScreen::Setpoint => [
                centered("*** Spa Temp ***"),
                centered(&format!("Set Point = {:.0}", setpoint_f)),
                blank,
                fit("Back  +    -    OK", DISPLAY_COLS),
            ],
            PanelScreen::Util => [
                fit("4: Clean Spa", DISPLAY_COLS),
                fit("3: Set Spa Temp", DISPLAY_COLS),
                blank,
                fit("Exit        3    4", DISPLAY_COLS),
            ],
        };
        Some(screen)
    }
}
