//! Screen layouts for the 20×4 character display.
//!
//! ```text
//!  ┌────────────────────┐
//!  │3:07:12   Mode:SPA  │
//!  │Pump:ON   1:52:48   │
//!  │Heat:ON   Temp:92.4 │
//!  │Menu  Temp Pump  Spa│
//!  └────────────────────┘
//! ```
//!
//! Every line is padded to the full width so a redraw never leaves stray
//! characters behind.  [`ScreenWriter`] only rewrites rows that changed.

use chrono::{NaiveTime, TimeDelta, Timelike};

use crate::app::events::ControllerSnapshot;
use crate::app::ports::{DISPLAY_COLS, DISPLAY_ROWS, DisplayError, DisplayPort};
use crate::fsm::SystemMode;
use crate::sensors::TEMP_ERROR;

pub type Line = heapless::String<DISPLAY_COLS>;
pub type Screen = [Line; DISPLAY_ROWS];

const HALF: usize = DISPLAY_COLS / 2;

/// Left-justify `text` in `width` columns, truncating if needed.
pub fn fit(text: &str, width: usize) -> Line {
    let mut line = Line::new();
    for c in text.chars().take(width.min(DISPLAY_COLS)) {
        if line.push(c).is_err() {
            break;
        }
    }
    while line.len() < width.min(DISPLAY_COLS) {
        if line.push(' ').is_err() {
            break;
        }
    }
    line
}

/// Two half-width fields side by side.
pub fn split_row(left: &str, right: &str) -> Line {
    let mut line = fit(left, HALF);
    // fit() never exceeds HALF, so the second half always has room.
    let _ = line.push_str(&fit(right, HALF));
    line
}

pub fn centered(text: &str) -> Line {
    let len = text.chars().count().min(DISPLAY_COLS);
    let lead = (DISPLAY_COLS - len) / 2;
    let mut padded = " ".repeat(lead);
    padded.push_str(text);
    fit(&padded, DISPLAY_COLS)
}

/// `H:MM:SS`, or `--:--:--` with nothing pending.
pub fn format_remaining(remaining: Option<TimeDelta>) -> Line {
    let Some(left) = remaining else {
        return fit("--:--:--", 8);
    };
    let secs = left.num_seconds().max(0);
    let text = format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60);
    fit(&text, text.len())
}

/// 12-hour clock without a leading zero.
pub fn format_clock(now: NaiveTime) -> Line {
    let (_, hour) = now.hour12();
    let text = format!("{}:{:02}:{:02}", hour, now.minute(), now.second());
    fit(&text, text.len())
}

fn on_off(on: bool) -> &'static str {
    if on { "ON" } else { "OFF" }
}

fn temp_text(t: f32) -> String {
    if t == TEMP_ERROR {
        "Temp:--.-".into()
    } else {
        format!("Temp:{:.1}", t)
    }
}

/// The idle screen.  Shows spa water temperature unless the system is
/// off, in which case it shows air.
pub fn main_screen(snap: &ControllerSnapshot) -> Screen {
    let shown = if snap.mode == SystemMode::Off {
        snap.air_f()
    } else {
        snap.spa_f()
    };
    [
        split_row(
            &format_clock(snap.at.time()),
            &format!("Mode:{}", snap.mode.name()),
        ),
        split_row(
            &format!("Pump:{}", on_off(snap.equipment.pump_power)),
            &format_remaining(snap.time_remaining),
        ),
        split_row(
            &format!("Heat:{}", on_off(snap.equipment.heater_power)),
            &temp_text(shown),
        ),
        fit("Menu  Temp Pump  Spa", DISPLAY_COLS),
    ]
}

/// A centred one-line message on an otherwise blank screen.
pub fn message_screen(text: &str) -> Screen {
    let blank = fit("", DISPLAY_COLS);
    [centered(text), blank.clone(), blank.clone(), blank]
}

// ───────────────────────────────────────────────────────────────
// Writer
// ───────────────────────────────────────────────────────────────

/// Pushes screens to a [`DisplayPort`], row by row.
#[derive(Default)]
pub struct ScreenWriter {
    shown: Option<Screen>,
    backlight: Option<(u8, u8, u8)>,
    brightness: Option<u8>,
}

impl ScreenWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw(&mut self, display: &mut impl DisplayPort, screen: &Screen) -> Result<(), DisplayError> {
        for (row, line) in screen.iter().enumerate() {
            let unchanged = self.shown.as_ref().is_some_and(|s| s[row] == *line);
            if unchanged {
                continue;
            }
            display.set_cursor(row as u8, 0)?;
            display.write_text(line)?;
        }
        self.shown = Some(screen.clone());
        Ok(())
    }

    pub fn backlight(&mut self, display: &mut impl DisplayPort, rgb: (u8, u8, u8)) -> Result<(), DisplayError> {
        if self.backlight == Some(rgb) {
            return Ok(());
        }
        display.set_backlight(rgb.0, rgb.1, rgb.2)?;
        self.backlight = Some(rgb);
        Ok(())
    }

    pub fn brightness(&mut self, display: &mut impl DisplayPort, level: u8) -> Result<(), DisplayError> {
        if self.brightness == Some(level) {
            return Ok(());
        }
        display.set_brightness(level)?;
        self.brightness = Some(level);
        Ok(())
    }

    /// Forget what is on the glass so the next draw repaints everything.
    pub fn invalidate(&mut self, display: &mut impl DisplayPort) -> Result<(), DisplayError> {
        self.shown = None;
        display.clear()
    }
}
