//! Polled, debounced driver for the four front-panel buttons.
//!
//! ## Hardware
//!
//! ```text
//!    ---    ---    ---    ---
//!   | 1 |  | 2 |  | 3 |  | 4 |
//!    ---    ---    ---    ---
//!    RED    YEL    GRN    BLU
//! ```
//!
//! Active-low momentary switches with pull-ups.  The input thread samples
//! raw levels through a [`ButtonPort`] and calls [`PanelButtons::tick`] at
//! the poll rate; each debounced press is reported once, on the press edge.
//!
//! | Button | Main screen | Menus        |
//! |--------|-------------|--------------|
//! | 1      | Menu        | Back         |
//! | 2      | Temp        | More / +     |
//! | 3      | Pump        | Less / -     |
//! | 4      | Spa         | Start / OK   |

use crate::app::ports::ButtonPort;

const DEBOUNCE_MS: u32 = 50;

/// A front-panel button, numbered left to right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelButton {
    One,
    Two,
    Three,
    Four,
}

impl PanelButton {
    pub const ALL: [PanelButton; 4] = [Self::One, Self::Two, Self::Three, Self::Four];
}

/// Per-button debounce state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DebounceState {
    Released,
    DebounceWait { since_ms: u32 },
    Held,
}

pub struct PanelButtons<B: ButtonPort> {
    port: B,
    states: [DebounceState; 4],
}

impl<B: ButtonPort> PanelButtons<B> {
    pub fn new(port: B) -> Self {
        Self {
            port,
            states: [DebounceState::Released; 4],
        }
    }

    /// Sample the switches.  `now_ms` is monotonic milliseconds.
    /// When several buttons complete a press on the same tick the
    /// leftmost wins; the others stay held and are not replayed.
    pub fn tick(&mut self, now_ms: u32) -> Option<PanelButton> {
        let levels = self.port.levels();
        let mut pressed = None;

        for (i, (state, down)) in self.states.iter_mut().zip(levels).enumerate() {
            *state = match (*state, down) {
                (_, false) => DebounceState::Released,
                (DebounceState::Released, true) => DebounceState::DebounceWait { since_ms: now_ms },
                (DebounceState::DebounceWait { since_ms }, true) => {
                    if now_ms.wrapping_sub(since_ms) >= DEBOUNCE_MS {
                        pressed = pressed.or(Some(PanelButton::ALL[i]));
                        DebounceState::Held
                    } else {
                        DebounceState::DebounceWait { since_ms }
                    }
                }
                (DebounceState::Held, true) => DebounceState::Held,
            };
        }
        pressed
    }
}
