//! Relay bank drivers.
//!
//! [`PinBank`] maps each [`RelayOutput`] to an `embedded-hal` output pin.
//! [`SimRelays`] keeps levels in memory for the simulator and tests, with
//! a short write history.

use embedded_hal::digital::OutputPin;
use heapless::HistoryBuffer;
use log::debug;

use crate::app::ports::{RelayOutput, RelayPort};
use crate::error::ActuatorError;

const HISTORY_LEN: usize = 32;

// ---------------------------------------------------------------------------
// PinBank
// ---------------------------------------------------------------------------

/// Eight output pins in [`RelayOutput::ALL`] order.
pub struct PinBank<P: OutputPin> {
    pins: [P; 8],
    levels: [bool; 8],
}

impl<P: OutputPin> PinBank<P> {
    pub fn new(pins: [P; 8]) -> Self {
        Self {
            pins,
            levels: [false; 8],
        }
    }
}

impl<P: OutputPin + Send> RelayPort for PinBank<P> {
    fn set(&mut self, output: RelayOutput, on: bool) -> Result<(), ActuatorError> {
        let pin = &mut self.pins[output.index()];
        let written = if on { pin.set_high() } else { pin.set_low() };
        written.map_err(|_| ActuatorError::GpioWriteFailed)?;
        self.levels[output.index()] = on;
        debug!("RELAY | {:?} -> {}", output, u8::from(on));
        Ok(())
    }

    fn level(&self, output: RelayOutput) -> bool {
        self.levels[output.index()]
    }
}

// ---------------------------------------------------------------------------
// SimRelays
// ---------------------------------------------------------------------------

pub struct SimRelays {
    levels: [bool; 8],
    history: HistoryBuffer<(RelayOutput, bool), HISTORY_LEN>,
}

impl Default for SimRelays {
    fn default() -> Self {
        Self::new()
    }
}

impl SimRelays {
    pub fn new() -> Self {
        Self {
            levels: [false; 8],
            history: HistoryBuffer::new(),
        }
    }

    /// Most recent writes, oldest first.
    pub fn history(&self) -> Vec<(RelayOutput, bool)> {
        self.history.oldest_ordered().copied().collect()
    }

    pub fn clear_history(&mut self) {
        self.history = HistoryBuffer::new();
    }
}

impl RelayPort for SimRelays {
    fn set(&mut self, output: RelayOutput, on: bool) -> Result<(), ActuatorError> {
        self.levels[output.index()] = on;
        self.history.write((output, on));
        debug!("RELAY | sim {:?} -> {}", output, u8::from(on));
        Ok(())
    }

    fn level(&self, output: RelayOutput) -> bool {
        self.levels[output.index()]
    }
}
