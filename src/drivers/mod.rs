//! Low-level drivers for the relay board and the front panel.

pub mod button;
pub mod relays;
