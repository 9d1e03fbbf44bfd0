//! Closed-loop control: the spa thermostat.

pub mod thermostat;
