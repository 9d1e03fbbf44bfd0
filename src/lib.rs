//! Pool and spa controller library.
//!
//! Exposes the domain core (equipment, scheduler, thermostat, freeze
//! guard, panel) and the host adapters so the binary, the integration
//! tests and the fuzz targets share one implementation.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod display;
pub mod equipment;
pub mod error;
pub mod events;
pub mod fsm;
pub mod pins;
pub mod runtime;
pub mod safety;
pub mod scheduler;

pub mod adapters;
pub mod control;
pub mod drivers;
pub mod sensors;
