//! Application core: domain logic behind port traits.
//!
//! This module holds the business rules of the controller: intent
//! handling, the front-panel menu, the per-second tick and status
//! publication.  All interaction with hardware happens through **port
//! traits** defined in [`ports`], keeping this layer testable without
//! real peripherals.

pub mod commands;
pub mod events;
pub mod panel;
pub mod ports;
pub mod service;
