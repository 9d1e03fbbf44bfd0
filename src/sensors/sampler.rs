//! Staggered sensor sampling.
//!
//! One bus read per second at most, spread over a 60-tick cycle so the
//! spa (the sensor the thermostat acts on) is read three times as often
//! as the others:
//!
//! ```text
//!  tick   10    20    30    40          50    60
//!         Spa   Air   Spa   Controller  Spa   (wrap)
//! ```
//!
//! Reads happen without holding the store lock; only the result is
//! written under a short write guard.

use core::time::Duration;
use std::sync::{Arc, PoisonError};
use std::thread::{self, JoinHandle};

use log::{debug, error, info, warn};

use crate::app::commands::Intent;
use crate::app::ports::TemperatureBus;
use crate::config::SensorIds;
use crate::error::{Error, Result, SensorError};
use crate::events::IntentQueue;
use crate::runtime::{ShutdownSignal, StartupGate};

use super::{SensorId, SharedSensors};

/// Ticks in one sampling cycle.
pub const CYCLE_TICKS: u32 = 60;

/// Order of the first pass at startup.
const INITIAL_ORDER: [SensorId; 3] = [SensorId::Spa, SensorId::Air, SensorId::Controller];

/// Which sensor, if any, is read on `tick` of the cycle.
pub const fn due_at(tick: u32) -> Option<SensorId> {
    match tick {
        10 | 30 | 50 => Some(SensorId::Spa),
        20 => Some(SensorId::Air),
        40 => Some(SensorId::Controller),
        _ => None,
    }
}

/// Bus device ID configured for `id`.
fn device_id(ids: &SensorIds, id: SensorId) -> &str {
    match id {
        SensorId::Spa => &ids.spa,
        SensorId::Controller => &ids.controller,
        SensorId::Air => &ids.air,
    }
}

pub struct Sampler<B: TemperatureBus> {
    bus: B,
    sensors: SharedSensors,
    queue: Arc<IntentQueue>,
    ids: SensorIds,
    tick: u32,
}

impl<B: TemperatureBus> Sampler<B> {
    pub fn new(bus: B, ids: SensorIds, sensors: SharedSensors, queue: Arc<IntentQueue>) -> Self {
        Self {
            bus,
            sensors,
            queue,
            ids,
            tick: 0,
        }
    }

    /// Enumerate the bus and attach every configured sensor that is
    /// present.  Devices with an unconfigured ID are reported and ignored.
    /// Returns the number of sensors attached.
    pub fn init(&mut self) -> Result<usize> {
        let found = self.bus.enumerate().map_err(|e| {
            error!("SAMPLER | bus enumeration failed: {}", e);
            Error::Sensor(SensorError::BusUnavailable)
        })?;
        info!("SAMPLER | {} device(s) on bus", found.len());

        let mut attached = 0;
        let mut store = self.sensors.write().unwrap_or_else(PoisonError::into_inner);
        for device in &found {
            let role = SensorId::ALL
                .into_iter()
                .find(|&id| device_id(&self.ids, id) == device.as_str());
            match role {
                Some(id) => {
                    store.attach(id);
                    attached += 1;
                }
                None => warn!("SAMPLER | unknown device {} ignored", device),
            }
        }
        for id in SensorId::ALL {
            if !store.reading(id).present {
                warn!("SAMPLER | {} sensor {} not found", id.name(), device_id(&self.ids, id));
            }
        }
        Ok(attached)
    }

    /// Read one sensor and record the outcome.  Disabled sensors are not
    /// read.  Returns `true` if a read was attempted.
    pub fn sample(&mut self, id: SensorId) -> bool {
        let enabled = self
            .sensors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_enabled(id);
        if !enabled {
            return false;
        }

        let result = self.bus.read_f(device_id(&self.ids, id));
        let tripped = {
            let mut store = self.sensors.write().unwrap_or_else(PoisonError::into_inner);
            match result {
                Ok(value) => {
                    debug!("SAMPLER | {} {:.1}F", id.name(), value);
                    store.record_success(id, value);
                    false
                }
                Err(e) => {
                    warn!("SAMPLER | {} read failed: {}", id.name(), e);
                    store.record_failure(id)
                }
            }
        };
        if tripped {
            // The queue logs a drop; the control loop also sees the
            // disabled sensor on its next snapshot.
            let _ = self.queue.submit(Intent::SensorFault(id));
        }
        true
    }

    /// Read every sensor that still lacks a first value, in startup order.
    /// Returns `true` once all enabled sensors have one.
    pub fn initial_pass(&mut self, shutdown: &ShutdownSignal) -> bool {
        for id in INITIAL_ORDER {
            let needs_value = {
                let store = self.sensors.read().unwrap_or_else(PoisonError::into_inner);
                store.is_enabled(id) && store.read(id) == super::TEMP_ERROR
            };
            if needs_value {
                self.sample(id);
                if shutdown.wait_timeout(Duration::from_secs(1)) {
                    return false;
                }
            }
        }
        self.sensors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .has_initial_readings()
    }

    /// Advance one tick and read whichever sensor is due.
    pub fn step(&mut self) -> Option<SensorId> {
        self.tick += 1;
        let due = due_at(self.tick);
        if self.tick >= CYCLE_TICKS {
            self.tick = 0;
        }
        let id = due?;
        self.sample(id).then_some(id)
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

/// Run the sampler on its own thread: attach, take first readings, open
/// the gate, then cycle once per second until shutdown.
///
/// If the bus cannot be enumerated the gate never opens and startup times
/// out.
pub fn spawn_sampler<B: TemperatureBus + 'static>(
    mut sampler: Sampler<B>,
    gate: StartupGate,
    shutdown: ShutdownSignal,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new().name("sensor-sampler".into()).spawn(move || {
        match sampler.init() {
            Ok(n) => info!("SAMPLER | {} sensor(s) attached", n),
            Err(e) => {
                error!("SAMPLER | init failed: {}", e);
                return;
            }
        }

        // A flaky sensor either produces a value or exceeds its error
        // limit and drops out of the check; either way the pass ends.
        while !sampler.initial_pass(&shutdown) {
            if shutdown.is_triggered() {
                return;
            }
        }
        gate.open();
        info!("SAMPLER | initial readings complete");

        while !shutdown.wait_timeout(Duration::from_secs(1)) {
            sampler.step();
        }
        info!("SAMPLER | stopped");
    })
}
