//! Temperature sensing: the shared [`SensorStore`], the one-wire bus
//! backends and the staggered sampling loop.
//!
//! ```text
//!  TemperatureBus ──▶ Sampler thread ──▶ RwLock<SensorStore> ──▶ readers
//!                         │                                   (thermostat,
//!                         └── SensorFault intent ──▶ queue     freeze guard,
//!                                                               display)
//! ```
//!
//! The sampler is the only writer of readings.  Everyone else copies the
//! whole store under a read guard so a thermostat pass never sees one
//! sensor's value from before a failure and another's from after it.

pub mod onewire;
pub mod sampler;

use std::sync::{Arc, PoisonError, RwLock};

use log::{info, warn};

use crate::error::SensorError;

/// Reading returned for a disabled or failed sensor.
pub const TEMP_ERROR: f32 = -99.0;

/// Logical sensor roles.  The bus device behind each one is chosen by
/// configured ID, never by enumeration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorId {
    /// Spa water temperature.
    Spa,
    /// Enclosure temperature next to the relay board.
    Controller,
    /// Outside air, used for freeze protection.
    Air,
}

impl SensorId {
    pub const ALL: [SensorId; 3] = [SensorId::Spa, SensorId::Controller, SensorId::Air];

    pub fn name(self) -> &'static str {
        match self {
            Self::Spa => "Spa",
            Self::Controller => "Controller",
            Self::Air => "Air",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Spa => 0,
            Self::Controller => 1,
            Self::Air => 2,
        }
    }
}

/// Per-sensor bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    /// Last good value in °F.  Only meaningful while `enabled`.
    pub last_value_f: f32,
    pub enabled: bool,
    pub consecutive_errors: u32,
    pub error_limit: u32,
    /// A device with the configured ID was found on the bus.
    pub present: bool,
}

impl SensorReading {
    const fn absent(error_limit: u32) -> Self {
        Self {
            last_value_f: TEMP_ERROR,
            enabled: false,
            consecutive_errors: 0,
            error_limit,
            present: false,
        }
    }
}

/// Latest reading and health of every sensor.
///
/// `Copy` so readers can take a consistent snapshot in one guard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorStore {
    readings: [SensorReading; 3],
}

/// Handle shared between the sampler (writer) and the controller (reader).
pub type SharedSensors = Arc<RwLock<SensorStore>>;

impl SensorStore {
    /// All sensors start absent and disabled until [`attach`](Self::attach).
    pub fn new(error_limit: u32) -> Self {
        Self {
            readings: [SensorReading::absent(error_limit); 3],
        }
    }

    pub fn shared(error_limit: u32) -> SharedSensors {
        Arc::new(RwLock::new(Self::new(error_limit)))
    }

    /// Mark a sensor as physically present and enable it.
    pub fn attach(&mut self, id: SensorId) {
        let r = &mut self.readings[id.index()];
        r.present = true;
        r.enabled = true;
        r.consecutive_errors = 0;
        info!("SENSOR | {} attached", id.name());
    }

    /// Store a good value and clear the error run.
    ///
    /// Ignored while the sensor is disabled: only [`reset_all`](Self::reset_all)
    /// brings a sensor back.
    pub fn record_success(&mut self, id: SensorId, value_f: f32) {
        let r = &mut self.readings[id.index()];
        if !r.enabled {
            return;
        }
        r.last_value_f = value_f;
        r.consecutive_errors = 0;
    }

    /// Count a failed read.  Returns `true` exactly once, on the read that
    /// pushes the run past the error limit and disables the sensor.
    pub fn record_failure(&mut self, id: SensorId) -> bool {
        let r = &mut self.readings[id.index()];
        r.consecutive_errors = r.consecutive_errors.saturating_add(1);
        if r.enabled && r.consecutive_errors > r.error_limit {
            r.enabled = false;
            r.last_value_f = TEMP_ERROR;
            warn!(
                "SENSOR | {} disabled after {} consecutive errors",
                id.name(),
                r.consecutive_errors
            );
            return true;
        }
        false
    }

    /// Clear every error counter and re-enable all present sensors.
    pub fn reset_all(&mut self) {
        for id in SensorId::ALL {
            let r = &mut self.readings[id.index()];
            r.consecutive_errors = 0;
            if r.present && !r.enabled {
                info!("SENSOR | {} re-enabled", id.name());
            }
            r.enabled = r.present;
        }
    }

    /// Value in °F, or [`TEMP_ERROR`] while disabled.
    pub fn read(&self, id: SensorId) -> f32 {
        let r = &self.readings[id.index()];
        if r.enabled { r.last_value_f } else { TEMP_ERROR }
    }

    /// Like [`read`](Self::read) but typed for callers that must react.
    pub fn temperature(&self, id: SensorId) -> Result<f32, SensorError> {
        let r = &self.readings[id.index()];
        if r.enabled {
            Ok(r.last_value_f)
        } else {
            Err(SensorError::Disabled(id))
        }
    }

    pub fn reading(&self, id: SensorId) -> SensorReading {
        self.readings[id.index()]
    }

    pub fn is_enabled(&self, id: SensorId) -> bool {
        self.readings[id.index()].enabled
    }

    /// True once every present sensor has produced at least one good value.
    pub fn has_initial_readings(&self) -> bool {
        self.readings
            .iter()
            .filter(|r| r.enabled)
            .all(|r| r.last_value_f != TEMP_ERROR)
    }
}

/// Copy the store out of its lock.  A poisoned lock still yields the data;
/// the writer never leaves it half-updated.
pub fn snapshot(sensors: &SharedSensors) -> SensorStore {
    *sensors.read().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SensorStore {
        let mut s = SensorStore::new(10);
        for id in SensorId::ALL {
            s.attach(id);
        }
        s
    }

    #[test]
    fn absent_sensor_reads_sentinel() {
        let s = SensorStore::new(10);
        assert_eq!(s.read(SensorId::Spa), TEMP_ERROR);
        assert_eq!(
            s.temperature(SensorId::Air),
            Err(SensorError::Disabled(SensorId::Air))
        );
    }

    #[test]
    fn success_clears_error_run() {
        let mut s = store();
        for _ in 0..5 {
            s.record_failure(SensorId::Spa);
        }
        s.record_success(SensorId::Spa, 95.5);
        assert_eq!(s.reading(SensorId::Spa).consecutive_errors, 0);
        assert_eq!(s.read(SensorId::Spa), 95.5);
    }

    #[test]
    fn disables_after_limit_plus_one_failures() {
        let mut s = store();
        for _ in 0..10 {
            assert!(!s.record_failure(SensorId::Air));
        }
        assert!(s.is_enabled(SensorId::Air));
        assert!(s.record_failure(SensorId::Air));
        assert!(!s.is_enabled(SensorId::Air));
        // Reported once only.
        assert!(!s.record_failure(SensorId::Air));
    }

    #[test]
    fn disabled_sensor_ignores_good_reads_until_reset() {
        let mut s = store();
        s.record_success(SensorId::Spa, 90.0);
        for _ in 0..11 {
            s.record_failure(SensorId::Spa);
        }
        s.record_success(SensorId::Spa, 92.0);
        assert!(!s.is_enabled(SensorId::Spa));
        assert_eq!(s.read(SensorId::Spa), TEMP_ERROR);

        s.reset_all();
        assert!(s.is_enabled(SensorId::Spa));
        assert_eq!(s.reading(SensorId::Spa).consecutive_errors, 0);
        s.record_success(SensorId::Spa, 92.0);
        assert_eq!(s.read(SensorId::Spa), 92.0);
    }

    #[test]
    fn reset_does_not_enable_absent_sensors() {
        let mut s = SensorStore::new(10);
        s.attach(SensorId::Spa);
        s.reset_all();
        assert!(s.is_enabled(SensorId::Spa));
        assert!(!s.is_enabled(SensorId::Controller));
    }

    #[test]
    fn initial_readings_wait_for_every_present_sensor() {
        let mut s = SensorStore::new(10);
        s.attach(SensorId::Spa);
        s.attach(SensorId::Air);
        assert!(!s.has_initial_readings());
        s.record_success(SensorId::Spa, 80.0);
        assert!(!s.has_initial_readings());
        s.record_success(SensorId::Air, 50.0);
        assert!(s.has_initial_readings());
    }
}
