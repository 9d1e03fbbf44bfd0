//! One-wire temperature bus backends.
//!
//! - [`SysfsW1Bus`] reads DS18x20 devices through the Linux `w1` sysfs
//!   tree (`/sys/bus/w1/devices/<family>-<id>/w1_slave`).
//! - [`SimBus`] serves scripted readings for the simulator and tests.
//!
//! Device IDs are the serial part of the sysfs name, without the family
//! prefix: `28-0416c1da95ff` is device `0416c1da95ff`.

use core::time::Duration;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use log::{debug, warn};

use crate::app::ports::{BusError, TemperatureBus};

/// Family codes of the DS18x20 thermometers.
const THERMOMETER_FAMILIES: [&str; 5] = ["10", "22", "28", "3b", "42"];

fn c_to_f(c: f32) -> f32 {
    c * 9.0 / 5.0 + 32.0
}

/// One decimal place, like the panel shows it.
fn round_tenth(v: f32) -> f32 {
    (v * 10.0).round() / 10.0
}

/// Parse a `w1_slave` dump:
///
/// ```text
/// 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
/// 72 01 4b 46 7f ff 0e 10 57 t=23125
/// ```
pub fn parse_w1_slave(text: &str) -> Result<f32, BusError> {
    let mut lines = text.lines();
    let crc_ok = lines.next().is_some_and(|l| l.trim_end().ends_with("YES"));
    if !crc_ok {
        return Err(BusError::BadReading);
    }
    let raw = lines
        .next()
        .and_then(|l| l.split("t=").nth(1))
        .ok_or(BusError::BadReading)?;
    let milli_c: i32 = raw.trim().parse().map_err(|_| BusError::BadReading)?;
    // 85 °C is the power-on reset value, not a measurement.
    if milli_c == 85_000 {
        return Err(BusError::BadReading);
    }
    Ok(round_tenth(c_to_f(milli_c as f32 / 1000.0)))
}

// ---------------------------------------------------------------------------
// Sysfs
// ---------------------------------------------------------------------------

pub struct SysfsW1Bus {
    devices_dir: PathBuf,
    timeout: Duration,
    /// Device ID -> sysfs directory, filled by `enumerate`.
    paths: HashMap<String, PathBuf>,
    /// Set while a helper thread is still blocked in a read of that device.
    in_flight: HashMap<String, Arc<AtomicBool>>,
}

impl SysfsW1Bus {
    pub fn new(devices_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            devices_dir: devices_dir.into(),
            timeout,
            paths: HashMap::new(),
            in_flight: HashMap::new(),
        }
    }

    fn busy_flag(&mut self, device_id: &str) -> Arc<AtomicBool> {
        Arc::clone(self.in_flight.entry(device_id.to_string()).or_default())
    }
}

impl TemperatureBus for SysfsW1Bus {
    fn enumerate(&mut self) -> Result<Vec<String>, BusError> {
        let entries = fs::read_dir(&self.devices_dir).map_err(|e| {
            warn!("W1 | cannot list {}: {}", self.devices_dir.display(), e);
            BusError::Unavailable
        })?;

        self.paths.clear();
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some((family, id)) = name.split_once('-') else {
                continue;
            };
            if THERMOMETER_FAMILIES.contains(&family) {
                self.paths.insert(id.to_string(), entry.path());
            }
        }
        let mut ids: Vec<String> = self.paths.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    /// The kernel read blocks for the full conversion time and can hang on
    /// a bad bus, so it runs on a helper thread bounded by the timeout.
    fn read_f(&mut self, device_id: &str) -> Result<f32, BusError> {
        let path = self
            .paths
            .get(device_id)
            .ok_or(BusError::Unavailable)?
            .join("w1_slave");

        // At most one reader per device: a hung read is not stacked on.
        let busy = self.busy_flag(device_id);
        if busy.swap(true, Ordering::AcqRel) {
            warn!("W1 | {} previous read still blocked, skipping", device_id);
            return Err(BusError::Timeout);
        }

        let (tx, rx) = mpsc::channel();
        let done = Arc::clone(&busy);
        let spawned = thread::Builder::new().name("w1-read".into()).spawn(move || {
            let result = fs::read_to_string(path);
            done.store(false, Ordering::Release);
            let _ = tx.send(result);
        });
        if spawned.is_err() {
            busy.store(false, Ordering::Release);
            return Err(BusError::Unavailable);
        }

        match rx.recv_timeout(self.timeout) {
            Ok(Ok(text)) => parse_w1_slave(&text),
            Ok(Err(e)) => {
                debug!("W1 | {} read error: {}", device_id, e);
                Err(BusError::BadReading)
            }
            Err(_) => {
                warn!(
                    "W1 | {} read timed out after {}ms, reader left blocked",
                    device_id,
                    self.timeout.as_millis()
                );
                Err(BusError::Timeout)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SimDevice {
    steady: f32,
    script: VecDeque<Result<f32, BusError>>,
}

#[derive(Default)]
struct SimState {
    devices: HashMap<String, SimDevice>,
    available: bool,
    reads: usize,
}

/// Shared-handle scripted bus: clones drive the same devices.
#[derive(Clone)]
pub struct SimBus {
    inner: Arc<Mutex<SimState>>,
}

impl SimBus {
    pub fn new(devices: &[(&str, f32)]) -> Self {
        let devices = devices
            .iter()
            .map(|(id, t)| {
                (
                    (*id).to_string(),
                    SimDevice {
                        steady: *t,
                        script: VecDeque::new(),
                    },
                )
            })
            .collect();
        Self {
            inner: Arc::new(Mutex::new(SimState {
                devices,
                available: true,
                reads: 0,
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Change the value a device reports once its script runs out.
    pub fn set(&self, id: &str, value_f: f32) {
        if let Some(d) = self.lock().devices.get_mut(id) {
            d.steady = value_f;
        }
    }

    /// Queue one-off results ahead of the steady value.
    pub fn script(&self, id: &str, results: impl IntoIterator<Item = Result<f32, BusError>>) {
        if let Some(d) = self.lock().devices.get_mut(id) {
            d.script.extend(results);
        }
    }

    /// Make the next `n` reads of `id` fail.
    pub fn fail(&self, id: &str, n: usize) {
        self.script(id, std::iter::repeat_n(Err(BusError::Timeout), n));
    }

    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
    }

    /// Total reads served.
    pub fn reads(&self) -> usize {
        self.lock().reads
    }
}

impl TemperatureBus for SimBus {
    fn enumerate(&mut self) -> Result<Vec<String>, BusError> {
        let s = self.lock();
        if !s.available {
            return Err(BusError::Unavailable);
        }
        let mut ids: Vec<String> = s.devices.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn read_f(&mut self, device_id: &str) -> Result<f32, BusError> {
        let mut s = self.lock();
        s.reads += 1;
        let available = s.available;
        let d = s.devices.get_mut(device_id).ok_or(BusError::Unavailable)?;
        if let Some(next) = d.script.pop_front() {
            return next;
        }
        if available { Ok(d.steady) } else { Err(BusError::Unavailable) }
    }
}
