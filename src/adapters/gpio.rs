//! GPIO adapters.
//!
//! - [`SysfsGpio`] hands out pins from the legacy `/sys/class/gpio`
//!   interface: [`SysfsPin`] as an `embedded-hal` [`OutputPin`] for the
//!   relay bank and [`SysfsButtons`] for the panel switches.
//! - [`SimPin`] and [`SimButtons`] are in-memory stand-ins.
//!
//! The panel switches are wired to ground with pull-ups, so a pressed
//! button reads `0`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use embedded_hal::digital::{self, ErrorKind, ErrorType, OutputPin};
use log::{info, warn};

use crate::app::ports::ButtonPort;
use crate::error::ActuatorError;

pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpioError;

impl digital::Error for GpioError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Entry point to a sysfs GPIO tree.
#[derive(Debug, Clone)]
pub struct SysfsGpio {
    root: PathBuf,
}

impl Default for SysfsGpio {
    fn default() -> Self {
        Self::new(SYSFS_GPIO_ROOT)
    }
}

impl SysfsGpio {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn pin_dir(&self, gpio: u8) -> PathBuf {
        self.root.join(format!("gpio{gpio}"))
    }

    fn export(&self, gpio: u8, direction: &str) -> io::Result<PathBuf> {
        let dir = self.pin_dir(gpio);
        if !dir.exists() {
            fs::write(self.root.join("export"), gpio.to_string())?;
        }
        fs::write(dir.join("direction"), direction)?;
        Ok(dir)
    }

    /// Export `gpio` as an output, driven low.
    pub fn output(&self, gpio: u8) -> Result<SysfsPin, ActuatorError> {
        let dir = self.export(gpio, "low").map_err(|e| {
            warn!("GPIO | export {} failed: {}", gpio, e);
            ActuatorError::NotExported
        })?;
        Ok(SysfsPin {
            gpio,
            value: dir.join("value"),
        })
    }

    /// Export the four panel inputs in panel order.
    pub fn buttons(&self, gpios: [u8; 4]) -> Result<SysfsButtons, ActuatorError> {
        let mut values: [PathBuf; 4] = Default::default();
        for (slot, gpio) in values.iter_mut().zip(gpios) {
            let dir = self.export(gpio, "in").map_err(|e| {
                warn!("GPIO | export input {} failed: {}", gpio, e);
                ActuatorError::NotExported
            })?;
            *slot = dir.join("value");
        }
        info!("GPIO | buttons on {:?}", gpios);
        Ok(SysfsButtons { values })
    }
}

// ── Output pin ────────────────────────────────────────────────

pub struct SysfsPin {
    gpio: u8,
    value: PathBuf,
}

impl SysfsPin {
    pub fn gpio(&self) -> u8 {
        self.gpio
    }

    fn write(&mut self, level: &str) -> Result<(), GpioError> {
        fs::write(&self.value, level).map_err(|e| {
            warn!("GPIO | write {} = {} failed: {}", self.gpio, level, e);
            GpioError
        })
    }
}

impl ErrorType for SysfsPin {
    type Error = GpioError;
}

impl OutputPin for SysfsPin {
    fn set_low(&mut self) -> Result<(), GpioError> {
        self.write("0")
    }

    fn set_high(&mut self) -> Result<(), GpioError> {
        self.write("1")
    }
}

// ── Input buttons ─────────────────────────────────────────────

pub struct SysfsButtons {
    values: [PathBuf; 4],
}

fn is_low(path: &Path) -> bool {
    // An unreadable input counts as released.
    fs::read_to_string(path).is_ok_and(|s| s.trim() == "0")
}

impl ButtonPort for SysfsButtons {
    fn levels(&mut self) -> [bool; 4] {
        core::array::from_fn(|i| is_low(&self.values[i]))
    }
}

// ── Simulation ────────────────────────────────────────────────

/// Output pin whose level is readable through a shared handle.
#[derive(Debug, Clone, Default)]
pub struct SimPin {
    high: Arc<Mutex<bool>>,
}

impl SimPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_high(&self) -> bool {
        *self.high.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ErrorType for SimPin {
    type Error = core::convert::Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        *self.high.lock().unwrap_or_else(PoisonError::into_inner) = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        *self.high.lock().unwrap_or_else(PoisonError::into_inner) = true;
        Ok(())
    }
}

/// Panel switches pressed from code.  Clones share state.
#[derive(Debug, Clone, Default)]
pub struct SimButtons {
    pressed: Arc<Mutex<[bool; 4]>>,
}

impl SimButtons {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold button `index` (0-based) down or let it go.
    pub fn set(&self, index: usize, down: bool) {
        if let Some(b) = self
            .pressed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(index)
        {
            *b = down;
        }
    }
}

impl ButtonPort for SimButtons {
    fn levels(&mut self) -> [bool; 4] {
        *self.pressed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
