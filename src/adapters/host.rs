//! Host power control through `systemctl`.
//!
//! Refuses unless `allow_host_power` is set, so a simulator run or a
//! bench test can never power the machine off.

use std::process::Command;

use log::{info, warn};

use crate::app::ports::{HostPowerError, HostPowerPort};

pub struct SystemctlPower {
    allowed: bool,
}

impl SystemctlPower {
    pub fn new(allowed: bool) -> Self {
        Self { allowed }
    }

    fn run(&self, verb: &str) -> Result<(), HostPowerError> {
        if !self.allowed {
            info!("HOST | {} requested, host power control disabled", verb);
            return Err(HostPowerError::NotAllowed);
        }
        info!("HOST | systemctl {}", verb);
        let status = Command::new("systemctl").arg(verb).status().map_err(|e| {
            warn!("HOST | systemctl {} failed to start: {}", verb, e);
            HostPowerError::CommandFailed
        })?;
        if status.success() {
            Ok(())
        } else {
            warn!("HOST | systemctl {} exited with {}", verb, status);
            Err(HostPowerError::CommandFailed)
        }
    }
}

impl HostPowerPort for SystemctlPower {
    fn power_off(&mut self) -> Result<(), HostPowerError> {
        self.run("poweroff")
    }

    fn reboot(&mut self) -> Result<(), HostPowerError> {
        self.run("reboot")
    }
}
