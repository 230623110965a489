//! Runtime settings

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Fixed-interval polling budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitSpec {
    pub interval_secs: u64,
    pub timeout_secs: u64,
}

impl WaitSpec {
    pub const fn new(interval_secs: u64, timeout_secs: u64) -> Self {
        Self {
            interval_secs,
            timeout_secs,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(ConfigError::InvalidWaiter {
                name: name.to_string(),
                reason: "interval must be at least one second".to_string(),
            });
        }
        if self.timeout_secs < self.interval_secs {
            return Err(ConfigError::InvalidWaiter {
                name: name.to_string(),
                reason: "timeout is shorter than the interval".to_string(),
            });
        }
        Ok(())
    }
}

/// Polling budgets of the long-running operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaiterSettings {
    /// VM reaching Running with a public IP
    pub vm_public_ip: WaitSpec,
    /// Guest accepting connections on the SSH port
    pub vm_ssh: WaitSpec,
    /// VM reaching Terminated after a terminate call
    pub vm_terminate: WaitSpec,
    /// Disk attach/detach confirmation
    pub disk: WaitSpec,
}

impl Default for WaiterSettings {
    fn default() -> Self {
        Self {
            vm_public_ip: WaitSpec::new(5, 240),
            vm_ssh: WaitSpec::new(2, 120),
            vm_terminate: WaitSpec::new(3, 60),
            disk: WaitSpec::new(1, 10),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Directory of the identity store file; in-memory when unset
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    pub store: StoreSettings,
    /// `tracing` filter directive, e.g. `info` or `cloudweave_runtime=debug`
    pub log_level: Option<String>,
    pub waiters: WaiterSettings,
    /// Attempts per dependency wave of a destroy
    pub destroy_retries: u32,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            store: StoreSettings::default(),
            log_level: None,
            waiters: WaiterSettings::default(),
            destroy_retries: 3,
        }
    }
}

impl RuntimeSettings {
    pub fn validate(&self) -> Result<()> {
        self.waiters.vm_public_ip.validate("vm_public_ip")?;
        self.waiters.vm_ssh.validate("vm_ssh")?;
        self.waiters.vm_terminate.validate("vm_terminate")?;
        self.waiters.disk.validate("disk")?;
        Ok(())
    }
}
