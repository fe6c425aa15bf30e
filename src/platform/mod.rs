//! OS-backed probe implementations.
//!
//! [`PlatformProbes`] is the production [`HostProbes`]: on macOS it reads
//! mach host counters directly and parses the output of standard diagnostic
//! tools; elsewhere every probe reports `Unsupported` and the sampler
//! publishes neutral samples. [`open_smc`] wires up the controller
//! transport the same way.

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "macos")]
use tracing::warn;

use crate::probe::{
    BatteryState, CoreTicks, DiskCounters, GpuUtilization, HostProbes, MemoryCounters,
    NetworkCounters, ProbeError, SwapCounters, SystemCounters,
};
use crate::smc::SmcClient;

/// Stateless [`HostProbes`] over the running operating system.
#[derive(Debug, Default)]
pub struct PlatformProbes;

impl PlatformProbes {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(target_os = "macos")]
impl HostProbes for PlatformProbes {
    fn cpu_ticks(&mut self) -> Result<Vec<CoreTicks>, ProbeError> {
        macos::cpu_ticks()
    }

    fn memory(&mut self) -> Result<MemoryCounters, ProbeError> {
        macos::memory()
    }

    fn swap(&mut self) -> Result<SwapCounters, ProbeError> {
        macos::swap()
    }

    fn network(&mut self) -> Result<NetworkCounters, ProbeError> {
        macos::network()
    }

    fn disk(&mut self) -> Result<DiskCounters, ProbeError> {
        macos::disk()
    }

    fn gpu(&mut self) -> Result<GpuUtilization, ProbeError> {
        macos::gpu()
    }

    fn battery(&mut self) -> Result<BatteryState, ProbeError> {
        macos::battery()
    }

    fn system_info(&mut self) -> Result<SystemCounters, ProbeError> {
        macos::system_info()
    }
}

#[cfg(not(target_os = "macos"))]
impl HostProbes for PlatformProbes {
    fn cpu_ticks(&mut self) -> Result<Vec<CoreTicks>, ProbeError> {
        Err(ProbeError::Unsupported { subsystem: "cpu" })
    }

    fn memory(&mut self) -> Result<MemoryCounters, ProbeError> {
        Err(ProbeError::Unsupported {
            subsystem: "memory",
        })
    }

    fn swap(&mut self) -> Result<SwapCounters, ProbeError> {
        Err(ProbeError::Unsupported { subsystem: "swap" })
    }

    fn network(&mut self) -> Result<NetworkCounters, ProbeError> {
        Err(ProbeError::Unsupported {
            subsystem: "network",
        })
    }

    fn disk(&mut self) -> Result<DiskCounters, ProbeError> {
        Err(ProbeError::Unsupported { subsystem: "disk" })
    }

    fn gpu(&mut self) -> Result<GpuUtilization, ProbeError> {
        Err(ProbeError::Unsupported { subsystem: "gpu" })
    }

    fn battery(&mut self) -> Result<BatteryState, ProbeError> {
        Err(ProbeError::Unsupported {
            subsystem: "battery",
        })
    }

    fn system_info(&mut self) -> Result<SystemCounters, ProbeError> {
        Err(ProbeError::Unsupported {
            subsystem: "system",
        })
    }
}

/// Open the controller channel for fan telemetry.
///
/// Failure is not fatal: the returned client stays permanently closed and
/// every fan read degrades to a cheap no-op.
#[cfg(target_os = "macos")]
pub fn open_smc() -> SmcClient {
    match macos::SmcDevice::open() {
        Ok(device) => SmcClient::new(Box::new(device)),
        Err(err) => {
            warn!(error = %err, "Controller channel failed to open; fan telemetry disabled");
            SmcClient::closed()
        }
    }
}

#[cfg(not(target_os = "macos"))]
pub fn open_smc() -> SmcClient {
    SmcClient::closed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn probes_report_unsupported_off_platform() {
        let mut probes = PlatformProbes::new();
        assert!(matches!(
            probes.cpu_ticks(),
            Err(ProbeError::Unsupported { subsystem: "cpu" })
        ));
        assert!(matches!(
            probes.battery(),
            Err(ProbeError::Unsupported {
                subsystem: "battery"
            })
        ));
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn smc_channel_stays_closed_off_platform() {
        let client = open_smc();
        assert!(!client.is_open());
    }

    #[cfg(target_os = "macos")]
    #[test]
    fn cpu_probe_reports_at_least_one_core() {
        let mut probes = PlatformProbes::new();
        let ticks = probes.cpu_ticks().expect("cpu ticks should be readable");
        assert!(!ticks.is_empty());
        assert!(ticks.iter().all(|core| core.total() > 0));
    }

    #[cfg(target_os = "macos")]
    #[test]
    fn memory_probe_reports_nonzero_totals() {
        let mut probes = PlatformProbes::new();
        let counters = probes.memory().expect("memory should be readable");
        assert!(counters.page_size > 0);
        assert!(counters.total_bytes > 0);
    }
}
