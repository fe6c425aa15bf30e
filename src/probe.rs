//! Probe seam between the sampler core and the operating system.
//!
//! The sampler never talks to the kernel directly: it consumes raw counters
//! through [`HostProbes`], which the `platform` module implements for real
//! hosts and [`FakeProbes`] implements for tests. Every method returns either
//! current raw values or a [`ProbeError`] the sampler absorbs into a neutral
//! sample for that subsystem.

use std::cell::{RefCell, RefMut};
use std::rc::Rc;

use thiserror::Error;

/// Why a probe produced no data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    /// The probe ran but produced no usable data this cycle.
    #[error("{subsystem} probe unavailable: {reason}")]
    Unavailable {
        subsystem: &'static str,
        reason: String,
    },
    /// No implementation exists for this platform.
    #[error("{subsystem} probe not supported on this platform")]
    Unsupported { subsystem: &'static str },
}

impl ProbeError {
    pub fn unavailable(subsystem: &'static str, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            subsystem,
            reason: reason.into(),
        }
    }

    /// Which subsystem the failure belongs to.
    pub fn subsystem(&self) -> &'static str {
        match self {
            Self::Unavailable { subsystem, .. } | Self::Unsupported { subsystem } => subsystem,
        }
    }
}

/// Cumulative scheduler ticks for one logical core, split by CPU state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoreTicks {
    pub user: u64,
    pub system: u64,
    pub idle: u64,
    pub nice: u64,
}

impl CoreTicks {
    /// Sum across all state buckets.
    pub fn total(&self) -> u64 {
        self.user
            .saturating_add(self.system)
            .saturating_add(self.idle)
            .saturating_add(self.nice)
    }
}

/// Instantaneous virtual-memory page counts plus the physical total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryCounters {
    pub page_size: u64,
    pub total_bytes: u64,
    pub free_pages: u64,
    pub active_pages: u64,
    pub inactive_pages: u64,
    pub wired_pages: u64,
    pub compressor_pages: u64,
}

/// Instantaneous swap usage in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwapCounters {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
}

/// Cumulative non-loopback interface totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkCounters {
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub packets_in: u64,
    pub packets_out: u64,
}

/// Cumulative block-storage driver totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskCounters {
    pub read_bytes: u64,
    pub written_bytes: u64,
    pub read_ops: u64,
    pub write_ops: u64,
}

/// Instantaneous accelerator utilization percentages.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GpuUtilization {
    pub device_pct: f64,
    pub renderer_pct: f64,
    pub tiler_pct: f64,
}

/// Instantaneous battery state as reported by the power source.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BatteryState {
    pub is_present: bool,
    pub is_charging: bool,
    pub on_ac_power: bool,
    pub charge_percent: f64,
    /// Minutes until empty/full; -1 when the power source reports no estimate.
    pub time_remaining_minutes: i32,
}

/// Load averages and process/cpu counts.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SystemCounters {
    pub load_avg_1: f64,
    pub load_avg_5: f64,
    pub load_avg_15: f64,
    pub process_count: u32,
    pub cpu_count: u32,
}

/// Raw counter and state probes for one host.
///
/// Implementations are black boxes to the sampler; methods take `&mut self`
/// so they may keep handles or scripted state. The sampler is single-threaded
/// by design, so no `Send`/`Sync` bound is imposed.
pub trait HostProbes {
    /// Cumulative per-core tick counters. Array length is the logical core
    /// count and may change between calls.
    fn cpu_ticks(&mut self) -> Result<Vec<CoreTicks>, ProbeError>;

    fn memory(&mut self) -> Result<MemoryCounters, ProbeError>;

    fn swap(&mut self) -> Result<SwapCounters, ProbeError>;

    /// Cumulative byte/packet totals summed over non-loopback interfaces.
    fn network(&mut self) -> Result<NetworkCounters, ProbeError>;

    /// Cumulative read/write totals summed over block-storage drivers.
    fn disk(&mut self) -> Result<DiskCounters, ProbeError>;

    fn gpu(&mut self) -> Result<GpuUtilization, ProbeError>;

    fn battery(&mut self) -> Result<BatteryState, ProbeError>;

    fn system_info(&mut self) -> Result<SystemCounters, ProbeError>;
}

/// Scripted probe state backing [`FakeProbes`].
///
/// `None` for a subsystem means "unavailable"; tests flip values between
/// updates to simulate counter progress or degradation. Call counts let
/// throttle behavior be asserted without any clock dependence.
#[derive(Debug, Default)]
pub struct FakeProbeState {
    pub cpu: Option<Vec<CoreTicks>>,
    pub memory: Option<MemoryCounters>,
    pub swap: Option<SwapCounters>,
    pub network: Option<NetworkCounters>,
    pub disk: Option<DiskCounters>,
    pub gpu: Option<GpuUtilization>,
    pub battery: Option<BatteryState>,
    pub system: Option<SystemCounters>,
    pub calls: ProbeCallCounts,
}

/// Per-subsystem invocation counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProbeCallCounts {
    pub cpu: u32,
    pub memory: u32,
    pub swap: u32,
    pub network: u32,
    pub disk: u32,
    pub gpu: u32,
    pub battery: u32,
    pub system: u32,
}

/// Scripted [`HostProbes`] implementation for tests.
///
/// Cloning shares the underlying state, so a test can hand one handle to the
/// sampler and keep another to adjust counters and read call counts. The
/// sampler is single-threaded, so plain `Rc<RefCell>` sharing suffices.
#[derive(Debug, Clone, Default)]
pub struct FakeProbes {
    state: Rc<RefCell<FakeProbeState>>,
}

impl FakeProbes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutable access to the scripted state.
    pub fn state(&self) -> RefMut<'_, FakeProbeState> {
        self.state.borrow_mut()
    }

    /// Snapshot of the per-subsystem call counts.
    pub fn calls(&self) -> ProbeCallCounts {
        self.state.borrow().calls
    }
}

impl HostProbes for FakeProbes {
    fn cpu_ticks(&mut self) -> Result<Vec<CoreTicks>, ProbeError> {
        let mut state = self.state.borrow_mut();
        state.calls.cpu += 1;
        state
            .cpu
            .clone()
            .ok_or_else(|| ProbeError::unavailable("cpu", "scripted"))
    }

    fn memory(&mut self) -> Result<MemoryCounters, ProbeError> {
        let mut state = self.state.borrow_mut();
        state.calls.memory += 1;
        state
            .memory
            .ok_or_else(|| ProbeError::unavailable("memory", "scripted"))
    }

    fn swap(&mut self) -> Result<SwapCounters, ProbeError> {
        let mut state = self.state.borrow_mut();
        state.calls.swap += 1;
        state
            .swap
            .ok_or_else(|| ProbeError::unavailable("swap", "scripted"))
    }

    fn network(&mut self) -> Result<NetworkCounters, ProbeError> {
        let mut state = self.state.borrow_mut();
        state.calls.network += 1;
        state
            .network
            .ok_or_else(|| ProbeError::unavailable("network", "scripted"))
    }

    fn disk(&mut self) -> Result<DiskCounters, ProbeError> {
        let mut state = self.state.borrow_mut();
        state.calls.disk += 1;
        state
            .disk
            .ok_or_else(|| ProbeError::unavailable("disk", "scripted"))
    }

    fn gpu(&mut self) -> Result<GpuUtilization, ProbeError> {
        let mut state = self.state.borrow_mut();
        state.calls.gpu += 1;
        state
            .gpu
            .ok_or_else(|| ProbeError::unavailable("gpu", "scripted"))
    }

    fn battery(&mut self) -> Result<BatteryState, ProbeError> {
        let mut state = self.state.borrow_mut();
        state.calls.battery += 1;
        state
            .battery
            .ok_or_else(|| ProbeError::unavailable("battery", "scripted"))
    }

    fn system_info(&mut self) -> Result<SystemCounters, ProbeError> {
        let mut state = self.state.borrow_mut();
        state.calls.system += 1;
        state
            .system
            .ok_or_else(|| ProbeError::unavailable("system", "scripted"))
    }
}
