//! The sampling orchestrator.
//!
//! [`MetricSampler`] owns all per-subsystem state: one throttle and one set
//! of previous counters each, plus the controller client for fan telemetry.
//! `update` is the single entry point; it refreshes whatever is due and
//! publishes a fresh [`TelemetrySnapshot`]. Probe failures never escape:
//! each one degrades its own subsystem to a neutral sample and everything
//! else proceeds.

use std::time::{Duration, Instant};

use chrono::Utc;
use thiserror::Error;
use tracing::debug;

use crate::collect;
use crate::probe::{DiskCounters, HostProbes, NetworkCounters, ProbeError};
use crate::rate;
use crate::smc::SmcClient;
use crate::smc::fan::{FanReader, MAX_FANS};
use crate::snapshot::{
    BatterySample, CpuCoreSample, DiskSample, GpuSample, NetworkSample, SystemInfoSample,
    TelemetrySnapshot,
};
use crate::throttle::Throttle;

/// Probe cadence policy.
///
/// Intervals bound how often each expensive probe re-runs regardless of how
/// often `update` is called. CPU, memory, swap and system info are re-read
/// on every update; they are cheap kernel calls.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub network_interval: Duration,
    pub disk_interval: Duration,
    pub gpu_interval: Duration,
    pub battery_interval: Duration,
    pub fan_interval: Duration,
    pub max_fans: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            network_interval: Duration::from_millis(333),
            disk_interval: Duration::from_millis(1500),
            gpu_interval: Duration::from_millis(500),
            battery_interval: Duration::from_millis(2000),
            fan_interval: Duration::from_millis(1000),
            max_fans: MAX_FANS,
        }
    }
}

impl SamplerConfig {
    #[must_use]
    pub fn with_network_interval(mut self, interval: Duration) -> Self {
        self.network_interval = interval;
        self
    }

    #[must_use]
    pub fn with_disk_interval(mut self, interval: Duration) -> Self {
        self.disk_interval = interval;
        self
    }

    #[must_use]
    pub fn with_gpu_interval(mut self, interval: Duration) -> Self {
        self.gpu_interval = interval;
        self
    }

    #[must_use]
    pub fn with_battery_interval(mut self, interval: Duration) -> Self {
        self.battery_interval = interval;
        self
    }

    #[must_use]
    pub fn with_fan_interval(mut self, interval: Duration) -> Self {
        self.fan_interval = interval;
        self
    }

    #[must_use]
    pub fn with_max_fans(mut self, max: usize) -> Self {
        self.max_fans = max;
        self
    }
}

/// Failures surfaced by [`MetricSampler::initialize`].
#[derive(Debug, Error)]
pub enum SamplerError {
    /// The mandatory CPU probe failed; without a core baseline no
    /// meaningful snapshot can ever be produced.
    #[error("sampler initialization failed: {0}")]
    Init(#[from] ProbeError),
}

/// Orchestrates probes, throttles and rate normalization into snapshots.
pub struct MetricSampler {
    probes: Box<dyn HostProbes>,
    smc: SmcClient,
    fan_reader: FanReader,

    network_gate: Throttle,
    disk_gate: Throttle,
    gpu_gate: Throttle,
    battery_gate: Throttle,
    fan_gate: Throttle,

    prev_ticks: Vec<crate::probe::CoreTicks>,
    prev_network: Option<NetworkCounters>,
    prev_disk: Option<(Instant, DiskCounters)>,

    snapshot: TelemetrySnapshot,
}

impl MetricSampler {
    pub fn new(probes: Box<dyn HostProbes>, smc: SmcClient, config: SamplerConfig) -> Self {
        Self {
            probes,
            smc,
            fan_reader: FanReader::new().with_max_fans(config.max_fans),
            network_gate: Throttle::new(config.network_interval),
            disk_gate: Throttle::new(config.disk_interval),
            gpu_gate: Throttle::new(config.gpu_interval),
            battery_gate: Throttle::new(config.battery_interval),
            fan_gate: Throttle::new(config.fan_interval),
            prev_ticks: Vec::new(),
            prev_network: None,
            prev_disk: None,
            snapshot: TelemetrySnapshot::new(),
        }
    }

    /// Establish the CPU tick baseline.
    ///
    /// This is the one operation allowed to fail hard. Everything else
    /// degrades per-subsystem inside [`update`](Self::update).
    pub fn initialize(&mut self) -> Result<(), SamplerError> {
        let ticks = self.probes.cpu_ticks()?;
        debug!(cores = ticks.len(), "CPU baseline established");
        self.snapshot.cpu_cores = vec![CpuCoreSample::default(); ticks.len()];
        self.prev_ticks = ticks;
        Ok(())
    }

    /// Refresh due subsystems and publish a new snapshot.
    pub fn update(&mut self) -> &TelemetrySnapshot {
        self.update_at(Instant::now())
    }

    /// Clock-explicit [`update`](Self::update) for callers that own their
    /// time source.
    pub fn update_at(&mut self, now: Instant) -> &TelemetrySnapshot {
        self.sample_cpu();
        self.sample_memory();
        self.sample_swap();
        self.sample_system_info();

        if self.network_gate.is_due(now) {
            self.network_gate.mark(now);
            self.sample_network();
        }
        if self.disk_gate.is_due(now) {
            self.disk_gate.mark(now);
            self.sample_disk(now);
        }
        if self.gpu_gate.is_due(now) {
            self.gpu_gate.mark(now);
            self.sample_gpu();
        }
        if self.battery_gate.is_due(now) {
            self.battery_gate.mark(now);
            self.sample_battery();
        }
        if self.fan_gate.is_due(now) {
            self.fan_gate.mark(now);
            self.sample_fans();
        }

        self.snapshot.sampled_at = Utc::now();
        &self.snapshot
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> &TelemetrySnapshot {
        &self.snapshot
    }

    fn sample_cpu(&mut self) {
        let current = match self.probes.cpu_ticks() {
            Ok(ticks) => ticks,
            Err(err) => {
                debug!(error = %err, "CPU probe failed; keeping previous percentages");
                return;
            }
        };
        if !self.prev_ticks.is_empty() && current.len() != self.prev_ticks.len() {
            debug!(
                previous = self.prev_ticks.len(),
                current = current.len(),
                "Core count changed; resetting stale baselines"
            );
        }
        self.snapshot.cpu_cores =
            collect::cpu::derive_cores(&self.prev_ticks, &current, &self.snapshot.cpu_cores);
        self.prev_ticks = current;
    }

    fn sample_memory(&mut self) {
        match self.probes.memory() {
            Ok(raw) => self.snapshot.memory = collect::memory::derive_memory(&raw),
            Err(err) => debug!(error = %err, "Memory probe failed; keeping previous sample"),
        }
    }

    fn sample_swap(&mut self) {
        match self.probes.swap() {
            Ok(raw) => self.snapshot.swap = collect::memory::derive_swap(&raw),
            Err(err) => debug!(error = %err, "Swap probe failed; keeping previous sample"),
        }
    }

    fn sample_system_info(&mut self) {
        match self.probes.system_info() {
            Ok(raw) => {
                self.snapshot.system = SystemInfoSample {
                    load_avg_1: raw.load_avg_1,
                    load_avg_5: raw.load_avg_5,
                    load_avg_15: raw.load_avg_15,
                    process_count: raw.process_count,
                    cpu_count: raw.cpu_count,
                }
            }
            Err(err) => debug!(error = %err, "System info probe failed; keeping previous sample"),
        }
    }

    fn sample_network(&mut self) {
        let current = match self.probes.network() {
            Ok(counters) => counters,
            Err(err) => {
                debug!(error = %err, "Network probe failed; publishing zero deltas");
                self.snapshot.network = NetworkSample::default();
                return;
            }
        };
        self.snapshot.network = match self.prev_network {
            Some(prev) => NetworkSample {
                bytes_in: rate::delta(current.bytes_in, prev.bytes_in),
                bytes_out: rate::delta(current.bytes_out, prev.bytes_out),
                packets_in: rate::delta(current.packets_in, prev.packets_in),
                packets_out: rate::delta(current.packets_out, prev.packets_out),
            },
            // Baseline interval: the first observation has nothing to diff
            // against, so it publishes zero rather than a boot-sized spike.
            None => NetworkSample::default(),
        };
        self.prev_network = Some(current);
    }

    fn sample_disk(&mut self, now: Instant) {
        let current = match self.probes.disk() {
            Ok(counters) => counters,
            Err(err) => {
                debug!(error = %err, "Disk probe failed; publishing zero rates");
                self.snapshot.disk = DiskSample::default();
                return;
            }
        };
        // Elapsed is measured between successful probes, so a failed cycle
        // lengthens the next interval instead of skewing the rate.
        self.snapshot.disk = match self.prev_disk {
            Some((at, prev)) => {
                let elapsed = now.duration_since(at).as_secs_f64();
                DiskSample {
                    read_bytes_per_sec: rate::per_second(current.read_bytes, prev.read_bytes, elapsed),
                    write_bytes_per_sec: rate::per_second(
                        current.written_bytes,
                        prev.written_bytes,
                        elapsed,
                    ),
                    read_ops_per_sec: rate::per_second(current.read_ops, prev.read_ops, elapsed),
                    write_ops_per_sec: rate::per_second(current.write_ops, prev.write_ops, elapsed),
                }
            }
            None => DiskSample::default(),
        };
        self.prev_disk = Some((now, current));
    }

    fn sample_gpu(&mut self) {
        self.snapshot.gpu = match self.probes.gpu() {
            Ok(util) => GpuSample {
                device_util_pct: util.device_pct,
                renderer_util_pct: util.renderer_pct,
                tiler_util_pct: util.tiler_pct,
                valid: true,
            },
            Err(err) => {
                debug!(error = %err, "GPU probe failed; publishing unavailable sample");
                GpuSample::unavailable()
            }
        };
    }

    fn sample_battery(&mut self) {
        self.snapshot.battery = match self.probes.battery() {
            Ok(state) => BatterySample {
                is_present: state.is_present,
                is_charging: state.is_charging,
                on_ac_power: state.on_ac_power,
                charge_percent: state.charge_percent,
                time_remaining_minutes: state.time_remaining_minutes,
            },
            Err(err) => {
                debug!(error = %err, "Battery probe failed; publishing unavailable sample");
                BatterySample::unavailable()
            }
        };
    }

    fn sample_fans(&mut self) {
        self.snapshot.fans = self.fan_reader.read_fans(&mut self.smc);
    }
}
