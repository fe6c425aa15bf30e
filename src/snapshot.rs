//! Published telemetry sample types.
//!
//! Everything here is a plain value: the sampler builds a fresh
//! [`TelemetrySnapshot`] on every update and consumers may copy or serialize
//! it freely. Nothing holds a reference back into sampler state.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot schema version, bumped on incompatible field changes.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Per-core CPU usage over the last sampling interval.
///
/// Percentages are derived from tick deltas, never from absolute counters,
/// and each lies in [0, 100].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuCoreSample {
    pub user_pct: f64,
    pub system_pct: f64,
    pub idle_pct: f64,
    /// Non-idle share: user + system + nice.
    pub total_pct: f64,
}

/// Physical memory usage in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySample {
    pub total_bytes: u64,
    /// active + wired + compressor. Source counters can transiently sum past
    /// `total_bytes`; the raw value passes through unclamped.
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub active_bytes: u64,
    pub inactive_bytes: u64,
    pub wired_bytes: u64,
}

impl MemorySample {
    /// Used share in [0, 1], saturated for display even when the raw
    /// counters disagree with the total.
    pub fn used_fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        (self.used_bytes as f64 / self.total_bytes as f64).min(1.0)
    }
}

/// Swap usage in bytes. Same shape as [`MemorySample`], independent source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapSample {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub active_bytes: u64,
    pub inactive_bytes: u64,
    pub wired_bytes: u64,
}

impl SwapSample {
    /// Used share in [0, 1]; 0 when no swap is configured.
    pub fn used_fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        (self.used_bytes as f64 / self.total_bytes as f64).min(1.0)
    }
}

/// Accelerator utilization percentages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GpuSample {
    pub device_util_pct: f64,
    pub renderer_util_pct: f64,
    pub tiler_util_pct: f64,
    /// False when no accelerator device matched; all percentages are 0 then.
    pub valid: bool,
}

impl GpuSample {
    /// The fixed representation for "no accelerator matched".
    pub fn unavailable() -> Self {
        Self::default()
    }
}

/// Network activity over the subsystem's own sampling interval.
///
/// These are per-interval deltas, not per-second rates; the interval is the
/// network throttle cadence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSample {
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub packets_in: u64,
    pub packets_out: u64,
}

/// Disk activity normalized to wall-clock seconds using the measured elapsed
/// interval between successful probes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskSample {
    pub read_bytes_per_sec: u64,
    pub write_bytes_per_sec: u64,
    pub read_ops_per_sec: u64,
    pub write_ops_per_sec: u64,
}

/// Battery presence and charge state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatterySample {
    pub is_present: bool,
    pub is_charging: bool,
    pub on_ac_power: bool,
    pub charge_percent: f64,
    /// Minutes until empty/full; -1 when unknown.
    pub time_remaining_minutes: i32,
}

impl BatterySample {
    /// The fixed representation for "no battery data".
    pub fn unavailable() -> Self {
        Self {
            is_present: false,
            is_charging: false,
            on_ac_power: false,
            charge_percent: 0.0,
            time_remaining_minutes: -1,
        }
    }
}

impl Default for BatterySample {
    fn default() -> Self {
        Self::unavailable()
    }
}

/// One fan's speed readings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FanSample {
    /// Current speed; 0 and not meaningful when `valid` is false.
    pub rpm: f32,
    pub min_rpm: f32,
    pub max_rpm: f32,
    /// True only when the actual-speed key read succeeded.
    pub valid: bool,
}

/// Load averages and host-wide counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemInfoSample {
    pub load_avg_1: f64,
    pub load_avg_5: f64,
    pub load_avg_15: f64,
    pub process_count: u32,
    pub cpu_count: u32,
}

/// The complete published telemetry state for one host at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// Schema version, always [`SNAPSHOT_VERSION`] for snapshots built by
    /// this crate.
    pub version: u32,
    /// Publication time of this snapshot.
    pub sampled_at: DateTime<Utc>,
    /// One entry per logical core.
    pub cpu_cores: Vec<CpuCoreSample>,
    pub memory: MemorySample,
    pub swap: SwapSample,
    pub gpu: GpuSample,
    pub network: NetworkSample,
    pub disk: DiskSample,
    pub battery: BatterySample,
    /// One entry per discovered fan; empty when fans are absent or the
    /// controller channel is unavailable.
    pub fans: Vec<FanSample>,
    pub system: SystemInfoSample,
}

impl TelemetrySnapshot {
    /// A neutral snapshot with no cores, no fans, and zeroed samples.
    pub fn new() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            sampled_at: Utc::now(),
            cpu_cores: Vec::new(),
            memory: MemorySample::default(),
            swap: SwapSample::default(),
            gpu: GpuSample::unavailable(),
            network: NetworkSample::default(),
            disk: DiskSample::default(),
            battery: BatterySample::unavailable(),
            fans: Vec::new(),
            system: SystemInfoSample::default(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Mean non-idle CPU percentage across cores; 0 with no cores.
    pub fn cpu_total_pct(&self) -> f64 {
        if self.cpu_cores.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.cpu_cores.iter().map(|core| core.total_pct).sum();
        sum / self.cpu_cores.len() as f64
    }

    /// One-line digest for human-facing output.
    pub fn summary(&self) -> SnapshotSummary {
        let fan_rpm_max = self
            .fans
            .iter()
            .filter(|fan| fan.valid)
            .map(|fan| fan.rpm)
            .fold(None, |best: Option<f32>, rpm| {
                Some(best.map_or(rpm, |b| b.max(rpm)))
            });
        SnapshotSummary {
            cpu_total_pct: self.cpu_total_pct(),
            core_count: self.cpu_cores.len(),
            mem_used_pct: self.memory.used_fraction() * 100.0,
            swap_used_pct: self.swap.used_fraction() * 100.0,
            gpu_device_pct: self.gpu.valid.then_some(self.gpu.device_util_pct),
            net_in_bytes: self.network.bytes_in,
            net_out_bytes: self.network.bytes_out,
            disk_read_bps: self.disk.read_bytes_per_sec,
            disk_write_bps: self.disk.write_bytes_per_sec,
            fan_rpm_max,
            load_avg_1: self.system.load_avg_1,
        }
    }
}

impl Default for TelemetrySnapshot {
    fn default() -> Self {
        Self::new()
    }
}

/// Compact digest of a [`TelemetrySnapshot`] for one-line display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub cpu_total_pct: f64,
    pub core_count: usize,
    pub mem_used_pct: f64,
    pub swap_used_pct: f64,
    /// None when no accelerator matched.
    pub gpu_device_pct: Option<f64>,
    pub net_in_bytes: u64,
    pub net_out_bytes: u64,
    pub disk_read_bps: u64,
    pub disk_write_bps: u64,
    /// Fastest valid fan, None when no fan is readable.
    pub fan_rpm_max: Option<f32>,
    pub load_avg_1: f64,
}

impl fmt::Display for SnapshotSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cpu {:.1}% ({} cores) | mem {:.1}% | swap {:.1}%",
            self.cpu_total_pct, self.core_count, self.mem_used_pct, self.swap_used_pct
        )?;
        match self.gpu_device_pct {
            Some(pct) => write!(f, " | gpu {pct:.0}%")?,
            None => write!(f, " | gpu n/a")?,
        }
        write!(
            f,
            " | net in {} B out {} B | disk r {} B/s w {} B/s",
            self.net_in_bytes, self.net_out_bytes, self.disk_read_bps, self.disk_write_bps
        )?;
        match self.fan_rpm_max {
            Some(rpm) => write!(f, " | fan {rpm:.0} rpm")?,
            None => write!(f, " | fan n/a")?,
        }
        write!(f, " | load {:.2}", self.load_avg_1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_snapshot_is_neutral() {
        let snapshot = TelemetrySnapshot::new();
        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
        assert!(snapshot.cpu_cores.is_empty());
        assert!(snapshot.fans.is_empty());
        assert!(!snapshot.gpu.valid);
        assert!(!snapshot.battery.is_present);
        assert_eq!(snapshot.battery.time_remaining_minutes, -1);
    }

    #[test]
    fn json_round_trip_preserves_snapshot() {
        let mut snapshot = TelemetrySnapshot::new();
        snapshot.cpu_cores = vec![CpuCoreSample {
            user_pct: 30.0,
            system_pct: 20.0,
            idle_pct: 50.0,
            total_pct: 50.0,
        }];
        snapshot.memory.total_bytes = 16 << 30;
        snapshot.memory.used_bytes = 8 << 30;
        snapshot.fans = vec![FanSample {
            rpm: 1200.0,
            min_rpm: 600.0,
            max_rpm: 5400.0,
            valid: true,
        }];

        let json = snapshot.to_json().unwrap();
        let restored = TelemetrySnapshot::from_json(&json).unwrap();
        assert_eq!(restored, snapshot);
    }

    #[test]
    fn used_fraction_saturates_but_raw_bytes_pass_through() {
        // Active + wired + compressor can transiently exceed the sysctl
        // total on real kernels; the raw field keeps the truth while the
        // display fraction saturates.
        let sample = MemorySample {
            total_bytes: 1000,
            used_bytes: 1200,
            ..Default::default()
        };
        assert_eq!(sample.used_bytes, 1200);
        assert_eq!(sample.used_fraction(), 1.0);

        let zero_total = MemorySample::default();
        assert_eq!(zero_total.used_fraction(), 0.0);
    }

    #[test]
    fn summary_renders_available_and_missing_subsystems() {
        let mut snapshot = TelemetrySnapshot::new();
        snapshot.cpu_cores = vec![
            CpuCoreSample {
                total_pct: 40.0,
                ..Default::default()
            },
            CpuCoreSample {
                total_pct: 60.0,
                ..Default::default()
            },
        ];
        snapshot.memory = MemorySample {
            total_bytes: 1000,
            used_bytes: 250,
            ..Default::default()
        };
        snapshot.system.load_avg_1 = 1.84;

        let line = snapshot.summary().to_string();
        assert!(line.contains("cpu 50.0% (2 cores)"), "line: {line}");
        assert!(line.contains("mem 25.0%"), "line: {line}");
        assert!(line.contains("gpu n/a"), "line: {line}");
        assert!(line.contains("fan n/a"), "line: {line}");
        assert!(line.contains("load 1.84"), "line: {line}");

        snapshot.gpu = GpuSample {
            device_util_pct: 31.0,
            renderer_util_pct: 12.0,
            tiler_util_pct: 7.0,
            valid: true,
        };
        snapshot.fans = vec![
            FanSample {
                rpm: 1200.0,
                valid: true,
                ..Default::default()
            },
            FanSample {
                rpm: 4000.0,
                valid: false,
                ..Default::default()
            },
        ];
        let line = snapshot.summary().to_string();
        assert!(line.contains("gpu 31%"), "line: {line}");
        // Invalid fans are excluded from the digest.
        assert!(line.contains("fan 1200 rpm"), "line: {line}");
    }
}
