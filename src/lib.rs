//! Continuous host telemetry sampling with fan readings from the system
//! management controller.
//!
//! The crate revolves around [`MetricSampler`]: callers construct it over a
//! [`HostProbes`] implementation and an [`SmcClient`], call
//! [`initialize`](MetricSampler::initialize) once to establish the CPU tick
//! baseline, then call [`update`](MetricSampler::update) on their own cadence
//! to receive a fresh [`TelemetrySnapshot`]. Expensive probes re-run on
//! per-subsystem intervals regardless of the caller's polling rate, and any
//! probe failure degrades only its own subsystem.
//!
//! ## Modules
//!
//! - [`sampler`]: The orchestrator tying probes, throttles and rates together
//! - [`snapshot`]: Published sample types, serializable as JSON
//! - [`probe`]: The [`HostProbes`] seam plus scripted fakes for tests
//! - [`collect`]: Pure parsers and derivations over raw counters
//! - [`smc`]: Binary key/value protocol client for fan telemetry
//! - [`platform`]: Production probes and the IOKit transport
//! - [`rate`], [`throttle`]: Counter-to-rate math and probe cadence gates
//! - [`logging`]: Structured logging initialization

// Use deny instead of forbid so the platform FFI modules can lift the ban
// locally with a scoped allow.
#![deny(unsafe_code)]

pub mod collect;
pub mod logging;
pub mod platform;
pub mod probe;
pub mod rate;
pub mod sampler;
pub mod smc;
pub mod snapshot;
pub mod throttle;

pub use logging::{LogConfig, LogFormat, LoggingGuards, init_logging};
pub use platform::{PlatformProbes, open_smc};
pub use probe::{FakeProbes, HostProbes, ProbeError};
pub use sampler::{MetricSampler, SamplerConfig, SamplerError};
pub use smc::fan::{FanReader, MAX_FANS};
pub use smc::{SmcClient, SmcError, SmcKey, SmcTransport};
pub use snapshot::{
    BatterySample, CpuCoreSample, DiskSample, FanSample, GpuSample, MemorySample, NetworkSample,
    SNAPSHOT_VERSION, SnapshotSummary, SwapSample, SystemInfoSample, TelemetrySnapshot,
};
