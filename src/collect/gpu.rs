//! Accelerator utilization parsing from `ioreg` accelerator dumps.

use crate::collect::ioreg;
use crate::probe::GpuUtilization;

/// Accelerator service classes tried in order until one matches. Apple
/// GPUs register the generic class as well, so the generic name leads.
pub const ACCELERATOR_CLASSES: &[&str] = &["IOAccelerator", "AGXAccelerator", "IntelAccelerator"];

const DEVICE_UTIL: &str = "Device Utilization %";
const RENDERER_UTIL: &str = "Renderer Utilization %";
const TILER_UTIL: &str = "Tiler Utilization %";

/// Extract utilization from one accelerator class dump.
///
/// Device utilization is the capability gate: without it the dump does not
/// describe a usable accelerator and the next class should be tried.
/// Renderer and tiler figures are best-effort and default to 0.
pub fn parse_accelerator(output: &str) -> Option<GpuUtilization> {
    let device = ioreg::quoted_key_value(output, DEVICE_UTIL)?;
    let renderer = ioreg::quoted_key_value(output, RENDERER_UTIL).unwrap_or(0);
    let tiler = ioreg::quoted_key_value(output, TILER_UTIL).unwrap_or(0);
    Some(GpuUtilization {
        device_pct: device as f64,
        renderer_pct: renderer as f64,
        tiler_pct: tiler as f64,
    })
}
