//! Per-subsystem derivations and text parsers.
//!
//! Everything in here is pure: parsers take captured command output as
//! strings and derivations take raw counters, so the whole module tests on
//! any platform. The thin command-spawning and FFI wrappers that feed these
//! functions live in `platform`.

pub mod battery;
pub mod cpu;
pub mod disk;
pub mod gpu;
pub mod ioreg;
pub mod memory;
pub mod network;
pub mod system;
