//! macOS probe and transport implementations.
//!
//! CPU, memory and swap counters come straight from mach host interfaces.
//! Network, disk, GPU, battery and load shell out to standard diagnostic
//! tools and feed their text output to the parsers in [`crate::collect`].
//! Fan telemetry opens the AppleSMC user client through IOKit.

use std::process::Command;

use tracing::debug;

use crate::collect;
use crate::probe::{
    BatteryState, CoreTicks, DiskCounters, GpuUtilization, MemoryCounters, NetworkCounters,
    ProbeError, SwapCounters, SystemCounters,
};

pub use smc_ffi::SmcDevice;

pub fn cpu_ticks() -> Result<Vec<CoreTicks>, ProbeError> {
    mach::processor_ticks()
}

pub fn memory() -> Result<MemoryCounters, ProbeError> {
    mach::memory_counters()
}

pub fn swap() -> Result<SwapCounters, ProbeError> {
    mach::swap_counters()
}

/// Cumulative byte/packet totals over non-loopback interfaces.
pub fn network() -> Result<NetworkCounters, ProbeError> {
    let text = command_output("netstat", &["-ibn"], "network")?;
    let interfaces = collect::network::parse_netstat(&text);
    if interfaces.is_empty() {
        return Err(ProbeError::unavailable(
            "network",
            "no interfaces in netstat output",
        ));
    }
    Ok(collect::network::totals(&interfaces))
}

/// Cumulative read/write totals summed over all block storage drivers.
pub fn disk() -> Result<DiskCounters, ProbeError> {
    let text = command_output("ioreg", &["-r", "-c", "IOBlockStorageDriver", "-w", "0"], "disk")?;
    collect::disk::parse_block_storage(&text)
        .ok_or_else(|| ProbeError::unavailable("disk", "no block storage statistics"))
}

/// Utilization from the first accelerator class that reports statistics.
pub fn gpu() -> Result<GpuUtilization, ProbeError> {
    for &class in collect::gpu::ACCELERATOR_CLASSES {
        let Ok(text) = command_output("ioreg", &["-r", "-c", class, "-w", "0"], "gpu") else {
            continue;
        };
        if let Some(util) = collect::gpu::parse_accelerator(&text) {
            return Ok(util);
        }
        debug!(class, "Accelerator class reported no utilization");
    }
    Err(ProbeError::unavailable(
        "gpu",
        "no accelerator reported utilization",
    ))
}

pub fn battery() -> Result<BatteryState, ProbeError> {
    let text = command_output("pmset", &["-g", "batt"], "battery")?;
    Ok(collect::battery::parse_pmset(&text))
}

pub fn system_info() -> Result<SystemCounters, ProbeError> {
    let loadavg = command_output("sysctl", &["-n", "vm.loadavg"], "system")?;
    let (load_avg_1, load_avg_5, load_avg_15) = collect::system::parse_loadavg(&loadavg)
        .ok_or_else(|| ProbeError::unavailable("system", "unparseable vm.loadavg"))?;
    let ncpu = command_output("sysctl", &["-n", "hw.ncpu"], "system")?;
    let cpu_count = collect::system::parse_count(&ncpu)
        .ok_or_else(|| ProbeError::unavailable("system", "unparseable hw.ncpu"))?;
    let processes = command_output("ps", &["-axo", "pid="], "system")?;
    Ok(SystemCounters {
        load_avg_1,
        load_avg_5,
        load_avg_15,
        process_count: collect::system::count_lines(&processes),
        cpu_count,
    })
}

fn command_output(
    program: &str,
    args: &[&str],
    subsystem: &'static str,
) -> Result<String, ProbeError> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|err| ProbeError::unavailable(subsystem, format!("{program}: {err}")))?;
    if !output.status.success() {
        return Err(ProbeError::unavailable(
            subsystem,
            format!("{program} exited with {}", output.status),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Raw mach host interfaces for CPU, memory and swap counters.
#[allow(unsafe_code)]
mod mach {
    use crate::probe::{CoreTicks, MemoryCounters, ProbeError, SwapCounters};

    #[allow(non_camel_case_types)]
    type kern_return_t = i32;
    #[allow(non_camel_case_types)]
    type mach_port_t = u32;
    #[allow(non_camel_case_types)]
    type natural_t = u32;
    #[allow(non_camel_case_types)]
    type integer_t = i32;
    #[allow(non_camel_case_types)]
    type mach_msg_type_number_t = u32;
    #[allow(non_camel_case_types)]
    type vm_size_t = usize;
    #[allow(non_camel_case_types)]
    type vm_address_t = usize;
    #[allow(non_camel_case_types)]
    type processor_flavor_t = i32;
    #[allow(non_camel_case_types)]
    type host_flavor_t = i32;

    const KERN_SUCCESS: kern_return_t = 0;
    const PROCESSOR_CPU_LOAD_INFO: processor_flavor_t = 2;
    const HOST_VM_INFO64: host_flavor_t = 4;

    const CPU_STATE_USER: usize = 0;
    const CPU_STATE_SYSTEM: usize = 1;
    const CPU_STATE_IDLE: usize = 2;
    const CPU_STATE_NICE: usize = 3;
    const CPU_STATE_MAX: usize = 4;

    /// Layout of `struct vm_statistics64` from the mach headers. The field
    /// list must stay complete so the struct size, and therefore
    /// `HOST_VM_INFO64_COUNT`, matches what the kernel writes.
    #[repr(C)]
    #[derive(Clone, Copy, Default)]
    #[allow(non_camel_case_types)]
    struct vm_statistics64 {
        free_count: natural_t,
        active_count: natural_t,
        inactive_count: natural_t,
        wire_count: natural_t,
        zero_fill_count: u64,
        reactivations: u64,
        pageins: u64,
        pageouts: u64,
        faults: u64,
        cow_faults: u64,
        lookups: u64,
        hits: u64,
        purges: u64,
        purgeable_count: natural_t,
        speculative_count: natural_t,
        decompressions: u64,
        compressions: u64,
        swapins: u64,
        swapouts: u64,
        compressor_page_count: natural_t,
        throttled_count: natural_t,
        external_page_count: natural_t,
        internal_page_count: natural_t,
        total_uncompressed_pages_in_compressor: u64,
    }

    const HOST_VM_INFO64_COUNT: mach_msg_type_number_t = (std::mem::size_of::<vm_statistics64>()
        / std::mem::size_of::<integer_t>())
        as mach_msg_type_number_t;

    /// Layout of `struct xsw_usage` returned by the `vm.swapusage` sysctl.
    #[repr(C)]
    #[derive(Clone, Copy, Default)]
    #[allow(non_camel_case_types)]
    struct xsw_usage {
        xsu_total: u64,
        xsu_avail: u64,
        xsu_used: u64,
        xsu_pagesize: u32,
        xsu_encrypted: u32,
    }

    unsafe extern "C" {
        fn mach_host_self() -> mach_port_t;
        fn host_processor_info(
            host: mach_port_t,
            flavor: processor_flavor_t,
            out_processor_count: *mut natural_t,
            out_processor_info: *mut *mut integer_t,
            out_processor_info_count: *mut mach_msg_type_number_t,
        ) -> kern_return_t;
        fn host_statistics64(
            host: mach_port_t,
            flavor: host_flavor_t,
            host_info_out: *mut integer_t,
            host_info_out_count: *mut mach_msg_type_number_t,
        ) -> kern_return_t;
        fn host_page_size(host: mach_port_t, out_page_size: *mut vm_size_t) -> kern_return_t;
        fn vm_deallocate(
            target_task: mach_port_t,
            address: vm_address_t,
            size: vm_size_t,
        ) -> kern_return_t;
    }

    /// Kernel-allocated processor info array, released exactly once on drop.
    struct VmBuffer {
        address: *mut integer_t,
        count: mach_msg_type_number_t,
    }

    impl Drop for VmBuffer {
        fn drop(&mut self) {
            if self.address.is_null() {
                return;
            }
            // SAFETY: host_processor_info allocated this range in our address
            // space and ownership passed to us; vm_deallocate releases it.
            unsafe {
                vm_deallocate(
                    mach_host_self(),
                    self.address as vm_address_t,
                    self.count as usize * std::mem::size_of::<integer_t>(),
                );
            }
        }
    }

    pub fn processor_ticks() -> Result<Vec<CoreTicks>, ProbeError> {
        let mut core_count: natural_t = 0;
        let mut info: *mut integer_t = std::ptr::null_mut();
        let mut info_count: mach_msg_type_number_t = 0;
        // SAFETY: host_processor_info writes a core count, a pointer to a
        // kernel-allocated integer array and its length. The array becomes
        // ours to release; VmBuffer does so exactly once.
        let kr = unsafe {
            host_processor_info(
                mach_host_self(),
                PROCESSOR_CPU_LOAD_INFO,
                &mut core_count,
                &mut info,
                &mut info_count,
            )
        };
        if kr != KERN_SUCCESS {
            return Err(ProbeError::unavailable(
                "cpu",
                format!("host_processor_info returned {kr}"),
            ));
        }
        let buffer = VmBuffer {
            address: info,
            count: info_count,
        };
        let wanted = core_count as usize * CPU_STATE_MAX;
        if buffer.address.is_null() || (buffer.count as usize) < wanted {
            return Err(ProbeError::unavailable(
                "cpu",
                "processor info array shorter than the core count",
            ));
        }
        // SAFETY: the kernel guarantees `count` readable integers at
        // `address`; only the bounds-checked prefix is viewed.
        let ticks = unsafe { std::slice::from_raw_parts(buffer.address, wanted) };
        // Tick counters are 32-bit and wrap; widen after a bit reinterpret.
        Ok(ticks
            .chunks_exact(CPU_STATE_MAX)
            .map(|states| CoreTicks {
                user: u64::from(states[CPU_STATE_USER] as u32),
                system: u64::from(states[CPU_STATE_SYSTEM] as u32),
                idle: u64::from(states[CPU_STATE_IDLE] as u32),
                nice: u64::from(states[CPU_STATE_NICE] as u32),
            })
            .collect())
    }

    pub fn memory_counters() -> Result<MemoryCounters, ProbeError> {
        // SAFETY: mach_host_self returns the caller's host port, always valid.
        let host = unsafe { mach_host_self() };

        let mut page_size: vm_size_t = 0;
        // SAFETY: host_page_size writes the VM page size for a valid host port.
        let kr = unsafe { host_page_size(host, &mut page_size) };
        if kr != KERN_SUCCESS {
            return Err(ProbeError::unavailable(
                "memory",
                format!("host_page_size returned {kr}"),
            ));
        }

        let mut stats = vm_statistics64::default();
        let mut count = HOST_VM_INFO64_COUNT;
        // SAFETY: host_statistics64 fills at most `count` integers behind the
        // struct pointer and updates `count`; the buffer covers the flavor.
        let kr = unsafe {
            host_statistics64(host, HOST_VM_INFO64, (&raw mut stats).cast(), &mut count)
        };
        if kr != KERN_SUCCESS {
            return Err(ProbeError::unavailable(
                "memory",
                format!("host_statistics64 returned {kr}"),
            ));
        }

        Ok(MemoryCounters {
            page_size: page_size as u64,
            total_bytes: sysctl_u64(c"hw.memsize", "memory")?,
            free_pages: u64::from(stats.free_count),
            active_pages: u64::from(stats.active_count),
            inactive_pages: u64::from(stats.inactive_count),
            wired_pages: u64::from(stats.wire_count),
            compressor_pages: u64::from(stats.compressor_page_count),
        })
    }

    pub fn swap_counters() -> Result<SwapCounters, ProbeError> {
        let mut usage = xsw_usage::default();
        let mut size = std::mem::size_of::<xsw_usage>();
        // SAFETY: vm.swapusage fills one xsw_usage struct; `size` carries the
        // buffer capacity in and the written length out.
        let rc = unsafe {
            libc::sysctlbyname(
                c"vm.swapusage".as_ptr(),
                (&raw mut usage).cast(),
                &mut size,
                std::ptr::null_mut(),
                0,
            )
        };
        if rc != 0 {
            return Err(ProbeError::unavailable(
                "swap",
                format!("sysctl vm.swapusage: {}", std::io::Error::last_os_error()),
            ));
        }
        Ok(SwapCounters {
            total_bytes: usage.xsu_total,
            used_bytes: usage.xsu_used,
            free_bytes: usage.xsu_avail,
        })
    }

    fn sysctl_u64(name: &std::ffi::CStr, subsystem: &'static str) -> Result<u64, ProbeError> {
        let mut value: u64 = 0;
        let mut size = std::mem::size_of::<u64>();
        // SAFETY: sysctlbyname writes at most `size` bytes into `value` and
        // updates `size`; both pointers outlive the call.
        let rc = unsafe {
            libc::sysctlbyname(
                name.as_ptr(),
                (&raw mut value).cast(),
                &mut size,
                std::ptr::null_mut(),
                0,
            )
        };
        if rc != 0 {
            return Err(ProbeError::unavailable(
                subsystem,
                format!(
                    "sysctl {}: {}",
                    name.to_string_lossy(),
                    std::io::Error::last_os_error()
                ),
            ));
        }
        Ok(value)
    }
}

/// IOKit FFI for the AppleSMC user client.
#[allow(unsafe_code)]
mod smc_ffi {
    use std::ffi::{c_char, c_void};

    use tracing::debug;

    use crate::smc::{MAX_PAYLOAD, SmcError, SmcExchange, SmcTransport};

    #[allow(non_camel_case_types)]
    type kern_return_t = i32;
    #[allow(non_camel_case_types)]
    type mach_port_t = u32;
    #[allow(non_camel_case_types)]
    type io_object_t = u32;
    #[allow(non_camel_case_types)]
    type io_service_t = u32;
    #[allow(non_camel_case_types)]
    type io_connect_t = u32;
    type CFMutableDictionaryRef = *mut c_void;

    const KERN_SUCCESS: kern_return_t = 0;
    const K_IO_MAIN_PORT_DEFAULT: mach_port_t = 0;
    /// Selector the SMC user client dispatches key exchanges on.
    const K_SMC_HANDLE_YPC_EVENT: u32 = 2;

    #[link(name = "IOKit", kind = "framework")]
    unsafe extern "C" {
        fn IOServiceMatching(name: *const c_char) -> CFMutableDictionaryRef;
        fn IOServiceGetMatchingService(
            main_port: mach_port_t,
            matching: CFMutableDictionaryRef,
        ) -> io_service_t;
        fn IOServiceOpen(
            service: io_service_t,
            owning_task: mach_port_t,
            conn_type: u32,
            connect: *mut io_connect_t,
        ) -> kern_return_t;
        fn IOServiceClose(connect: io_connect_t) -> kern_return_t;
        fn IOObjectRelease(object: io_object_t) -> kern_return_t;
        fn IOConnectCallStructMethod(
            connection: io_connect_t,
            selector: u32,
            input: *const c_void,
            input_size: usize,
            output: *mut c_void,
            output_size: *mut usize,
        ) -> kern_return_t;
    }

    unsafe extern "C" {
        fn mach_task_self() -> mach_port_t;
    }

    // Wire layout of the exchange structure the user client expects. Field
    // widths and order are fixed; the total size is part of the call
    // contract checked by the kext.

    #[repr(C)]
    #[derive(Clone, Copy, Default)]
    struct SmcWireVersion {
        major: u8,
        minor: u8,
        build: u8,
        reserved: u8,
        release: u16,
    }

    #[repr(C)]
    #[derive(Clone, Copy, Default)]
    struct SmcWireLimits {
        version: u16,
        length: u16,
        cpu_p_limit: u32,
        gpu_p_limit: u32,
        mem_p_limit: u32,
    }

    #[repr(C)]
    #[derive(Clone, Copy, Default)]
    struct SmcWireKeyInfo {
        data_size: u32,
        data_type: u32,
        data_attributes: u8,
    }

    #[repr(C)]
    #[derive(Clone, Copy, Default)]
    struct SmcWireFrame {
        key: u32,
        vers: SmcWireVersion,
        p_limit: SmcWireLimits,
        key_info: SmcWireKeyInfo,
        result: u8,
        status: u8,
        data8: u8,
        data32: u32,
        bytes: [u8; MAX_PAYLOAD],
    }

    const _: () = assert!(std::mem::size_of::<SmcWireFrame>() == 80);

    /// Open user-client connection to the controller service.
    pub struct SmcDevice {
        connection: io_connect_t,
    }

    impl SmcDevice {
        /// Locate the AppleSMC service and open a connection to it.
        pub fn open() -> Result<Self, SmcError> {
            // SAFETY: IOServiceMatching builds a matching dictionary that
            // IOServiceGetMatchingService consumes, returning a retained
            // service handle or 0.
            let service = unsafe {
                let matching = IOServiceMatching(c"AppleSMC".as_ptr());
                if matching.is_null() {
                    return Err(SmcError::ChannelUnavailable);
                }
                IOServiceGetMatchingService(K_IO_MAIN_PORT_DEFAULT, matching)
            };
            if service == 0 {
                debug!("No AppleSMC service registered");
                return Err(SmcError::ChannelUnavailable);
            }

            let mut connection: io_connect_t = 0;
            // SAFETY: IOServiceOpen writes a connection handle on success;
            // the service handle is released either way.
            let kr = unsafe {
                let kr = IOServiceOpen(service, mach_task_self(), 0, &mut connection);
                IOObjectRelease(service);
                kr
            };
            if kr != KERN_SUCCESS {
                debug!(code = kr, "IOServiceOpen rejected the connection");
                return Err(SmcError::ChannelUnavailable);
            }
            Ok(Self { connection })
        }
    }

    impl SmcTransport for SmcDevice {
        fn exchange(&mut self, frame: &mut SmcExchange) -> Result<(), SmcError> {
            let input = SmcWireFrame {
                key: frame.key,
                data8: frame.command,
                key_info: SmcWireKeyInfo {
                    data_size: frame.data_size,
                    ..SmcWireKeyInfo::default()
                },
                ..SmcWireFrame::default()
            };
            let mut output = SmcWireFrame::default();
            let mut output_size = std::mem::size_of::<SmcWireFrame>();
            // SAFETY: input and output are fixed-size wire frames; the call
            // reads input_size bytes and writes at most output_size bytes.
            let kr = unsafe {
                IOConnectCallStructMethod(
                    self.connection,
                    K_SMC_HANDLE_YPC_EVENT,
                    (&raw const input).cast(),
                    std::mem::size_of::<SmcWireFrame>(),
                    (&raw mut output).cast(),
                    &mut output_size,
                )
            };
            if kr != KERN_SUCCESS {
                debug!(code = kr, "Controller call failed at the IPC layer");
                return Err(SmcError::ChannelUnavailable);
            }

            frame.result = output.result;
            frame.data_size = output.key_info.data_size;
            frame.data_type = output.key_info.data_type;
            frame.bytes = output.bytes;
            Ok(())
        }
    }

    impl Drop for SmcDevice {
        fn drop(&mut self) {
            // SAFETY: the connection handle came from IOServiceOpen and is
            // closed exactly once.
            unsafe {
                IOServiceClose(self.connection);
            }
        }
    }
}
