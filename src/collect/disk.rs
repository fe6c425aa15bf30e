//! Block-storage counter parsing from `ioreg -r -c IOBlockStorageDriver`.
//!
//! Each driver entry carries a `Statistics` dictionary with cumulative byte
//! and operation counters since boot. Totals are summed across drivers so
//! multi-disk hosts report whole-host I/O.

use crate::collect::ioreg;
use crate::probe::DiskCounters;

const BYTES_READ: &str = "Bytes (Read)";
const BYTES_WRITTEN: &str = "Bytes (Write)";
const OPS_READ: &str = "Operations (Read)";
const OPS_WRITTEN: &str = "Operations (Write)";

/// Sum statistics across every block-storage driver in the dump.
///
/// `None` when the dump carries no statistics at all, which the caller
/// treats as "probe unavailable" rather than an idle disk.
pub fn parse_block_storage(output: &str) -> Option<DiskCounters> {
    let read_bytes = ioreg::quoted_key_values(output, BYTES_READ);
    let written_bytes = ioreg::quoted_key_values(output, BYTES_WRITTEN);
    let read_ops = ioreg::quoted_key_values(output, OPS_READ);
    let write_ops = ioreg::quoted_key_values(output, OPS_WRITTEN);
    if read_bytes.is_empty()
        && written_bytes.is_empty()
        && read_ops.is_empty()
        && write_ops.is_empty()
    {
        return None;
    }

    let sum = |values: Vec<u64>| values.into_iter().fold(0u64, u64::saturating_add);
    Some(DiskCounters {
        read_bytes: sum(read_bytes),
        written_bytes: sum(written_bytes),
        read_ops: sum(read_ops),
        write_ops: sum(write_ops),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_IOREG: &str = "\
+-o AppleANS3NVMeController  <class AppleANS3NVMeController, id 0x100000321, registered, matched, active, busy 0 (4 ms), retain 9>
  +-o IOBlockStorageDriver  <class IOBlockStorageDriver, id 0x100000330, registered, matched, active, busy 0 (1 ms), retain 8>
    {
      \"Statistics\" = {\"Operations (Write)\"=53398,\"Bytes (Write)\"=1242445824,\"Latency Time (Write)\"=0,\"Operations (Read)\"=124853,\"Bytes (Read)\"=4898594816,\"Latency Time (Read)\"=0}
    }
  +-o IOBlockStorageDriver  <class IOBlockStorageDriver, id 0x100000412, registered, matched, active, busy 0 (0 ms), retain 8>
    {
      \"Statistics\" = {\"Operations (Write)\"=100,\"Bytes (Write)\"=4096,\"Operations (Read)\"=200,\"Bytes (Read)\"=8192}
    }
";

    #[test]
    fn statistics_sum_across_drivers() {
        let counters = parse_block_storage(SAMPLE_IOREG).unwrap();
        assert_eq!(counters.read_bytes, 4_898_594_816 + 8192);
        assert_eq!(counters.written_bytes, 1_242_445_824 + 4096);
        assert_eq!(counters.read_ops, 124_853 + 200);
        assert_eq!(counters.write_ops, 53_398 + 100);
    }

    #[test]
    fn dump_without_statistics_is_unavailable() {
        assert_eq!(parse_block_storage(""), None);
        assert_eq!(
            parse_block_storage("+-o IOBlockStorageDriver <class IOBlockStorageDriver>\n"),
            None
        );
    }

    #[test]
    fn partial_statistics_still_count() {
        let dump = "\"Bytes (Read)\"=1000";
        let counters = parse_block_storage(dump).unwrap();
        assert_eq!(counters.read_bytes, 1000);
        assert_eq!(counters.written_bytes, 0);
        assert_eq!(counters.read_ops, 0);
        assert_eq!(counters.write_ops, 0);
    }
}
