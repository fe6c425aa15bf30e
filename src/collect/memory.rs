//! Memory and swap sample derivation.

use crate::probe::{MemoryCounters, SwapCounters};
use crate::snapshot::{MemorySample, SwapSample};

/// Turn raw page counts into a byte-denominated sample.
///
/// Used memory is active + wired + compressor-held pages. The sum is not
/// clamped against `total_bytes`: the page counters and the physical total
/// come from different kernel interfaces and can transiently disagree, and
/// the raw fields keep that visible. Display code saturates via
/// [`MemorySample::used_fraction`].
pub fn derive_memory(raw: &MemoryCounters) -> MemorySample {
    let page = raw.page_size;
    let used_pages = raw
        .active_pages
        .saturating_add(raw.wired_pages)
        .saturating_add(raw.compressor_pages);
    MemorySample {
        total_bytes: raw.total_bytes,
        used_bytes: used_pages.saturating_mul(page),
        free_bytes: raw.free_pages.saturating_mul(page),
        active_bytes: raw.active_pages.saturating_mul(page),
        inactive_bytes: raw.inactive_pages.saturating_mul(page),
        wired_bytes: raw.wired_pages.saturating_mul(page),
    }
}

/// Map swap usage onto the memory sample shape.
///
/// Swap has no active/inactive/wired split; used fills the active slot and
/// the others stay zero so consumers can treat both samples uniformly.
pub fn derive_swap(raw: &SwapCounters) -> SwapSample {
    SwapSample {
        total_bytes: raw.total_bytes,
        used_bytes: raw.used_bytes,
        free_bytes: raw.free_bytes,
        active_bytes: raw.used_bytes,
        inactive_bytes: 0,
        wired_bytes: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: u64 = 16384;

    #[test]
    fn used_sums_active_wired_and_compressor() {
        let raw = MemoryCounters {
            page_size: PAGE,
            total_bytes: 16 << 30,
            free_pages: 10_000,
            active_pages: 300_000,
            inactive_pages: 120_000,
            wired_pages: 80_000,
            compressor_pages: 50_000,
        };

        let sample = derive_memory(&raw);
        assert_eq!(sample.used_bytes, (300_000 + 80_000 + 50_000) * PAGE);
        assert_eq!(sample.free_bytes, 10_000 * PAGE);
        assert_eq!(sample.active_bytes, 300_000 * PAGE);
        assert_eq!(sample.inactive_bytes, 120_000 * PAGE);
        assert_eq!(sample.wired_bytes, 80_000 * PAGE);
        assert_eq!(sample.total_bytes, 16 << 30);
    }

    #[test]
    fn used_above_total_passes_through_raw() {
        let raw = MemoryCounters {
            page_size: PAGE,
            total_bytes: 1 << 30,
            active_pages: 100_000,
            wired_pages: 20_000,
            compressor_pages: 10_000,
            ..Default::default()
        };

        let sample = derive_memory(&raw);
        let used = 130_000 * PAGE;
        assert!(used > sample.total_bytes);
        assert_eq!(sample.used_bytes, used);
        assert_eq!(sample.used_fraction(), 1.0);
    }

    #[test]
    fn swap_maps_used_into_active_slot() {
        let raw = SwapCounters {
            total_bytes: 2 << 30,
            used_bytes: 512 << 20,
            free_bytes: (2 << 30) - (512 << 20),
        };

        let sample = derive_swap(&raw);
        assert_eq!(sample.total_bytes, 2 << 30);
        assert_eq!(sample.used_bytes, 512 << 20);
        assert_eq!(sample.active_bytes, 512 << 20);
        assert_eq!(sample.inactive_bytes, 0);
        assert_eq!(sample.wired_bytes, 0);
        assert!((sample.used_fraction() - 0.25).abs() < 1e-9);
    }
}
